//! Declaration macros standing in for derive-time code generation.

#[doc(hidden)]
#[macro_export]
macro_rules! __reflect_any_methods {
    () => {
        fn reflect_type_info(&self) -> $crate::reflect::TypeInfo {
            <Self as $crate::reflect::Typed>::type_info()
        }

        fn reflect_type_name(&self) -> &'static str {
            ::std::any::type_name::<Self>()
        }

        fn as_any(&self) -> &dyn ::std::any::Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
            self
        }

        fn into_any(self: ::std::boxed::Box<Self>) -> ::std::boxed::Box<dyn ::std::any::Any> {
            self
        }
    };
    (default_reset) => {
        $crate::__reflect_any_methods!();

        fn reset(&mut self) {
            *self = ::std::default::Default::default();
        }
    };
}

/// Implements [`Typed`](crate::reflect::Typed), [`Reflect`](crate::reflect::Reflect)
/// and [`Struct`](crate::reflect::Struct) for a struct with named fields.
///
/// Each listed field may carry struct tags as `namespace = "tag"` pairs. A tag
/// is `wire-name[,option]*` with the options `omitempty` and `inline`; `-`
/// skips the field. Struct-level tags go after the type name (`toarray`,
/// `omitempty`). Fields that are not listed are invisible to the codec.
/// The struct must implement `Default`.
///
/// # Examples
///
/// ```rust
/// use polycodec::{reflect_struct, to_vec, from_slice, JsonHandle};
///
/// #[derive(Debug, Default, PartialEq)]
/// struct Widget {
///     name: String,
///     count: u32,
///     note: Option<String>,
/// }
///
/// reflect_struct!(Widget {
///     name codec = "name",
///     count codec = "count",
///     note codec = "note,omitempty",
/// });
///
/// let handle = JsonHandle::new();
/// let widget = Widget { name: "widget".into(), count: 7, note: None };
/// let bytes = to_vec(&handle, &widget).unwrap();
/// assert_eq!(bytes, br#"{"name":"widget","count":7}"#);
///
/// let back: Widget = from_slice(&handle, &bytes).unwrap();
/// assert_eq!(back, widget);
/// ```
#[macro_export]
macro_rules! reflect_struct {
    ($name:ident $( $skey:ident = $stag:literal )* {
        $( $field:ident $( $fkey:ident = $ftag:literal )* ),* $(,)?
    }) => {
        impl $crate::reflect::Typed for $name {
            fn type_info() -> $crate::reflect::TypeInfo {
                $crate::reflect::TypeInfo::Struct($crate::reflect::StructInfo {
                    name: stringify!($name),
                    tags: &[ $( (stringify!($skey), $stag) ),* ],
                    fields: vec![ $(
                        $crate::reflect::FieldInfo::from_accessor(
                            stringify!($field),
                            &[ $( (stringify!($fkey), $ftag) ),* ],
                            |s: &$name| &s.$field,
                        )
                    ),* ],
                })
            }
        }

        impl $crate::reflect::Reflect for $name {
            $crate::__reflect_any_methods!(default_reset);

            fn reflect_ref(&self) -> $crate::reflect::ReflectRef<'_> {
                $crate::reflect::ReflectRef::Struct(self)
            }

            fn reflect_mut(&mut self) -> $crate::reflect::ReflectMut<'_> {
                $crate::reflect::ReflectMut::Struct(self)
            }
        }

        impl $crate::reflect::Struct for $name {
            #[allow(unused_assignments, unused_mut, unused_variables)]
            fn field_at(&self, index: usize) -> Option<&dyn $crate::reflect::Reflect> {
                let mut at = 0usize;
                $(
                    if index == at {
                        return Some(&self.$field);
                    }
                    at += 1;
                )*
                None
            }

            #[allow(unused_assignments, unused_mut, unused_variables)]
            fn field_at_mut(&mut self, index: usize) -> Option<&mut dyn $crate::reflect::Reflect> {
                let mut at = 0usize;
                $(
                    if index == at {
                        return Some(&mut self.$field);
                    }
                    at += 1;
                )*
                None
            }

            fn field_count(&self) -> usize {
                let names: &[&str] = &[ $( stringify!($field) ),* ];
                names.len()
            }
        }
    };
}

/// Implements the reflection traits for a type without a traversable shape.
///
/// Opaque values can only be encoded through a registered
/// [`Extension`](crate::Extension), or, with the `self_codec` flag, through
/// the type's own [`SelfCodec`](crate::reflect::SelfCodec) implementation.
/// The type must implement `Default`.
///
/// # Examples
///
/// ```rust
/// use polycodec::reflect_opaque;
///
/// #[derive(Debug, Default, PartialEq)]
/// struct Money {
///     cents: i64,
/// }
///
/// reflect_opaque!(Money);
/// ```
#[macro_export]
macro_rules! reflect_opaque {
    ($name:ident) => {
        impl $crate::reflect::Typed for $name {
            fn type_info() -> $crate::reflect::TypeInfo {
                $crate::reflect::TypeInfo::Opaque
            }
        }

        impl $crate::reflect::Reflect for $name {
            $crate::__reflect_any_methods!(default_reset);

            fn reflect_ref(&self) -> $crate::reflect::ReflectRef<'_> {
                $crate::reflect::ReflectRef::Opaque
            }

            fn reflect_mut(&mut self) -> $crate::reflect::ReflectMut<'_> {
                $crate::reflect::ReflectMut::Opaque
            }
        }
    };
    ($name:ident, self_codec) => {
        impl $crate::reflect::Typed for $name {
            fn type_info() -> $crate::reflect::TypeInfo {
                $crate::reflect::TypeInfo::Opaque
            }
        }

        impl $crate::reflect::Reflect for $name {
            $crate::__reflect_any_methods!(default_reset);

            fn reflect_ref(&self) -> $crate::reflect::ReflectRef<'_> {
                $crate::reflect::ReflectRef::Opaque
            }

            fn reflect_mut(&mut self) -> $crate::reflect::ReflectMut<'_> {
                $crate::reflect::ReflectMut::Opaque
            }

            fn as_self_codec(&self) -> Option<&dyn $crate::reflect::SelfCodec> {
                Some(self)
            }

            fn as_self_codec_mut(&mut self) -> Option<&mut dyn $crate::reflect::SelfCodec> {
                Some(self)
            }
        }
    };
}
