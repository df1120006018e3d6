use std::any::TypeId;
use std::fmt;

/// Static shape information for a type.
///
/// This is what the [`Registry`](crate::Registry) compiles into a
/// [`TypeDescriptor`](crate::TypeDescriptor) the first time a type is seen.
#[derive(Clone, Debug)]
pub enum TypeInfo {
    /// A primitive: number, bool, text, bytes or timestamp.
    Scalar(ScalarKind),
    /// A record with named fields.
    Struct(StructInfo),
    /// A homogeneous sequence.
    Seq(SeqInfo),
    /// A keyed collection.
    Map(MapInfo),
    /// A nil-able pointer or interface (`Option<T>`).
    Optional(TypeRef),
    /// A non-nil pointer (`Box<T>`).
    Boxed(TypeRef),
    /// A channel-like source/sink of elements.
    Chan(TypeRef),
    /// The untyped [`Value`](crate::Value).
    Dynamic,
    /// The tagged [`RawExt`](crate::RawExt) payload.
    RawExt,
    /// A type with no traversable shape; needs an extension or a self codec.
    Opaque,
}

/// Primitive kinds understood by every driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScalarKind {
    Bool,
    I8,
    I16,
    I32,
    I64,
    Isize,
    U8,
    U16,
    U32,
    U64,
    Usize,
    F32,
    F64,
    Char,
    String,
    Bytes,
    Time,
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScalarKind::Bool => "bool",
            ScalarKind::I8 => "i8",
            ScalarKind::I16 => "i16",
            ScalarKind::I32 => "i32",
            ScalarKind::I64 => "i64",
            ScalarKind::Isize => "isize",
            ScalarKind::U8 => "u8",
            ScalarKind::U16 => "u16",
            ScalarKind::U32 => "u32",
            ScalarKind::U64 => "u64",
            ScalarKind::Usize => "usize",
            ScalarKind::F32 => "f32",
            ScalarKind::F64 => "f64",
            ScalarKind::Char => "char",
            ScalarKind::String => "string",
            ScalarKind::Bytes => "bytes",
            ScalarKind::Time => "time",
        };
        f.pad(name)
    }
}

/// A lazy reference to another type's identity and shape.
///
/// Containers refer to their element types through `TypeRef` rather than an
/// embedded [`TypeInfo`], which keeps recursive types finite.
#[derive(Clone, Copy)]
pub struct TypeRef {
    name: &'static str,
    size: usize,
    id: fn() -> TypeId,
    info: fn() -> TypeInfo,
}

impl TypeRef {
    pub fn of<T: super::Typed>() -> Self {
        TypeRef {
            name: std::any::type_name::<T>(),
            size: std::mem::size_of::<T>(),
            id: TypeId::of::<T>,
            info: T::type_info,
        }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// In-memory size of one value, used to bound pre-allocations.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn type_id(&self) -> TypeId {
        (self.id)()
    }

    #[inline]
    pub fn info(&self) -> TypeInfo {
        (self.info)()
    }
}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TypeRef").field(&self.name).finish()
    }
}

/// Struct tags as `(namespace, tag)` pairs, e.g. `("codec", "name,omitempty")`.
pub type Tags = &'static [(&'static str, &'static str)];

#[derive(Clone, Debug)]
pub struct StructInfo {
    pub name: &'static str,
    /// Struct-level tags (`toarray`, `omitempty`).
    pub tags: Tags,
    pub fields: Vec<FieldInfo>,
}

#[derive(Clone, Debug)]
pub struct FieldInfo {
    pub name: &'static str,
    pub tags: Tags,
    pub ty: TypeRef,
}

impl FieldInfo {
    pub fn new<F: super::Typed>(name: &'static str, tags: Tags) -> Self {
        FieldInfo {
            name,
            tags,
            ty: TypeRef::of::<F>(),
        }
    }

    /// Builds a field from an accessor, letting the compiler infer the field type.
    pub fn from_accessor<S, F: super::Typed>(
        name: &'static str,
        tags: Tags,
        _accessor: fn(&S) -> &F,
    ) -> Self {
        Self::new::<F>(name, tags)
    }
}

#[derive(Clone, Debug)]
pub struct SeqInfo {
    pub elem: TypeRef,
    /// Length of a fixed-size array.
    pub fixed_len: Option<usize>,
    /// Elements are flattened key/value pairs and travel as a map.
    pub pairs: bool,
}

#[derive(Clone, Debug)]
pub struct MapInfo {
    pub key: TypeRef,
    pub value: TypeRef,
}
