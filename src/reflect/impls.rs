//! Reflection for std and chrono types.

use super::{
    Element, Map, MapInfo, Optional, Reflect, ReflectMut, ReflectRef, ScalarKind, ScalarMut,
    ScalarRef, Seq, SeqInfo, TypeInfo, TypeRef, Typed,
};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

macro_rules! impl_scalar {
    ($($ty:ty => $kind:ident, |$v:ident| $as_ref:expr;)*) => {
        $(
            impl Typed for $ty {
                fn type_info() -> TypeInfo {
                    TypeInfo::Scalar(ScalarKind::$kind)
                }
            }

            impl Reflect for $ty {
                crate::__reflect_any_methods!(default_reset);

                fn reflect_ref(&self) -> ReflectRef<'_> {
                    let $v = self;
                    ReflectRef::Scalar($as_ref)
                }

                fn reflect_mut(&mut self) -> ReflectMut<'_> {
                    ReflectMut::Scalar(ScalarMut::$kind(self))
                }
            }
        )*
    };
}

impl_scalar! {
    bool => Bool, |v| ScalarRef::Bool(*v);
    i8 => I8, |v| ScalarRef::Int(i64::from(*v));
    i16 => I16, |v| ScalarRef::Int(i64::from(*v));
    i32 => I32, |v| ScalarRef::Int(i64::from(*v));
    i64 => I64, |v| ScalarRef::Int(*v);
    isize => Isize, |v| ScalarRef::Int(*v as i64);
    u8 => U8, |v| ScalarRef::Uint(u64::from(*v));
    u16 => U16, |v| ScalarRef::Uint(u64::from(*v));
    u32 => U32, |v| ScalarRef::Uint(u64::from(*v));
    u64 => U64, |v| ScalarRef::Uint(*v);
    usize => Usize, |v| ScalarRef::Uint(*v as u64);
    f32 => F32, |v| ScalarRef::F32(*v);
    f64 => F64, |v| ScalarRef::F64(*v);
    char => Char, |v| ScalarRef::Char(*v);
    String => String, |v| ScalarRef::Str(v.as_str());
    DateTime<Utc> => Time, |v| ScalarRef::Time(v);
}

#[inline]
fn is_u8<T: 'static>() -> bool {
    TypeId::of::<T>() == TypeId::of::<u8>()
}

// Vec<u8> is raw bytes, every other Vec is a sequence.
impl<T: Element> Typed for Vec<T> {
    fn type_info() -> TypeInfo {
        if is_u8::<T>() {
            TypeInfo::Scalar(ScalarKind::Bytes)
        } else {
            TypeInfo::Seq(SeqInfo {
                elem: TypeRef::of::<T>(),
                fixed_len: None,
                pairs: false,
            })
        }
    }
}

impl<T: Element> Reflect for Vec<T> {
    crate::__reflect_any_methods!();

    fn reset(&mut self) {
        self.clear();
    }

    fn reflect_ref(&self) -> ReflectRef<'_> {
        match (self as &dyn Any).downcast_ref::<Vec<u8>>() {
            Some(bytes) => ReflectRef::Scalar(ScalarRef::Bytes(bytes)),
            None => ReflectRef::Seq(self),
        }
    }

    fn reflect_mut(&mut self) -> ReflectMut<'_> {
        if !is_u8::<T>() {
            return ReflectMut::Seq(self);
        }
        match (self as &mut dyn Any).downcast_mut::<Vec<u8>>() {
            Some(bytes) => ReflectMut::Scalar(ScalarMut::Bytes(bytes)),
            None => ReflectMut::Opaque,
        }
    }
}

impl<T: Element> Seq for Vec<T> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn get(&self, index: usize) -> Option<&dyn Reflect> {
        self.as_slice().get(index).map(|e| e as &dyn Reflect)
    }

    fn get_mut(&mut self, index: usize) -> Option<&mut dyn Reflect> {
        self.as_mut_slice()
            .get_mut(index)
            .map(|e| e as &mut dyn Reflect)
    }

    fn push_default(&mut self) -> Option<&mut dyn Reflect> {
        self.push(T::default());
        self.last_mut().map(|e| e as &mut dyn Reflect)
    }

    fn truncate(&mut self, len: usize) {
        Vec::truncate(self, len);
    }

    fn reserve(&mut self, additional: usize) {
        Vec::reserve(self, additional);
    }
}

impl<T: Element, const N: usize> Typed for [T; N] {
    fn type_info() -> TypeInfo {
        TypeInfo::Seq(SeqInfo {
            elem: TypeRef::of::<T>(),
            fixed_len: Some(N),
            pairs: false,
        })
    }
}

impl<T: Element, const N: usize> Reflect for [T; N] {
    crate::__reflect_any_methods!();

    fn reset(&mut self) {
        for elem in self.iter_mut() {
            elem.reset();
        }
    }

    // Byte arrays are written as byte strings like Vec<u8>. Decoding stays
    // element-wise so a byte string or a list of numbers both fill them.
    fn reflect_ref(&self) -> ReflectRef<'_> {
        match (self as &dyn Any).downcast_ref::<[u8; N]>() {
            Some(bytes) => ReflectRef::Scalar(ScalarRef::Bytes(bytes)),
            None => ReflectRef::Seq(self),
        }
    }

    fn reflect_mut(&mut self) -> ReflectMut<'_> {
        ReflectMut::Seq(self)
    }
}

impl<T: Element, const N: usize> Seq for [T; N] {
    fn len(&self) -> usize {
        N
    }

    fn get(&self, index: usize) -> Option<&dyn Reflect> {
        self.as_slice().get(index).map(|e| e as &dyn Reflect)
    }

    fn get_mut(&mut self, index: usize) -> Option<&mut dyn Reflect> {
        self.as_mut_slice()
            .get_mut(index)
            .map(|e| e as &mut dyn Reflect)
    }

    fn push_default(&mut self) -> Option<&mut dyn Reflect> {
        None
    }

    fn truncate(&mut self, len: usize) {
        for elem in self.iter_mut().skip(len) {
            elem.reset();
        }
    }

    fn reserve(&mut self, _additional: usize) {}
}

/// A sequence of flattened key/value pairs that travels as a map.
///
/// Element `2i` is a key and element `2i + 1` its value. Encoding an odd
/// number of elements is an error.
///
/// # Examples
///
/// ```rust
/// use polycodec::{from_slice, to_vec, JsonHandle, Value};
/// use polycodec::reflect::MapBySlice;
///
/// let handle = JsonHandle::new();
/// let pairs = MapBySlice(vec![Value::from("a"), Value::from(1_i64)]);
/// let bytes = to_vec(&handle, &pairs).unwrap();
/// assert_eq!(bytes, br#"{"a":1}"#);
///
/// let back: MapBySlice<Value> = from_slice(&handle, &bytes).unwrap();
/// assert_eq!(back.0.len(), 2);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MapBySlice<T>(pub Vec<T>);

impl<T: Element> Typed for MapBySlice<T> {
    fn type_info() -> TypeInfo {
        TypeInfo::Seq(SeqInfo {
            elem: TypeRef::of::<T>(),
            fixed_len: None,
            pairs: true,
        })
    }
}

impl<T: Element> Reflect for MapBySlice<T> {
    crate::__reflect_any_methods!();

    fn reset(&mut self) {
        self.0.clear();
    }

    fn reflect_ref(&self) -> ReflectRef<'_> {
        ReflectRef::Seq(self)
    }

    fn reflect_mut(&mut self) -> ReflectMut<'_> {
        ReflectMut::Seq(self)
    }
}

impl<T: Element> Seq for MapBySlice<T> {
    fn len(&self) -> usize {
        self.0.len()
    }

    fn get(&self, index: usize) -> Option<&dyn Reflect> {
        self.0.get(index).map(|e| e as &dyn Reflect)
    }

    fn get_mut(&mut self, index: usize) -> Option<&mut dyn Reflect> {
        self.0.get_mut(index).map(|e| e as &mut dyn Reflect)
    }

    fn push_default(&mut self) -> Option<&mut dyn Reflect> {
        self.0.push(T::default());
        self.0.last_mut().map(|e| e as &mut dyn Reflect)
    }

    fn truncate(&mut self, len: usize) {
        self.0.truncate(len);
    }

    fn reserve(&mut self, additional: usize) {
        self.0.reserve(additional);
    }

    fn is_pairs(&self) -> bool {
        true
    }
}

impl<T: Element> Typed for Option<T> {
    fn type_info() -> TypeInfo {
        TypeInfo::Optional(TypeRef::of::<T>())
    }
}

impl<T: Element> Reflect for Option<T> {
    crate::__reflect_any_methods!(default_reset);

    fn reflect_ref(&self) -> ReflectRef<'_> {
        ReflectRef::Optional(self)
    }

    fn reflect_mut(&mut self) -> ReflectMut<'_> {
        ReflectMut::Optional(self)
    }
}

impl<T: Element> Optional for Option<T> {
    fn get(&self) -> Option<&dyn Reflect> {
        self.as_ref().map(|v| v as &dyn Reflect)
    }

    fn get_mut(&mut self) -> Option<&mut dyn Reflect> {
        self.as_mut().map(|v| v as &mut dyn Reflect)
    }

    fn set_none(&mut self) {
        *self = None;
    }

    fn get_or_insert_default(&mut self) -> &mut dyn Reflect {
        self.get_or_insert_with(T::default)
    }
}

impl<T: Element> Typed for Box<T> {
    fn type_info() -> TypeInfo {
        TypeInfo::Boxed(TypeRef::of::<T>())
    }
}

impl<T: Element> Reflect for Box<T> {
    crate::__reflect_any_methods!();

    fn reset(&mut self) {
        (**self).reset();
    }

    fn reflect_ref(&self) -> ReflectRef<'_> {
        ReflectRef::Boxed(&**self)
    }

    fn reflect_mut(&mut self) -> ReflectMut<'_> {
        ReflectMut::Boxed(&mut **self)
    }
}

macro_rules! impl_map {
    ($map:ident, $($bound:tt)+) => {
        impl<K, V> Typed for $map<K, V>
        where
            K: Element + $($bound)+,
            V: Element,
        {
            fn type_info() -> TypeInfo {
                TypeInfo::Map(MapInfo {
                    key: TypeRef::of::<K>(),
                    value: TypeRef::of::<V>(),
                })
            }
        }

        impl<K, V> Reflect for $map<K, V>
        where
            K: Element + $($bound)+,
            V: Element,
        {
            crate::__reflect_any_methods!();

            fn reset(&mut self) {
                self.clear();
            }

            fn reflect_ref(&self) -> ReflectRef<'_> {
                ReflectRef::Map(self)
            }

            fn reflect_mut(&mut self) -> ReflectMut<'_> {
                ReflectMut::Map(self)
            }
        }

        impl<K, V> Map for $map<K, V>
        where
            K: Element + $($bound)+,
            V: Element,
        {
            fn len(&self) -> usize {
                $map::len(self)
            }

            fn iter(&self) -> Box<dyn Iterator<Item = (&dyn Reflect, &dyn Reflect)> + '_> {
                Box::new(
                    $map::iter(self).map(|(k, v)| (k as &dyn Reflect, v as &dyn Reflect)),
                )
            }

            fn clear(&mut self) {
                $map::clear(self);
            }

            fn reserve(&mut self, additional: usize) {
                Reserve::reserve_more(self, additional);
            }

            fn new_key(&self) -> Box<dyn Reflect> {
                Box::new(K::default())
            }

            fn entry_mut(&mut self, key: Box<dyn Reflect>) -> Option<&mut dyn Reflect> {
                let key = key.into_any().downcast::<K>().ok()?;
                Some(self.entry(*key).or_default() as &mut dyn Reflect)
            }
        }
    };
}

trait Reserve {
    fn reserve_more(&mut self, additional: usize);
}

impl<K: Eq + Hash, V> Reserve for HashMap<K, V> {
    fn reserve_more(&mut self, additional: usize) {
        self.reserve(additional);
    }
}

impl<K: Eq + Hash, V> Reserve for IndexMap<K, V> {
    fn reserve_more(&mut self, additional: usize) {
        self.reserve(additional);
    }
}

impl<K: Ord, V> Reserve for BTreeMap<K, V> {
    fn reserve_more(&mut self, _additional: usize) {}
}

impl_map!(HashMap, Eq + Hash);
impl_map!(BTreeMap, Ord);
impl_map!(IndexMap, Eq + Hash);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_vectors_are_scalars() {
        let bytes = vec![1_u8, 2, 3];
        assert!(matches!(
            bytes.reflect_ref(),
            ReflectRef::Scalar(ScalarRef::Bytes(&[1, 2, 3]))
        ));
        assert!(matches!(
            <Vec<u8> as Typed>::type_info(),
            TypeInfo::Scalar(ScalarKind::Bytes)
        ));

        let mut words = vec![1_u16, 2];
        assert!(matches!(words.reflect_mut(), ReflectMut::Seq(_)));
    }

    #[test]
    fn test_byte_arrays_read_as_bytes() {
        let digest = [1_u8, 2, 3];
        assert!(matches!(
            digest.reflect_ref(),
            ReflectRef::Scalar(ScalarRef::Bytes(&[1, 2, 3]))
        ));
        let mut digest = digest;
        assert!(matches!(digest.reflect_mut(), ReflectMut::Seq(_)));

        let words = [1_u16, 2];
        assert!(matches!(words.reflect_ref(), ReflectRef::Seq(_)));
    }

    #[test]
    fn test_fixed_array_truncate_resets_tail() {
        let mut arr = [1_i32, 2, 3, 4];
        Seq::truncate(&mut arr, 2);
        assert_eq!(arr, [1, 2, 0, 0]);
        assert!(Seq::push_default(&mut arr).is_none());
    }

    #[test]
    fn test_map_entry_mut_inserts_zero_value() {
        let mut map: HashMap<String, i64> = HashMap::new();
        map.insert("a".into(), 1);

        let slot = Map::entry_mut(&mut map, Box::new(String::from("b"))).unwrap();
        *slot.downcast_mut::<i64>().unwrap() = 2;
        assert_eq!(map.get("b"), Some(&2));

        // Wrong key type is refused.
        assert!(Map::entry_mut(&mut map, Box::new(5_u8)).is_none());
    }

    #[test]
    fn test_option_get_or_insert_default() {
        let mut opt: Option<u32> = None;
        let inner = Optional::get_or_insert_default(&mut opt);
        *inner.downcast_mut::<u32>().unwrap() = 9;
        assert_eq!(opt, Some(9));
        Optional::set_none(&mut opt);
        assert_eq!(opt, None);
    }
}
