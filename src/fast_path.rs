//! Specialized routines for common container types.
//!
//! The table maps the `TypeId` of a concrete container (`Vec<i64>`,
//! `HashMap<String, String>`, ...) to monomorphized encode and decode
//! functions. They skip per-element descriptor lookups and dynamic dispatch
//! but call the very same scalar routines and driver sequence as the generic
//! engines, so output bytes and decoded state are identical.
//!
//! The table is built once, sorted by `TypeId`, and searched with a binary
//! search. The registry stores the result in each type descriptor, so the
//! search happens once per type.

use crate::decode::{decode_scalar, reserve_hint, Depth};
use crate::driver::{has_next, DecDriver, EncDriver};
use crate::encode::{canonical_order, encode_scalar};
use crate::options::Options;
use crate::reflect::{Element, Reflect, ReflectMut, ReflectRef};
use crate::{Error, Result};
use std::any::TypeId;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::OnceLock;

pub(crate) type EncodeFn = fn(&dyn Reflect, &mut dyn EncDriver, &Options) -> Result<()>;
pub(crate) type DecodeFn =
    fn(&mut dyn Reflect, &mut dyn DecDriver, &Options, &mut Depth) -> Result<()>;

/// A specialized encode/decode pair for one container type.
pub struct FastPathEntry {
    pub type_id: TypeId,
    /// Element type (value type for maps).
    pub elem: TypeId,
    pub key: Option<TypeId>,
    pub(crate) encode: EncodeFn,
    pub(crate) decode: DecodeFn,
}

impl std::fmt::Debug for FastPathEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastPathEntry")
            .field("type_id", &self.type_id)
            .finish_non_exhaustive()
    }
}

static TABLE: OnceLock<Vec<FastPathEntry>> = OnceLock::new();

/// Finds the fast path of a container type.
pub fn lookup(type_id: TypeId) -> Option<&'static FastPathEntry> {
    let table = TABLE.get_or_init(build_table);
    table
        .binary_search_by_key(&type_id, |e| e.type_id)
        .ok()
        .map(|i| &table[i])
}

/// Number of specialized container types.
pub fn len() -> usize {
    TABLE.get_or_init(build_table).len()
}

fn build_table() -> Vec<FastPathEntry> {
    let mut table = Vec::new();

    macro_rules! seqs {
        ($($t:ty),*) => {
            $( table.push(seq_entry::<$t>()); )*
        };
    }
    macro_rules! maps {
        ($k:ty => $($v:ty),*) => {
            $( table.push(map_entry::<$k, $v>()); )*
        };
    }

    // Vec<u8> is a byte string, not a sequence.
    seqs!(bool, i8, i16, i32, i64, isize, u16, u32, u64, usize, f32, f64, String);
    maps!(String => bool, i32, i64, u8, u32, u64, f32, f64, String);
    maps!(i64 => bool, i64, u64, f64, String);
    maps!(u64 => bool, i64, u64, f64, String);

    table.sort_by_key(|e| e.type_id);
    table
}

fn seq_entry<T: Element>() -> FastPathEntry {
    FastPathEntry {
        type_id: TypeId::of::<Vec<T>>(),
        elem: TypeId::of::<T>(),
        key: None,
        encode: encode_vec::<T>,
        decode: decode_vec::<T>,
    }
}

fn map_entry<K: Element + Eq + Hash, V: Element>() -> FastPathEntry {
    FastPathEntry {
        type_id: TypeId::of::<HashMap<K, V>>(),
        elem: TypeId::of::<V>(),
        key: Some(TypeId::of::<K>()),
        encode: encode_map::<K, V>,
        decode: decode_map::<K, V>,
    }
}

fn mismatch<T>(found: &'static str) -> Error {
    Error::custom(format!(
        "fast path for {} called with {}",
        std::any::type_name::<T>(),
        found
    ))
}

#[inline]
fn encode_elem<T: Reflect>(e: &T, d: &mut dyn EncDriver, o: &Options) -> Result<()> {
    match e.reflect_ref() {
        ReflectRef::Scalar(s) => encode_scalar(d, s, o),
        _ => Err(mismatch::<T>("a non-scalar element")),
    }
}

#[inline]
fn decode_elem<T: Element>(e: &mut T, d: &mut dyn DecDriver, o: &Options) -> Result<()> {
    if d.try_nil()? {
        *e = T::default();
        return Ok(());
    }
    match e.reflect_mut() {
        ReflectMut::Scalar(s) => decode_scalar(d, s, o),
        _ => Err(mismatch::<T>("a non-scalar element")),
    }
}

fn encode_vec<T: Element>(v: &dyn Reflect, d: &mut dyn EncDriver, o: &Options) -> Result<()> {
    let v = v
        .downcast_ref::<Vec<T>>()
        .ok_or_else(|| mismatch::<Vec<T>>(v.reflect_type_name()))?;
    d.write_array_start(v.len())?;
    for (i, e) in v.iter().enumerate() {
        d.write_array_elem(i == 0)?;
        encode_elem(e, d, o)?;
    }
    d.write_array_end()
}

fn decode_vec<T: Element>(
    v: &mut dyn Reflect,
    d: &mut dyn DecDriver,
    o: &Options,
    depth: &mut Depth,
) -> Result<()> {
    let found = v.reflect_type_name();
    let v = v
        .downcast_mut::<Vec<T>>()
        .ok_or_else(|| mismatch::<Vec<T>>(found))?;
    let len = d.read_array_start()?;
    depth.enter(d.position())?;
    let hint = reserve_hint(o, len, std::mem::size_of::<T>(), d.position());
    if hint > v.len() {
        v.reserve(hint - v.len());
    }
    let mut i = 0;
    while has_next(d, len, i)? {
        d.read_array_elem(i == 0)?;
        if i < v.len() {
            if o.slice_element_reset {
                v[i] = T::default();
            }
        } else {
            v.push(T::default());
        }
        decode_elem(&mut v[i], d, o)?;
        i += 1;
    }
    v.truncate(i);
    d.read_array_end()?;
    depth.exit();
    Ok(())
}

fn encode_map<K, V>(m: &dyn Reflect, d: &mut dyn EncDriver, o: &Options) -> Result<()>
where
    K: Element + Eq + Hash,
    V: Element,
{
    let m = m
        .downcast_ref::<HashMap<K, V>>()
        .ok_or_else(|| mismatch::<HashMap<K, V>>(m.reflect_type_name()))?;
    let mut entries: Vec<(&K, &V)> = m.iter().collect();
    if o.canonical {
        // Every fast-path key is a scalar with a natural order.
        entries.sort_by(|a, b| canonical_order(a.0.reflect_ref(), b.0.reflect_ref()));
    }
    d.write_map_start(entries.len())?;
    for (i, (k, v)) in entries.into_iter().enumerate() {
        d.write_map_elem_key(i == 0)?;
        encode_elem(k, d, o)?;
        d.write_map_elem_value()?;
        encode_elem(v, d, o)?;
    }
    d.write_map_end()
}

fn decode_map<K, V>(
    m: &mut dyn Reflect,
    d: &mut dyn DecDriver,
    o: &Options,
    depth: &mut Depth,
) -> Result<()>
where
    K: Element + Eq + Hash,
    V: Element,
{
    let found = m.reflect_type_name();
    let m = m
        .downcast_mut::<HashMap<K, V>>()
        .ok_or_else(|| mismatch::<HashMap<K, V>>(found))?;
    let len = d.read_map_start()?;
    depth.enter(d.position())?;
    if o.replace_maps {
        m.clear();
    }
    let hint = reserve_hint(
        o,
        len,
        std::mem::size_of::<K>() + std::mem::size_of::<V>(),
        d.position(),
    );
    m.reserve(hint);
    let mut i = 0;
    while has_next(d, len, i)? {
        d.read_map_elem_key(i == 0)?;
        let mut key = K::default();
        decode_elem(&mut key, d, o)?;
        d.read_map_elem_value()?;
        let slot = m.entry(key).or_default();
        if o.map_value_reset {
            *slot = V::default();
        }
        decode_elem(slot, d, o)?;
        i += 1;
    }
    d.read_map_end()?;
    depth.exit();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_table_is_sorted_and_searchable() {
        let table = TABLE.get_or_init(build_table);
        assert!(table.windows(2).all(|w| w[0].type_id < w[1].type_id));
        assert!(lookup(TypeId::of::<Vec<String>>()).is_some());
        assert!(lookup(TypeId::of::<HashMap<String, f64>>()).is_some());
        assert_eq!(len(), table.len());
    }

    #[test]
    fn test_unlisted_types_fall_back() {
        assert!(lookup(TypeId::of::<Vec<u8>>()).is_none());
        assert!(lookup(TypeId::of::<BTreeMap<String, String>>()).is_none());
        assert!(lookup(TypeId::of::<Vec<Vec<i32>>>()).is_none());
    }

    #[test]
    fn test_entry_records_element_types() {
        let entry = lookup(TypeId::of::<HashMap<u64, String>>()).unwrap();
        assert_eq!(entry.key, Some(TypeId::of::<u64>()));
        assert_eq!(entry.elem, TypeId::of::<String>());
    }
}
