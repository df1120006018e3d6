//! Property-based tests for the round-trip and determinism guarantees.
//!
//! Every property runs against all three wire formats. The fast-path
//! properties also check that table-driven containers encode and decode
//! exactly like their reflective equivalents.

use indexmap::IndexMap;
use polycodec::{
    decode_into, from_slice, reflect_struct, to_vec, CborHandle, Element, Handle, JsonHandle,
    Options, SimpleHandle, Value, ValueMap,
};
use proptest::prelude::*;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Default, PartialEq, Clone)]
struct Widget {
    name: String,
    count: u32,
    tags: Vec<String>,
    parent: Option<Box<Widget>>,
}

reflect_struct!(Widget {
    name codec = "name",
    count codec = "count",
    tags codec = "tags,omitempty",
    parent codec = "parent,omitempty",
});

fn roundtrip_with<T: Element + PartialEq + std::fmt::Debug>(handle: &impl Handle, value: &T) -> bool {
    match to_vec(handle, value) {
        Ok(bytes) => match from_slice::<T>(handle, &bytes) {
            Ok(back) => back == *value,
            Err(e) => {
                eprintln!("{} decode failed: {}", handle.name(), e);
                eprintln!("bytes were: {:?}", bytes);
                false
            }
        },
        Err(e) => {
            eprintln!("{} encode failed: {}", handle.name(), e);
            false
        }
    }
}

fn roundtrip<T: Element + PartialEq + std::fmt::Debug>(value: &T) -> bool {
    roundtrip_with(&JsonHandle::new(), value)
        && roundtrip_with(&CborHandle::new(), value)
        && roundtrip_with(&SimpleHandle::new(), value)
}

fn handles(options: Options) -> (JsonHandle, CborHandle, SimpleHandle) {
    (
        JsonHandle::new().with_options(options.clone()),
        CborHandle::new().with_options(options.clone()),
        SimpleHandle::new().with_options(options),
    )
}

/// Decodes `bytes` over a copy of `prior`.
fn decode_over<T: Element + Clone>(handle: &impl Handle, prior: &T, bytes: &[u8]) -> T {
    let mut target = prior.clone();
    decode_into(handle, bytes, &mut target).unwrap();
    target
}

fn widget() -> impl Strategy<Value = Widget> {
    let leaf = ("[a-z]{0,8}", any::<u32>(), prop::collection::vec("[ -~]{0,6}", 0..4)).prop_map(
        |(name, count, tags)| Widget {
            name,
            count,
            tags,
            parent: None,
        },
    );
    leaf.prop_recursive(3, 8, 1, |inner| {
        (inner.clone(), inner).prop_map(|(mut child, parent)| {
            child.parent = Some(Box::new(parent));
            child
        })
    })
}

/// Values every format represents exactly (no byte strings, finite floats).
fn value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Nil),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Int),
        any::<u64>().prop_map(Value::Uint),
        prop::num::f64::NORMAL.prop_map(Value::Float),
        ".{0,12}".prop_map(Value::String),
    ];
    leaf.prop_recursive(4, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::vec(("[a-z]{1,4}", inner), 0..4).prop_map(|entries| {
                let mut map = ValueMap::new();
                for (k, v) in entries {
                    map.insert(k, v);
                }
                Value::Map(map)
            }),
        ]
    })
}

proptest! {
    #[test]
    fn prop_i64(n in any::<i64>()) {
        prop_assert!(roundtrip(&n));
    }

    #[test]
    fn prop_u64(n in any::<u64>()) {
        prop_assert!(roundtrip(&n));
    }

    #[test]
    fn prop_i8(n in any::<i8>()) {
        prop_assert!(roundtrip(&n));
    }

    #[test]
    fn prop_f64(f in prop::num::f64::NORMAL | prop::num::f64::ZERO) {
        prop_assert!(roundtrip(&f));
    }

    #[test]
    fn prop_string(s in ".{0,40}") {
        prop_assert!(roundtrip(&s));
    }

    #[test]
    fn prop_bytes(b in prop::collection::vec(any::<u8>(), 0..64)) {
        prop_assert!(roundtrip(&b));
    }

    #[test]
    fn prop_vec_i32(v in prop::collection::vec(any::<i32>(), 0..20)) {
        prop_assert!(roundtrip(&v));
    }

    #[test]
    fn prop_option_string(opt in proptest::option::of("[a-z]{0,8}")) {
        prop_assert!(roundtrip(&opt));
    }

    #[test]
    fn prop_hash_map(m in prop::collection::hash_map("[a-z]{0,6}", any::<i64>(), 0..10)) {
        prop_assert!(roundtrip(&m));
    }

    #[test]
    fn prop_btree_map_int_keys(m in prop::collection::btree_map(any::<i32>(), any::<bool>(), 0..10)) {
        prop_assert!(roundtrip(&m));
    }

    #[test]
    fn prop_widget(w in widget()) {
        prop_assert!(roundtrip(&w));
    }

    #[test]
    fn prop_value(v in value()) {
        prop_assert!(roundtrip(&v));
    }

    #[test]
    fn prop_reencode_is_idempotent(v in value()) {
        let handle = CborHandle::new().with_options(Options::new().with_canonical(true));
        let first = to_vec(&handle, &v).unwrap();
        let back: Value = from_slice(&handle, &first).unwrap();
        prop_assert_eq!(to_vec(&handle, &back).unwrap(), first);
    }

    #[test]
    fn prop_canonical_ignores_insertion_order(
        entries in prop::collection::btree_map("[a-z]{1,6}", any::<u32>(), 0..16)
    ) {
        let forward: HashMap<String, u32> = entries.clone().into_iter().collect();
        let mut backward = HashMap::with_capacity(entries.len() * 4);
        for (k, v) in entries.iter().rev() {
            backward.insert(k.clone(), *v);
        }
        let mut ordered = ValueMap::new();
        let mut reversed = ValueMap::new();
        for (k, v) in &entries {
            ordered.insert(k.as_str(), *v);
        }
        for (k, v) in entries.iter().rev() {
            reversed.insert(k.as_str(), *v);
        }

        let canonical = Options::new().with_canonical(true);
        let json = JsonHandle::new().with_options(canonical.clone());
        let simple = SimpleHandle::new().with_options(canonical);
        prop_assert_eq!(to_vec(&json, &forward).unwrap(), to_vec(&json, &backward).unwrap());
        prop_assert_eq!(to_vec(&simple, &ordered).unwrap(), to_vec(&simple, &reversed).unwrap());
        let sorted: BTreeMap<String, u32> = forward.into_iter().collect();
        prop_assert_eq!(to_vec(&json, &ordered).unwrap(), to_vec(&json, &sorted).unwrap());
    }

    #[test]
    fn prop_fast_vec_matches_generic(
        v in prop::collection::vec(any::<u32>(), 0..20),
        prior in prop::collection::vec(any::<u32>(), 0..20),
        reset in any::<bool>(),
    ) {
        let (json, cbor, simple) = handles(Options::new().with_slice_element_reset(reset));
        fast_vec_agrees(&json, &v, &prior)?;
        fast_vec_agrees(&cbor, &v, &prior)?;
        fast_vec_agrees(&simple, &v, &prior)?;
    }

    #[test]
    fn prop_fast_map_matches_generic(
        m in prop::collection::hash_map("[a-z]{0,6}", any::<i64>(), 0..10),
        prior in prop::collection::hash_map("[a-z]{0,6}", any::<i64>(), 0..10),
        replace in any::<bool>(),
        value_reset in any::<bool>(),
    ) {
        let options = Options::new()
            .with_canonical(true)
            .with_replace_maps(replace)
            .with_map_value_reset(value_reset);
        let (json, cbor, simple) = handles(options);
        fast_map_agrees(&json, &m, &prior)?;
        fast_map_agrees(&cbor, &m, &prior)?;
        fast_map_agrees(&simple, &m, &prior)?;
    }
}

// Vec<u32> takes the table path, Vec<Option<u32>> the reflective one.
fn fast_vec_agrees(
    handle: &impl Handle,
    v: &Vec<u32>,
    prior: &Vec<u32>,
) -> Result<(), TestCaseError> {
    let generic: Vec<Option<u32>> = v.iter().copied().map(Some).collect();
    let generic_prior: Vec<Option<u32>> = prior.iter().copied().map(Some).collect();
    let bytes = to_vec(handle, v).unwrap();
    prop_assert_eq!(&bytes, &to_vec(handle, &generic).unwrap());

    let fast: Vec<Option<u32>> = decode_over(handle, prior, &bytes)
        .into_iter()
        .map(Some)
        .collect();
    prop_assert_eq!(fast, decode_over(handle, &generic_prior, &bytes));
    Ok(())
}

// HashMap<String, i64> takes the table path, BTreeMap and IndexMap the reflective one.
fn fast_map_agrees(
    handle: &impl Handle,
    m: &HashMap<String, i64>,
    prior: &HashMap<String, i64>,
) -> Result<(), TestCaseError> {
    let sorted: BTreeMap<String, i64> = m.clone().into_iter().collect();
    let indexed: IndexMap<String, i64> = m.clone().into_iter().collect();
    let bytes = to_vec(handle, m).unwrap();
    prop_assert_eq!(&bytes, &to_vec(handle, &sorted).unwrap());
    prop_assert_eq!(&bytes, &to_vec(handle, &indexed).unwrap());

    let sorted_prior: BTreeMap<String, i64> = prior.clone().into_iter().collect();
    let fast: BTreeMap<String, i64> = decode_over(handle, prior, &bytes).into_iter().collect();
    prop_assert_eq!(fast, decode_over(handle, &sorted_prior, &bytes));
    Ok(())
}
