//! Ordered map type for untyped values.
//!
//! [`ValueMap`] wraps an [`IndexMap`] keyed by [`Value`], so maps decoded
//! without a typed destination keep the order in which their entries arrived
//! on the wire. Keys may be any value, not only strings: CBOR and the simple
//! format allow integer or byte keys.
//!
//! ## Examples
//!
//! ```rust
//! use polycodec::{Value, ValueMap};
//!
//! let mut map = ValueMap::new();
//! map.insert("name", "widget");
//! map.insert(7_u64, true);
//!
//! assert_eq!(map.len(), 2);
//! assert_eq!(map.get("name").and_then(|v| v.as_str()), Some("widget"));
//! assert_eq!(map.get(7_u64), Some(&Value::Bool(true)));
//! ```

use crate::reflect::{Reflect, ReflectMut, ReflectRef, TypeInfo, Typed};
use crate::Value;
use indexmap::IndexMap;
use std::collections::HashMap;

/// An insertion ordered map of values to values.
///
/// Equality ignores order, like [`IndexMap`].
///
/// # Examples
///
/// ```rust
/// use polycodec::ValueMap;
///
/// let mut map = ValueMap::new();
/// map.insert("first", 1_i64);
/// map.insert("second", 2_i64);
///
/// let keys: Vec<_> = map.keys().filter_map(|k| k.as_str()).collect();
/// assert_eq!(keys, vec!["first", "second"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValueMap(IndexMap<Value, Value>);

impl ValueMap {
    #[must_use]
    pub fn new() -> Self {
        ValueMap(IndexMap::new())
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        ValueMap(IndexMap::with_capacity(capacity))
    }

    /// Inserts a key-value pair, returning the previous value for the key.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use polycodec::ValueMap;
    ///
    /// let mut map = ValueMap::new();
    /// assert!(map.insert("key", 42_i64).is_none());
    /// assert!(map.insert("key", 43_i64).is_some());
    /// ```
    pub fn insert<K: Into<Value>, V: Into<Value>>(&mut self, key: K, value: V) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    #[must_use]
    pub fn get<K: Into<Value>>(&self, key: K) -> Option<&Value> {
        self.0.get(&key.into())
    }

    pub fn get_mut<K: Into<Value>>(&mut self, key: K) -> Option<&mut Value> {
        self.0.get_mut(&key.into())
    }

    /// Removes a key, keeping the order of the remaining entries.
    pub fn remove<K: Into<Value>>(&mut self, key: K) -> Option<Value> {
        self.0.shift_remove(&key.into())
    }

    #[must_use]
    pub fn contains_key<K: Into<Value>>(&self, key: K) -> bool {
        self.0.contains_key(&key.into())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn keys(&self) -> indexmap::map::Keys<'_, Value, Value> {
        self.0.keys()
    }

    pub fn values(&self) -> indexmap::map::Values<'_, Value, Value> {
        self.0.values()
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, Value, Value> {
        self.0.iter()
    }

    pub(crate) fn entry_or_nil(&mut self, key: Value) -> &mut Value {
        self.0.entry(key).or_default()
    }
}

// A standalone ValueMap travels as a plain map.
impl Typed for ValueMap {
    fn type_info() -> TypeInfo {
        <IndexMap<Value, Value> as Typed>::type_info()
    }
}

impl Reflect for ValueMap {
    crate::__reflect_any_methods!(default_reset);

    fn reflect_ref(&self) -> ReflectRef<'_> {
        ReflectRef::Map(&self.0)
    }

    fn reflect_mut(&mut self) -> ReflectMut<'_> {
        ReflectMut::Map(&mut self.0)
    }
}

impl From<HashMap<String, Value>> for ValueMap {
    fn from(map: HashMap<String, Value>) -> Self {
        map.into_iter().map(|(k, v)| (Value::String(k), v)).collect()
    }
}

impl IntoIterator for ValueMap {
    type Item = (Value, Value);
    type IntoIter = indexmap::map::IntoIter<Value, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ValueMap {
    type Item = (&'a Value, &'a Value);
    type IntoIter = indexmap::map::Iter<'a, Value, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<(Value, Value)> for ValueMap {
    fn from_iter<T: IntoIterator<Item = (Value, Value)>>(iter: T) -> Self {
        ValueMap(IndexMap::from_iter(iter))
    }
}
