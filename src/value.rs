//! Untyped value representation.
//!
//! This module provides the [`Value`] enum, the destination used when the
//! shape of incoming data is not known at compile time, and [`RawExt`], the
//! tagged payload kept for extension values without a registered type.
//!
//! ## Usage Patterns
//!
//! ### Creating Values
//!
//! ```rust
//! use polycodec::{value, Value};
//!
//! let nil = Value::Nil;
//! let number = Value::from(42_i64);
//! let text = Value::from("hello");
//!
//! let obj = value!({
//!     "name": "widget",
//!     "count": 7
//! });
//! assert_eq!(obj.as_map().map(|m| m.len()), Some(2));
//! ```
//!
//! ### Decoding Unknown Data
//!
//! ```rust
//! use polycodec::{from_slice, CborHandle, Value};
//!
//! let handle = CborHandle::new();
//! // [1, "a"]
//! let value: Value = from_slice(&handle, &[0x82, 0x01, 0x61, b'a']).unwrap();
//! assert_eq!(value, Value::Array(vec![Value::from(1_u64), Value::from("a")]));
//! ```
//!
//! ### Numbers
//!
//! Signed and unsigned integers compare equal when they hold the same number,
//! so `Value::Int(5) == Value::Uint(5)`. Floats compare by bit pattern, which
//! makes every `Value` usable as a map key.

use crate::reflect::{Reflect, ReflectMut, ReflectRef, TypeInfo, Typed};
use crate::ValueMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::hash::{Hash, Hasher};

/// A dynamically typed value of any wire format.
///
/// # Examples
///
/// ```rust
/// use polycodec::Value;
///
/// let v = Value::from(-3_i32);
/// assert!(v.is_number());
/// assert_eq!(v.as_i64(), Some(-3));
/// assert_eq!(v.as_u64(), None);
/// ```
#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    Time(DateTime<Utc>),
    Array(Vec<Value>),
    Map(ValueMap),
    Ext(RawExt),
}

/// An extension value whose tag has no registered type.
///
/// The payload is either the untouched bytes (formats with a native ext
/// header) or the value that followed the tag (CBOR), never both.
///
/// # Examples
///
/// ```rust
/// use polycodec::{ExtPayload, RawExt};
///
/// let ext = RawExt::with_data(7, vec![0, 0, 4, 26]);
/// assert_eq!(ext.tag, 7);
/// assert_eq!(ext.data(), Some(&[0, 0, 4, 26][..]));
/// assert!(matches!(ext.payload, ExtPayload::Data(_)));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct RawExt {
    pub tag: u64,
    pub payload: ExtPayload,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ExtPayload {
    Data(Vec<u8>),
    Value(Box<Value>),
}

impl Default for ExtPayload {
    fn default() -> Self {
        ExtPayload::Data(Vec::new())
    }
}

impl RawExt {
    pub fn with_data(tag: u64, data: Vec<u8>) -> Self {
        RawExt {
            tag,
            payload: ExtPayload::Data(data),
        }
    }

    pub fn with_value(tag: u64, value: Value) -> Self {
        RawExt {
            tag,
            payload: ExtPayload::Value(Box::new(value)),
        }
    }

    #[must_use]
    pub fn data(&self) -> Option<&[u8]> {
        match &self.payload {
            ExtPayload::Data(d) => Some(d),
            ExtPayload::Value(_) => None,
        }
    }

    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        match &self.payload {
            ExtPayload::Value(v) => Some(v),
            ExtPayload::Data(_) => None,
        }
    }
}

impl Value {
    #[inline]
    #[must_use]
    pub const fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    #[inline]
    #[must_use]
    pub const fn is_number(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Uint(_) | Value::Float(_))
    }

    #[inline]
    #[must_use]
    pub const fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }

    #[inline]
    #[must_use]
    pub const fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    #[inline]
    #[must_use]
    pub const fn is_map(&self) -> bool {
        matches!(self, Value::Map(_))
    }

    #[inline]
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the value as `i64` if it is an integer in range.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use polycodec::Value;
    ///
    /// assert_eq!(Value::Uint(42).as_i64(), Some(42));
    /// assert_eq!(Value::Uint(u64::MAX).as_i64(), None);
    /// assert_eq!(Value::Float(1.0).as_i64(), None);
    /// ```
    #[inline]
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Int(i) => Some(i),
            Value::Uint(u) => i64::try_from(u).ok(),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Value::Uint(u) => Some(u),
            Value::Int(i) => u64::try_from(i).ok(),
            _ => None,
        }
    }

    /// Returns any number as `f64`.
    #[inline]
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Float(f) => Some(f),
            Value::Int(i) => Some(i as f64),
            Value::Uint(u) => Some(u as f64),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_time(&self) -> Option<&DateTime<Utc>> {
        match self {
            Value::Time(t) => Some(t),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(arr) => Some(arr),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_map(&self) -> Option<&ValueMap> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_ext(&self) -> Option<&RawExt> {
        match self {
            Value::Ext(ext) => Some(ext),
            _ => None,
        }
    }

    /// Name of the variant, used in error messages.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) | Value::Uint(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Time(_) => "time",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
            Value::Ext(_) => "extension",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Uint(a), Value::Uint(b)) => a == b,
            (Value::Int(i), Value::Uint(u)) | (Value::Uint(u), Value::Int(i)) => {
                u64::try_from(*i).map_or(false, |i| i == *u)
            }
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Time(a), Value::Time(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Ext(a), Value::Ext(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Value::Nil => state.write_u8(0),
            Value::Bool(b) => {
                state.write_u8(1);
                b.hash(state);
            }
            // Non-negative signed values hash like the unsigned ones they equal.
            Value::Int(i) if *i >= 0 => {
                state.write_u8(3);
                (*i as u64).hash(state);
            }
            Value::Int(i) => {
                state.write_u8(2);
                i.hash(state);
            }
            Value::Uint(u) => {
                state.write_u8(3);
                u.hash(state);
            }
            Value::Float(f) => {
                state.write_u8(4);
                f.to_bits().hash(state);
            }
            Value::String(s) => {
                state.write_u8(5);
                s.hash(state);
            }
            Value::Bytes(b) => {
                state.write_u8(6);
                b.hash(state);
            }
            Value::Time(t) => {
                state.write_u8(7);
                t.hash(state);
            }
            Value::Array(arr) => {
                state.write_u8(8);
                arr.hash(state);
            }
            // Map equality ignores order, so only the size is hashed.
            Value::Map(map) => {
                state.write_u8(9);
                map.len().hash(state);
            }
            Value::Ext(ext) => {
                state.write_u8(10);
                ext.hash(state);
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Uint(u) => write!(f, "{}", u),
            Value::Float(fl) => write!(f, "{}", fl),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Bytes(b) => write!(f, "bytes[{}]", b.len()),
            Value::Time(t) => write!(f, "{}", t.to_rfc3339()),
            Value::Array(arr) => {
                write!(f, "[")?;
                for (i, v) in arr.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            Value::Map(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}:{}", k, v)?;
                }
                write!(f, "}}")
            }
            Value::Ext(ext) => write!(f, "ext({})", ext.tag),
        }
    }
}

impl Typed for Value {
    fn type_info() -> TypeInfo {
        TypeInfo::Dynamic
    }
}

impl Reflect for Value {
    crate::__reflect_any_methods!(default_reset);

    fn reflect_ref(&self) -> ReflectRef<'_> {
        ReflectRef::Dynamic(self)
    }

    fn reflect_mut(&mut self) -> ReflectMut<'_> {
        ReflectMut::Dynamic(self)
    }
}

impl Typed for RawExt {
    fn type_info() -> TypeInfo {
        TypeInfo::RawExt
    }
}

impl Reflect for RawExt {
    crate::__reflect_any_methods!(default_reset);

    fn reflect_ref(&self) -> ReflectRef<'_> {
        ReflectRef::RawExt(self)
    }

    fn reflect_mut(&mut self) -> ReflectMut<'_> {
        ReflectMut::RawExt(self)
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Nil => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Uint(u) => serializer.serialize_u64(*u),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::String(s) => serializer.serialize_str(s),
            Value::Bytes(b) => serializer.serialize_bytes(b),
            Value::Time(t) => serializer.serialize_str(&t.to_rfc3339()),
            Value::Array(arr) => {
                use serde::ser::SerializeSeq;
                let mut seq = serializer.serialize_seq(Some(arr.len()))?;
                for element in arr {
                    seq.serialize_element(element)?;
                }
                seq.end()
            }
            Value::Map(map) => {
                use serde::ser::SerializeMap;
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map.iter() {
                    out.serialize_entry(k, v)?;
                }
                out.end()
            }
            Value::Ext(ext) => {
                use serde::ser::SerializeMap;
                let mut out = serializer.serialize_map(Some(2))?;
                out.serialize_entry("tag", &ext.tag)?;
                match &ext.payload {
                    ExtPayload::Data(d) => out.serialize_entry("data", d)?,
                    ExtPayload::Value(v) => out.serialize_entry("value", v)?,
                }
                out.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::{self, Visitor};

        struct ValueVisitor;

        impl<'de> Visitor<'de> for ValueVisitor {
            type Value = Value;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("any value")
            }

            fn visit_bool<E>(self, value: bool) -> Result<Self::Value, E> {
                Ok(Value::Bool(value))
            }

            fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E> {
                Ok(Value::Int(value))
            }

            fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E> {
                Ok(Value::Uint(value))
            }

            fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E> {
                Ok(Value::Float(value))
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E> {
                Ok(Value::String(value.to_string()))
            }

            fn visit_string<E>(self, value: String) -> Result<Self::Value, E> {
                Ok(Value::String(value))
            }

            fn visit_bytes<E>(self, value: &[u8]) -> Result<Self::Value, E> {
                Ok(Value::Bytes(value.to_vec()))
            }

            fn visit_byte_buf<E>(self, value: Vec<u8>) -> Result<Self::Value, E> {
                Ok(Value::Bytes(value))
            }

            fn visit_unit<E>(self) -> Result<Self::Value, E> {
                Ok(Value::Nil)
            }

            fn visit_none<E>(self) -> Result<Self::Value, E> {
                Ok(Value::Nil)
            }

            fn visit_some<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
            where
                D: Deserializer<'de>,
            {
                Deserialize::deserialize(deserializer)
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: de::SeqAccess<'de>,
            {
                let mut vec = Vec::new();
                while let Some(elem) = seq.next_element()? {
                    vec.push(elem);
                }
                Ok(Value::Array(vec))
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: de::MapAccess<'de>,
            {
                let mut values = ValueMap::new();
                while let Some((key, value)) = map.next_entry::<Value, Value>()? {
                    values.insert(key, value);
                }
                Ok(Value::Map(values))
            }
        }

        deserializer.deserialize_any(ValueVisitor)
    }
}

impl TryFrom<Value> for i64 {
    type Error = crate::Error;

    fn try_from(value: Value) -> crate::Result<Self> {
        value.as_i64().ok_or_else(|| {
            crate::Error::custom(format!("expected integer, found {}", value.kind_name()))
        })
    }
}

impl TryFrom<Value> for u64 {
    type Error = crate::Error;

    fn try_from(value: Value) -> crate::Result<Self> {
        value.as_u64().ok_or_else(|| {
            crate::Error::custom(format!(
                "expected non-negative integer, found {}",
                value.kind_name()
            ))
        })
    }
}

impl TryFrom<Value> for f64 {
    type Error = crate::Error;

    fn try_from(value: Value) -> crate::Result<Self> {
        value.as_f64().ok_or_else(|| {
            crate::Error::custom(format!("expected number, found {}", value.kind_name()))
        })
    }
}

impl TryFrom<Value> for bool {
    type Error = crate::Error;

    fn try_from(value: Value) -> crate::Result<Self> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(crate::Error::custom(format!(
                "expected bool, found {}",
                other.kind_name()
            ))),
        }
    }
}

impl TryFrom<Value> for String {
    type Error = crate::Error;

    fn try_from(value: Value) -> crate::Result<Self> {
        match value {
            Value::String(s) => Ok(s),
            other => Err(crate::Error::custom(format!(
                "expected string, found {}",
                other.kind_name()
            ))),
        }
    }
}

macro_rules! from_int {
    ($variant:ident as $wide:ty: $($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value as $wide)
                }
            }
        )*
    };
}

from_int!(Int as i64: i8, i16, i32, i64, isize);
from_int!(Uint as u64: u8, u16, u32, u64, usize);

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Float(f64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Value::Bytes(value.to_vec())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::Time(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::Array(value)
    }
}

impl From<ValueMap> for Value {
    fn from(value: ValueMap) -> Self {
        Value::Map(value)
    }
}

impl From<RawExt> for Value {
    fn from(value: RawExt) -> Self {
        Value::Ext(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_signed_and_unsigned_compare_by_number() {
        assert_eq!(Value::Int(5), Value::Uint(5));
        assert_ne!(Value::Int(-5), Value::Uint(5));

        let mut set = HashSet::new();
        set.insert(Value::Int(5));
        assert!(set.contains(&Value::Uint(5)));
    }

    #[test]
    fn test_floats_compare_by_bits() {
        assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
        assert_ne!(Value::Float(0.0), Value::Float(-0.0));
    }

    #[test]
    fn test_tryfrom() {
        assert_eq!(i64::try_from(Value::Uint(42)).unwrap(), 42);
        assert!(i64::try_from(Value::from("x")).is_err());
        assert_eq!(u64::try_from(Value::Int(7)).unwrap(), 7);
        assert!(u64::try_from(Value::Int(-7)).is_err());
        assert_eq!(f64::try_from(Value::Int(2)).unwrap(), 2.0);
        assert!(bool::try_from(Value::Bool(true)).unwrap());
        assert_eq!(String::try_from(Value::from("hi")).unwrap(), "hi");
    }

    #[test]
    fn test_from_primitives() {
        assert_eq!(Value::from(true), Value::Bool(true));
        assert_eq!(Value::from(42_i32), Value::Int(42));
        assert_eq!(Value::from(42_u8), Value::Uint(42));
        assert_eq!(Value::from(1.5_f32), Value::Float(1.5));
        assert_eq!(Value::from(&b"ab"[..]), Value::Bytes(vec![b'a', b'b']));
    }

    #[test]
    fn test_serde_json_interop() {
        let value: Value = serde_json::from_str(r#"{"a":[1,-2,1.5,null,"x"]}"#).unwrap();
        let map = value.as_map().unwrap();
        let arr = map.get("a").and_then(Value::as_array).unwrap();
        assert_eq!(arr[0], Value::Uint(1));
        assert_eq!(arr[1], Value::Int(-2));
        assert_eq!(arr[2], Value::Float(1.5));
        assert!(arr[3].is_nil());

        let back = serde_json::to_string(&value).unwrap();
        assert_eq!(back, r#"{"a":[1,-2,1.5,null,"x"]}"#);
    }

    #[test]
    fn test_raw_ext_payload_is_exclusive() {
        let ext = RawExt::with_value(9, Value::from(1_u8));
        assert!(ext.data().is_none());
        assert_eq!(ext.value(), Some(&Value::Uint(1)));
    }
}
