//! # polycodec
//!
//! A reflection-driven codec with pluggable wire formats.
//!
//! ## What is polycodec?
//!
//! One encode engine and one decode engine walk a value's shape (scalar,
//! struct, sequence, map, optional, channel or untyped [`Value`]) and talk to
//! a wire-format driver through a small set of primitive operations. The
//! same Rust value can therefore be written as JSON, CBOR or a compact
//! binary format just by switching the [`Handle`].
//!
//! ## Key Features
//!
//! - **Pluggable Formats**: [`JsonHandle`], [`CborHandle`] and [`SimpleHandle`]
//!   share every engine rule; a new format only implements the driver traits
//! - **Struct Tags**: wire names, `omitempty`, `inline` and `toarray` declared
//!   through [`reflect_struct!`]
//! - **Extensions**: user types with a custom wire representation under a
//!   numeric tag, registered once on a [`Registry`]
//! - **Merge Decoding**: decoding updates the destination in place, so
//!   partial input leaves the rest of the value untouched
//! - **Hardened Decoding**: a depth limit, bounded pre-allocation, range
//!   checked integers, and no `unsafe` code
//!
//! ## Quick Start
//!
//! ```rust
//! use polycodec::{from_slice, reflect_struct, to_vec, CborHandle, JsonHandle};
//!
//! #[derive(Debug, Default, PartialEq)]
//! struct Widget {
//!     name: String,
//!     count: u32,
//! }
//!
//! reflect_struct!(Widget {
//!     name codec = "name",
//!     count codec = "count",
//! });
//!
//! let widget = Widget { name: "widget".into(), count: 7 };
//!
//! let json = to_vec(&JsonHandle::new(), &widget).unwrap();
//! assert_eq!(json, br#"{"name":"widget","count":7}"#);
//!
//! let cbor = to_vec(&CborHandle::new(), &widget).unwrap();
//! let back: Widget = from_slice(&CborHandle::new(), &cbor).unwrap();
//! assert_eq!(back, widget);
//! ```
//!
//! ### Reusing Encoders and Decoders
//!
//! ```rust
//! use polycodec::{Decoder, Encoder, SimpleHandle};
//!
//! let handle = SimpleHandle::new();
//! let mut enc = Encoder::new(Vec::new(), &handle);
//! enc.encode(&vec![1_u32, 2]).unwrap();
//! enc.encode(&"tail".to_string()).unwrap();
//! let bytes = enc.into_inner();
//!
//! let mut dec = Decoder::from_slice(&bytes, &handle);
//! let mut numbers: Vec<u32> = Vec::new();
//! let mut tail = String::new();
//! dec.decode(&mut numbers).unwrap();
//! dec.decode(&mut tail).unwrap();
//! assert_eq!((numbers, tail.as_str()), (vec![1, 2], "tail"));
//! ```
//!
//! ### Dynamic Values with value! Macro
//!
//! ```rust
//! use polycodec::{to_vec, value, JsonHandle};
//!
//! let data = value!({
//!     "name": "widget",
//!     "tags": ["a", "b"],
//!     "parent": null
//! });
//! let json = to_vec(&JsonHandle::new(), &data).unwrap();
//! assert_eq!(json, br#"{"name":"widget","tags":["a","b"],"parent":null}"#);
//! ```
//!
//! ## Performance Characteristics
//!
//! - **Descriptors**: built once per type and cached in the [`Registry`]
//! - **Fast Paths**: `Vec`s of scalars and `HashMap`s of common key/value
//!   types bypass per-element dispatch
//! - **Zero Copy**: decoding from a slice hands out views into the input
//!   instead of copying strings and byte strings
//!
//! ## Safety Guarantees
//!
//! - No `unsafe` code blocks
//! - Every failure is an [`Error`]; only `must_encode` / `must_decode` panic
//! - Numeric narrowing never truncates silently
//!
//! ## Examples
//!
//! See the `demos/` directory:
//!
//! - **`simple.rs`** - one value through all three formats
//! - **`extensions.rs`** - registering a custom wire representation
//!
//! Run any example with: `cargo run --example <name>`

pub mod cbor;
pub mod channel;
pub mod decode;
pub mod descriptor;
pub mod driver;
pub mod encode;
pub mod error;
pub mod fast_path;
pub mod json;
pub mod macros;
pub mod map;
pub mod options;
pub mod reader;
pub mod reflect;
pub mod registry;
pub mod simple;
pub mod value;

pub use cbor::CborHandle;
pub use channel::Chan;
pub use decode::{Decoder, ValueDecoder};
pub use descriptor::{FieldDescriptor, Kind, TypeDescriptor};
pub use driver::{ContainerLen, DecDriver, EncDriver, ExtMode, Handle, Naked, ValueType};
pub use encode::{Encoder, ValueEncoder};
pub use error::{Error, ErrorKind, Result};
pub use json::{IntegerAsString, JsonHandle};
pub use map::ValueMap;
pub use options::{ChanTimeout, Options};
pub use reader::{ByteReader, IoReader, SliceReader};
pub use reflect::{Element, MapBySlice, Reflect};
pub use registry::{Extension, Registry};
pub use simple::SimpleHandle;
pub use value::{ExtPayload, RawExt, Value};

use std::io;

/// Encodes `value` into a new byte vector.
///
/// # Examples
///
/// ```rust
/// use polycodec::{to_vec, SimpleHandle};
///
/// let bytes = to_vec(&SimpleHandle::new(), &true).unwrap();
/// assert_eq!(bytes, [3]);
/// ```
///
/// # Errors
///
/// Returns an error if the value cannot be represented in the wire format
/// (a non-finite float in JSON, an opaque type without an extension, ...).
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn to_vec(handle: &impl Handle, value: &dyn Reflect) -> Result<Vec<u8>> {
    let mut enc = Encoder::new(Vec::new(), handle);
    enc.encode(value)?;
    Ok(enc.into_inner())
}

/// Encodes `value` into `writer`.
///
/// # Examples
///
/// ```rust
/// use polycodec::{to_writer, JsonHandle};
///
/// let mut buffer = Vec::new();
/// to_writer(&mut buffer, &JsonHandle::new(), &vec![1_i64, 2]).unwrap();
/// assert_eq!(buffer, b"[1,2]");
/// ```
///
/// # Errors
///
/// Returns an error if encoding fails or the writer fails.
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn to_writer<W: io::Write>(writer: W, handle: &impl Handle, value: &dyn Reflect) -> Result<()> {
    Encoder::new(writer, handle).encode(value)
}

/// Decodes a fresh `T` from a byte slice.
///
/// # Examples
///
/// ```rust
/// use polycodec::{from_slice, JsonHandle};
///
/// let v = from_slice::<Vec<u16>>(&JsonHandle::new(), b"[1, 2, 3]").unwrap();
/// assert_eq!(v, [1, 2, 3]);
/// ```
///
/// # Errors
///
/// Returns an error if the input is malformed or does not fit `T`.
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn from_slice<T: Element>(handle: &impl Handle, data: &[u8]) -> Result<T> {
    let mut value = T::default();
    Decoder::from_slice(data, handle).decode(&mut value)?;
    Ok(value)
}

/// Decodes a fresh `T` from an I/O stream.
///
/// The reader is buffered internally; bytes after the value may have been
/// consumed from it.
///
/// # Examples
///
/// ```rust
/// use polycodec::{from_reader, CborHandle};
/// use std::io::Cursor;
///
/// let cursor = Cursor::new(vec![0x63, b'a', b'b', b'c']);
/// let s: String = from_reader(&CborHandle::new(), cursor).unwrap();
/// assert_eq!(s, "abc");
/// ```
///
/// # Errors
///
/// Returns an error if reading fails, the input is malformed, or it does
/// not fit `T`.
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn from_reader<T: Element, R: io::Read>(handle: &impl Handle, reader: R) -> Result<T> {
    let mut value = T::default();
    Decoder::from_reader(reader, handle).decode(&mut value)?;
    Ok(value)
}

/// Decodes into an existing value, merging with its current contents.
///
/// # Examples
///
/// ```rust
/// use polycodec::{decode_into, JsonHandle};
/// use std::collections::BTreeMap;
///
/// let mut m = BTreeMap::from([("a".to_string(), 1_i32)]);
/// decode_into(&JsonHandle::new(), br#"{"b":2}"#, &mut m).unwrap();
/// assert_eq!(m.len(), 2);
/// ```
///
/// # Errors
///
/// Returns an error if the input is malformed or does not fit `dst`. The
/// destination may be partially updated when that happens.
pub fn decode_into(handle: &impl Handle, data: &[u8], dst: &mut dyn Reflect) -> Result<()> {
    Decoder::from_slice(data, handle).decode(dst)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Debug, Default, PartialEq)]
    struct Point {
        x: i32,
        y: i32,
    }

    reflect_struct!(Point {
        x codec = "x",
        y codec = "y",
    });

    fn round_trip<T: Element + PartialEq + std::fmt::Debug>(handle: &impl Handle, v: &T) {
        let bytes = to_vec(handle, v).unwrap();
        let back: T = from_slice(handle, &bytes).unwrap();
        assert_eq!(&back, v, "{} round trip", handle.name());
    }

    #[test]
    fn test_point_in_every_format() {
        let p = Point { x: 1, y: -2 };
        round_trip(&JsonHandle::new(), &p);
        round_trip(&CborHandle::new(), &p);
        round_trip(&SimpleHandle::new(), &p);
    }

    #[test]
    fn test_collections_in_every_format() {
        let m: HashMap<String, Vec<i64>> = [("a".to_string(), vec![1, -1]), ("b".to_string(), vec![])].into();
        round_trip(&JsonHandle::new(), &m);
        round_trip(&CborHandle::new(), &m);
        round_trip(&SimpleHandle::new(), &m);
    }

    #[test]
    fn test_to_writer_matches_to_vec() {
        let handle = CborHandle::new();
        let mut out = Vec::new();
        to_writer(&mut out, &handle, &Point { x: 3, y: 4 }).unwrap();
        assert_eq!(out, to_vec(&handle, &Point { x: 3, y: 4 }).unwrap());
    }

    #[test]
    fn test_from_reader() {
        let handle = JsonHandle::new();
        let p: Point = from_reader(&handle, std::io::Cursor::new(br#"{"y":2,"x":1}"#.to_vec())).unwrap();
        assert_eq!(p, Point { x: 1, y: 2 });
    }

    #[test]
    fn test_decode_into_merges() {
        let handle = JsonHandle::new();
        let mut p = Point { x: 9, y: 9 };
        decode_into(&handle, br#"{"y":1}"#, &mut p).unwrap();
        assert_eq!(p, Point { x: 9, y: 1 });
    }
}
