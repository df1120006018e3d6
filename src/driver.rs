//! The contract between the engines and a wire format.
//!
//! A wire format is a [`Handle`] plus a pair of drivers. The engines never
//! look at bytes themselves: they call [`EncDriver`] to emit primitives and
//! container boundaries, and [`DecDriver`] to read them back.
//!
//! ## Containers
//!
//! Encoding a container always follows the same call sequence:
//!
//! ```text
//! write_array_start(n)  (write_array_elem(first) value)*  write_array_end()
//! write_map_start(n)    (write_map_elem_key(first) key write_map_elem_value() value)*  write_map_end()
//! ```
//!
//! Decoding mirrors it. `read_array_start` / `read_map_start` return
//! [`ContainerLen::Unknown`] for formats that do not announce lengths up front;
//! the engine then polls [`DecDriver::check_break`] before every element.
//!
//! ## Absence marker
//!
//! The engines call [`DecDriver::try_nil`] before decoding any value. A driver
//! that reports `true` has consumed the marker completely.

use crate::options::Options;
use crate::reader::ByteReader;
use crate::registry::Registry;
use crate::Result;
use chrono::{DateTime, Utc};
use std::io;

/// Kind of the next value in the stream, as far as containers are concerned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueType {
    /// Not a container, string, bytes or nil (numbers, bools, timestamps...).
    Unset,
    Nil,
    String,
    Bytes,
    Array,
    Map,
}

/// Length announced by a container header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContainerLen {
    Known(usize),
    /// The end is signalled in-band; poll [`DecDriver::check_break`].
    Unknown,
}

impl ContainerLen {
    /// Length hint for pre-allocation.
    #[inline]
    pub fn hint(self) -> Option<usize> {
        match self {
            ContainerLen::Known(n) => Some(n),
            ContainerLen::Unknown => None,
        }
    }
}

/// How a wire format represents extension values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExtMode {
    /// A dedicated ext header carrying tag and byte payload.
    Bytes,
    /// A tag header followed by an arbitrary value (CBOR major type 6).
    Tagged,
    /// No native support; extensions travel in their value form.
    Text,
}

/// A value decoded without a typed destination.
///
/// For [`Naked::Array`] and [`Naked::Map`] the container header has not been
/// consumed yet; the caller continues with `read_array_start` /
/// `read_map_start`. For [`Naked::Tag`] the tag header has been consumed and
/// the tagged value follows.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Naked<'a> {
    Nil,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Str(&'a str),
    Bytes(&'a [u8]),
    Time(DateTime<Utc>),
    Ext { tag: u64, data: &'a [u8] },
    Tag(u64),
    Array,
    Map,
}

impl Naked<'_> {
    pub fn describe(&self) -> &'static str {
        match self {
            Naked::Nil => "nil",
            Naked::Bool(_) => "bool",
            Naked::Int(_) | Naked::Uint(_) => "integer",
            Naked::Float(_) => "float",
            Naked::Str(_) => "string",
            Naked::Bytes(_) => "bytes",
            Naked::Time(_) => "time",
            Naked::Ext { .. } | Naked::Tag(_) => "extension",
            Naked::Array => "array",
            Naked::Map => "map",
        }
    }
}

/// Emits primitives and container boundaries in one wire format.
pub trait EncDriver {
    fn encode_nil(&mut self) -> Result<()>;

    fn encode_bool(&mut self, v: bool) -> Result<()>;

    fn encode_i64(&mut self, v: i64) -> Result<()>;

    fn encode_u64(&mut self, v: u64) -> Result<()>;

    fn encode_f32(&mut self, v: f32) -> Result<()>;

    fn encode_f64(&mut self, v: f64) -> Result<()>;

    fn encode_str(&mut self, v: &str) -> Result<()>;

    /// Emits a string as raw bytes. Text formats keep it a string.
    fn encode_str_as_raw(&mut self, v: &str) -> Result<()> {
        self.encode_bytes(v.as_bytes())
    }

    fn encode_bytes(&mut self, v: &[u8]) -> Result<()>;

    fn encode_time(&mut self, v: &DateTime<Utc>) -> Result<()>;

    fn ext_mode(&self) -> ExtMode;

    /// Emits a tagged byte payload as one extension value.
    fn encode_ext(&mut self, tag: u64, data: &[u8]) -> Result<()>;

    /// Emits a tag header; the tagged value is written next.
    fn write_ext_tag(&mut self, tag: u64) -> Result<()> {
        Err(crate::Error::unsupported(format!(
            "tag {tag}: format has no tagged values"
        )))
    }

    fn write_array_start(&mut self, len: usize) -> Result<()>;

    fn write_array_elem(&mut self, _first: bool) -> Result<()> {
        Ok(())
    }

    fn write_array_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn write_map_start(&mut self, len: usize) -> Result<()>;

    fn write_map_elem_key(&mut self, _first: bool) -> Result<()> {
        Ok(())
    }

    fn write_map_elem_value(&mut self) -> Result<()> {
        Ok(())
    }

    fn write_map_end(&mut self) -> Result<()> {
        Ok(())
    }

    /// Called once after each top-level value; flushes the sink.
    fn at_end_of_encode(&mut self) -> Result<()>;
}

/// Reads primitives and container boundaries from one wire format.
///
/// Borrowed strings and byte slices are valid until the next call on the
/// driver; copy them to keep them.
pub trait DecDriver {
    /// Offset of the next unread byte.
    fn position(&self) -> usize;

    fn container_type(&mut self) -> Result<ValueType>;

    /// Consumes an absence marker if one is next.
    fn try_nil(&mut self) -> Result<bool>;

    fn decode_bool(&mut self) -> Result<bool>;

    fn decode_i64(&mut self) -> Result<i64>;

    fn decode_u64(&mut self) -> Result<u64>;

    /// Accepts float and integer wire values.
    fn decode_f64(&mut self) -> Result<f64>;

    fn decode_str(&mut self) -> Result<&str>;

    fn decode_bytes(&mut self) -> Result<&[u8]>;

    fn decode_time(&mut self) -> Result<DateTime<Utc>>;

    fn ext_mode(&self) -> ExtMode;

    /// Reads one extension value as `(tag, payload)`.
    fn decode_ext(&mut self) -> Result<(u64, &[u8])>;

    /// Reads a tag header; the tagged value follows.
    fn read_ext_tag(&mut self) -> Result<u64> {
        Err(crate::Error::unsupported("format has no tagged values"))
    }

    fn read_array_start(&mut self) -> Result<ContainerLen>;

    fn read_array_elem(&mut self, _first: bool) -> Result<()> {
        Ok(())
    }

    fn read_array_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn read_map_start(&mut self) -> Result<ContainerLen>;

    fn read_map_elem_key(&mut self, _first: bool) -> Result<()> {
        Ok(())
    }

    fn read_map_elem_value(&mut self) -> Result<()> {
        Ok(())
    }

    fn read_map_end(&mut self) -> Result<()> {
        Ok(())
    }

    /// Whether an unknown-length container has ended.
    fn check_break(&mut self) -> Result<bool>;

    fn decode_naked(&mut self) -> Result<Naked<'_>>;
}

/// Gives back (or swaps) the sink or source a driver is bound to.
pub trait IntoInner<T> {
    fn into_inner(self) -> T;

    fn replace_inner(&mut self, inner: T) -> T;
}

/// A wire format: options, a registry and a pair of drivers.
///
/// Handles are cheap to share by reference; encoders and decoders borrow one
/// for their whole life.
pub trait Handle {
    type EncDriver<W: io::Write>: EncDriver + IntoInner<W>;
    type DecDriver<R: ByteReader>: DecDriver + IntoInner<R>;

    /// Short format name used in logs.
    fn name(&self) -> &'static str;

    fn options(&self) -> &Options;

    fn registry(&self) -> &Registry;

    fn new_enc_driver<W: io::Write>(&self, w: W) -> Self::EncDriver<W>;

    fn new_dec_driver<R: ByteReader>(&self, r: R) -> Self::DecDriver<R>;
}

/// Whether another element follows in a container of length `len`, given
/// that `index` elements were read so far.
#[inline]
pub(crate) fn has_next(d: &mut dyn DecDriver, len: ContainerLen, index: usize) -> Result<bool> {
    match len {
        ContainerLen::Known(n) => Ok(index < n),
        ContainerLen::Unknown => Ok(!d.check_break()?),
    }
}
