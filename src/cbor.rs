//! CBOR (RFC 8949).
//!
//! Integers and lengths use the smallest head that fits. Containers are
//! definite-length unless [`CborHandle::with_indefinite_length`] is set;
//! decoding accepts both, as well as chunked strings. Extensions travel as
//! `tag(N)` followed by their payload. Timestamps use tag 1 (epoch seconds)
//! or, with [`CborHandle::with_time_rfc3339`], tag 0 (RFC 3339 text).

use crate::driver::{ContainerLen, DecDriver, EncDriver, ExtMode, Handle, IntoInner, Naked, ValueType};
use crate::options::Options;
use crate::reader::ByteReader;
use crate::registry::Registry;
use crate::{Error, Result};
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use std::io;
use std::sync::Arc;

const MAJOR_UINT: u8 = 0;
const MAJOR_NEG_INT: u8 = 1;
const MAJOR_BYTES: u8 = 2;
const MAJOR_TEXT: u8 = 3;
const MAJOR_ARRAY: u8 = 4;
const MAJOR_MAP: u8 = 5;
const MAJOR_TAG: u8 = 6;
const MAJOR_SIMPLE: u8 = 7;

const BD_FALSE: u8 = 0xf4;
const BD_TRUE: u8 = 0xf5;
const BD_NIL: u8 = 0xf6;
const BD_UNDEFINED: u8 = 0xf7;
const BD_FLOAT16: u8 = 0xf9;
const BD_FLOAT32: u8 = 0xfa;
const BD_FLOAT64: u8 = 0xfb;
const BD_BREAK: u8 = 0xff;

const INDEFINITE: u8 = 31;

const TAG_TIME_TEXT: u64 = 0;
const TAG_TIME_EPOCH: u64 = 1;

/// Handle for CBOR.
///
/// # Examples
///
/// ```rust
/// use polycodec::{to_vec, CborHandle};
///
/// let handle = CborHandle::new();
/// assert_eq!(to_vec(&handle, &vec![1_i64, -1]).unwrap(), [0x82, 0x01, 0x20]);
///
/// let streaming = CborHandle::new().with_indefinite_length(true);
/// assert_eq!(to_vec(&streaming, &vec![1_i64]).unwrap(), [0x9f, 0x01, 0xff]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CborHandle {
    options: Options,
    registry: Arc<Registry>,
    indefinite_length: bool,
    time_rfc3339: bool,
    skip_unexpected_tags: bool,
}

impl CborHandle {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn with_registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = registry;
        self
    }

    /// Write containers as `0x9f` / `0xbf` ... `0xff`.
    #[must_use]
    pub fn with_indefinite_length(mut self, enabled: bool) -> Self {
        self.indefinite_length = enabled;
        self
    }

    /// Write timestamps as tag 0 text instead of tag 1 epoch numbers.
    #[must_use]
    pub fn with_time_rfc3339(mut self, enabled: bool) -> Self {
        self.time_rfc3339 = enabled;
        self
    }

    /// Ignore tags in front of values decoded into typed destinations.
    #[must_use]
    pub fn with_skip_unexpected_tags(mut self, enabled: bool) -> Self {
        self.skip_unexpected_tags = enabled;
        self
    }
}

impl Handle for CborHandle {
    type EncDriver<W: io::Write> = CborEncDriver<W>;
    type DecDriver<R: ByteReader> = CborDecDriver<R>;

    fn name(&self) -> &'static str {
        "cbor"
    }

    fn options(&self) -> &Options {
        &self.options
    }

    fn registry(&self) -> &Registry {
        &self.registry
    }

    fn new_enc_driver<W: io::Write>(&self, w: W) -> CborEncDriver<W> {
        CborEncDriver {
            w,
            indefinite: self.indefinite_length,
            time_rfc3339: self.time_rfc3339,
        }
    }

    fn new_dec_driver<R: ByteReader>(&self, r: R) -> CborDecDriver<R> {
        CborDecDriver {
            r,
            skip_tags: self.skip_unexpected_tags,
            scratch: Vec::new(),
        }
    }
}

pub struct CborEncDriver<W> {
    w: W,
    indefinite: bool,
    time_rfc3339: bool,
}

impl<W: io::Write> CborEncDriver<W> {
    fn write_head(&mut self, major: u8, arg: u64) -> Result<()> {
        let major = major << 5;
        if arg < 24 {
            self.w.write_all(&[major | arg as u8])?;
        } else if let Ok(v) = u8::try_from(arg) {
            self.w.write_all(&[major | 24, v])?;
        } else if let Ok(v) = u16::try_from(arg) {
            self.w.write_all(&[major | 25])?;
            self.w.write_all(&v.to_be_bytes())?;
        } else if let Ok(v) = u32::try_from(arg) {
            self.w.write_all(&[major | 26])?;
            self.w.write_all(&v.to_be_bytes())?;
        } else {
            self.w.write_all(&[major | 27])?;
            self.w.write_all(&arg.to_be_bytes())?;
        }
        Ok(())
    }

    fn write_container_start(&mut self, major: u8, len: usize) -> Result<()> {
        if self.indefinite {
            self.w.write_all(&[(major << 5) | INDEFINITE])?;
            Ok(())
        } else {
            self.write_head(major, len as u64)
        }
    }

    fn write_container_end(&mut self) -> Result<()> {
        if self.indefinite {
            self.w.write_all(&[BD_BREAK])?;
        }
        Ok(())
    }
}

impl<W: io::Write> EncDriver for CborEncDriver<W> {
    fn encode_nil(&mut self) -> Result<()> {
        self.w.write_all(&[BD_NIL])?;
        Ok(())
    }

    fn encode_bool(&mut self, v: bool) -> Result<()> {
        self.w.write_all(&[if v { BD_TRUE } else { BD_FALSE }])?;
        Ok(())
    }

    fn encode_i64(&mut self, v: i64) -> Result<()> {
        if v < 0 {
            self.write_head(MAJOR_NEG_INT, !v as u64)
        } else {
            self.write_head(MAJOR_UINT, v as u64)
        }
    }

    fn encode_u64(&mut self, v: u64) -> Result<()> {
        self.write_head(MAJOR_UINT, v)
    }

    fn encode_f32(&mut self, v: f32) -> Result<()> {
        self.w.write_all(&[BD_FLOAT32])?;
        self.w.write_all(&v.to_be_bytes())?;
        Ok(())
    }

    fn encode_f64(&mut self, v: f64) -> Result<()> {
        self.w.write_all(&[BD_FLOAT64])?;
        self.w.write_all(&v.to_be_bytes())?;
        Ok(())
    }

    fn encode_str(&mut self, v: &str) -> Result<()> {
        self.write_head(MAJOR_TEXT, v.len() as u64)?;
        self.w.write_all(v.as_bytes())?;
        Ok(())
    }

    fn encode_bytes(&mut self, v: &[u8]) -> Result<()> {
        self.write_head(MAJOR_BYTES, v.len() as u64)?;
        self.w.write_all(v)?;
        Ok(())
    }

    fn encode_time(&mut self, v: &DateTime<Utc>) -> Result<()> {
        if self.time_rfc3339 {
            self.write_head(MAJOR_TAG, TAG_TIME_TEXT)?;
            return self.encode_str(&v.to_rfc3339_opts(SecondsFormat::AutoSi, true));
        }
        self.write_head(MAJOR_TAG, TAG_TIME_EPOCH)?;
        match v.timestamp_subsec_nanos() {
            0 => self.encode_i64(v.timestamp()),
            nanos => self.encode_f64(v.timestamp() as f64 + f64::from(nanos) / 1e9),
        }
    }

    fn ext_mode(&self) -> ExtMode {
        ExtMode::Tagged
    }

    fn encode_ext(&mut self, tag: u64, data: &[u8]) -> Result<()> {
        self.write_head(MAJOR_TAG, tag)?;
        self.encode_bytes(data)
    }

    fn write_ext_tag(&mut self, tag: u64) -> Result<()> {
        self.write_head(MAJOR_TAG, tag)
    }

    fn write_array_start(&mut self, len: usize) -> Result<()> {
        self.write_container_start(MAJOR_ARRAY, len)
    }

    fn write_array_end(&mut self) -> Result<()> {
        self.write_container_end()
    }

    fn write_map_start(&mut self, len: usize) -> Result<()> {
        self.write_container_start(MAJOR_MAP, len)
    }

    fn write_map_end(&mut self) -> Result<()> {
        self.write_container_end()
    }

    fn at_end_of_encode(&mut self) -> Result<()> {
        self.w.flush()?;
        Ok(())
    }
}

impl<W: io::Write> IntoInner<W> for CborEncDriver<W> {
    fn into_inner(self) -> W {
        self.w
    }

    fn replace_inner(&mut self, inner: W) -> W {
        std::mem::replace(&mut self.w, inner)
    }
}

/// A decoded item head: major type, additional info and argument.
#[derive(Clone, Copy, Debug)]
struct Head {
    major: u8,
    info: u8,
    arg: u64,
}

impl Head {
    fn is_indefinite(&self) -> bool {
        self.info == INDEFINITE
    }
}

pub struct CborDecDriver<R> {
    r: R,
    skip_tags: bool,
    scratch: Vec<u8>,
}

impl<R: ByteReader> CborDecDriver<R> {
    fn peek(&mut self) -> Result<u8> {
        let pos = self.r.position();
        self.r.peek_u8()?.ok_or_else(|| Error::eof(pos, "a CBOR item"))
    }

    fn read_head(&mut self) -> Result<Head> {
        let pos = self.r.position();
        let b = self.r.read_u8()?;
        let (major, info) = (b >> 5, b & 0x1f);
        let arg = match info {
            0..=23 => u64::from(info),
            24 => u64::from(self.r.read_u8()?),
            25 => u64::from(u16::from_be_bytes(self.r.read_array()?)),
            26 => u64::from(u32::from_be_bytes(self.r.read_array()?)),
            27 => u64::from_be_bytes(self.r.read_array()?),
            INDEFINITE if matches!(major, MAJOR_BYTES..=MAJOR_MAP | MAJOR_SIMPLE) => 0,
            _ => return Err(Error::syntax(pos, format!("invalid initial byte 0x{b:02x}"))),
        };
        Ok(Head { major, info, arg })
    }

    fn mismatch(&self, b: u8, expected: &str) -> Error {
        Error::type_mismatch(self.r.position(), expected, describe(b))
    }

    /// Drops tag heads in front of the next item when configured to.
    fn skip_unexpected_tags(&mut self) -> Result<()> {
        while self.skip_tags && self.peek()? >> 5 == MAJOR_TAG {
            self.read_head()?;
        }
        Ok(())
    }

    fn read_len(&mut self, head: Head) -> Result<usize> {
        let pos = self.r.position();
        usize::try_from(head.arg)
            .map_err(|_| Error::length(pos, format!("length {} too large", head.arg)))
    }

    /// Reads a byte or text string, joining indefinite-length chunks.
    fn read_string(&mut self, expected: &str) -> Result<&[u8]> {
        self.skip_unexpected_tags()?;
        let b = self.peek()?;
        let major = b >> 5;
        if major != MAJOR_BYTES && major != MAJOR_TEXT {
            return Err(self.mismatch(b, expected));
        }
        let head = self.read_head()?;
        if !head.is_indefinite() {
            let len = self.read_len(head)?;
            return self.r.read_exact(len);
        }
        self.scratch.clear();
        loop {
            if self.peek()? == BD_BREAK {
                self.r.read_u8()?;
                break;
            }
            let pos = self.r.position();
            let chunk = self.read_head()?;
            if chunk.major != major || chunk.is_indefinite() {
                return Err(Error::syntax(pos, "invalid chunk in indefinite-length string"));
            }
            let len = self.read_len(chunk)?;
            let data = self.r.read_exact(len)?;
            self.scratch.extend_from_slice(data);
        }
        Ok(&self.scratch)
    }

    fn read_int(&mut self) -> Result<(bool, u64)> {
        self.skip_unexpected_tags()?;
        let b = self.peek()?;
        match b >> 5 {
            MAJOR_UINT => Ok((false, self.read_head()?.arg)),
            MAJOR_NEG_INT => Ok((true, self.read_head()?.arg)),
            _ => Err(self.mismatch(b, "integer")),
        }
    }

    fn read_float(&mut self) -> Result<Option<f64>> {
        let v = match self.peek()? {
            BD_FLOAT16 => {
                self.r.read_u8()?;
                f16_to_f64(u16::from_be_bytes(self.r.read_array()?))
            }
            BD_FLOAT32 => {
                self.r.read_u8()?;
                f64::from(f32::from_be_bytes(self.r.read_array()?))
            }
            BD_FLOAT64 => {
                self.r.read_u8()?;
                f64::from_be_bytes(self.r.read_array()?)
            }
            _ => return Ok(None),
        };
        Ok(Some(v))
    }

    /// Reads the content of a time tag whose head was already consumed.
    fn read_time_body(&mut self, tag: u64) -> Result<DateTime<Utc>> {
        let pos = self.r.position();
        match tag {
            TAG_TIME_TEXT => {
                let text = self.decode_str()?;
                DateTime::parse_from_rfc3339(text)
                    .map(|t| t.with_timezone(&Utc))
                    .map_err(|e| Error::syntax(pos, format!("invalid RFC 3339 time: {e}")))
            }
            _ => {
                let secs = self.decode_f64_or_int()?;
                epoch_to_time(pos, secs)
            }
        }
    }

    fn decode_f64_or_int(&mut self) -> Result<EpochSecs> {
        if let Some(f) = self.read_float()? {
            return Ok(EpochSecs::Float(f));
        }
        let pos = self.r.position();
        match self.read_int()? {
            (false, v) => i64::try_from(v)
                .map(EpochSecs::Int)
                .map_err(|_| Error::overflow(pos, v, "i64")),
            (true, v) => i64::try_from(v)
                .map(|v| EpochSecs::Int(-1 - v))
                .map_err(|_| Error::overflow(pos, format!("-1-{v}"), "i64")),
        }
    }
}

enum EpochSecs {
    Int(i64),
    Float(f64),
}

fn epoch_to_time(pos: usize, secs: EpochSecs) -> Result<DateTime<Utc>> {
    let (whole, nanos) = match secs {
        EpochSecs::Int(s) => (s, 0),
        EpochSecs::Float(f) if f.is_finite() => {
            let whole = f.floor();
            let nanos = ((f - whole) * 1e9).round().min(999_999_999.0) as u32;
            (whole as i64, nanos)
        }
        EpochSecs::Float(f) => return Err(Error::syntax(pos, format!("invalid epoch time {f}"))),
    };
    Utc.timestamp_opt(whole, nanos)
        .single()
        .ok_or_else(|| Error::syntax(pos, format!("epoch time {whole} out of range")))
}

/// IEEE 754 half precision to double.
fn f16_to_f64(h: u16) -> f64 {
    let exp = (h >> 10) & 0x1f;
    let mant = f64::from(h & 0x3ff);
    let v = match exp {
        0 => mant * 2f64.powi(-24),
        31 if mant == 0.0 => f64::INFINITY,
        31 => f64::NAN,
        _ => (mant + 1024.0) * 2f64.powi(i32::from(exp) - 25),
    };
    if h & 0x8000 != 0 {
        -v
    } else {
        v
    }
}

fn describe(b: u8) -> &'static str {
    match b >> 5 {
        MAJOR_UINT | MAJOR_NEG_INT => "integer",
        MAJOR_BYTES => "bytes",
        MAJOR_TEXT => "string",
        MAJOR_ARRAY => "array",
        MAJOR_MAP => "map",
        MAJOR_TAG => "tag",
        _ => match b {
            BD_FALSE | BD_TRUE => "bool",
            BD_NIL | BD_UNDEFINED => "nil",
            BD_FLOAT16 | BD_FLOAT32 | BD_FLOAT64 => "float",
            BD_BREAK => "break",
            _ => "simple value",
        },
    }
}

impl<R: ByteReader> DecDriver for CborDecDriver<R> {
    fn position(&self) -> usize {
        self.r.position()
    }

    fn container_type(&mut self) -> Result<ValueType> {
        self.skip_unexpected_tags()?;
        let b = self.peek()?;
        Ok(match b >> 5 {
            MAJOR_BYTES => ValueType::Bytes,
            MAJOR_TEXT => ValueType::String,
            MAJOR_ARRAY => ValueType::Array,
            MAJOR_MAP => ValueType::Map,
            _ if b == BD_NIL || b == BD_UNDEFINED => ValueType::Nil,
            _ => ValueType::Unset,
        })
    }

    fn try_nil(&mut self) -> Result<bool> {
        self.skip_unexpected_tags()?;
        match self.r.peek_u8()? {
            Some(BD_NIL | BD_UNDEFINED) => {
                self.r.read_u8()?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn decode_bool(&mut self) -> Result<bool> {
        self.skip_unexpected_tags()?;
        match self.peek()? {
            BD_FALSE => {
                self.r.read_u8()?;
                Ok(false)
            }
            BD_TRUE => {
                self.r.read_u8()?;
                Ok(true)
            }
            b => Err(self.mismatch(b, "bool")),
        }
    }

    fn decode_i64(&mut self) -> Result<i64> {
        let pos = self.r.position();
        match self.read_int()? {
            (false, v) => i64::try_from(v).map_err(|_| Error::overflow(pos, v, "i64")),
            (true, v) => i64::try_from(v)
                .map(|v| -1 - v)
                .map_err(|_| Error::overflow(pos, format!("-1-{v}"), "i64")),
        }
    }

    fn decode_u64(&mut self) -> Result<u64> {
        let pos = self.r.position();
        match self.read_int()? {
            (false, v) => Ok(v),
            (true, v) => Err(Error::overflow(pos, format!("-1-{v}"), "u64")),
        }
    }

    fn decode_f64(&mut self) -> Result<f64> {
        self.skip_unexpected_tags()?;
        if let Some(f) = self.read_float()? {
            return Ok(f);
        }
        match self.read_int()? {
            (false, v) => Ok(v as f64),
            (true, v) => Ok(-1.0 - v as f64),
        }
    }

    fn decode_str(&mut self) -> Result<&str> {
        let pos = self.r.position();
        let bytes = self.read_string("string")?;
        std::str::from_utf8(bytes).map_err(|e| Error::syntax(pos, format!("invalid UTF-8: {e}")))
    }

    fn decode_bytes(&mut self) -> Result<&[u8]> {
        self.read_string("bytes")
    }

    fn decode_time(&mut self) -> Result<DateTime<Utc>> {
        loop {
            let b = self.peek()?;
            match b >> 5 {
                MAJOR_TAG => {
                    let pos = self.r.position();
                    let tag = self.read_head()?.arg;
                    match tag {
                        TAG_TIME_TEXT | TAG_TIME_EPOCH => return self.read_time_body(tag),
                        _ if self.skip_tags => continue,
                        _ => {
                            return Err(Error::type_mismatch(pos, "time tag 0 or 1", &format!("tag {tag}")))
                        }
                    }
                }
                MAJOR_TEXT => return self.read_time_body(TAG_TIME_TEXT),
                _ => return self.read_time_body(TAG_TIME_EPOCH),
            }
        }
    }

    fn ext_mode(&self) -> ExtMode {
        ExtMode::Tagged
    }

    fn decode_ext(&mut self) -> Result<(u64, &[u8])> {
        let tag = self.read_ext_tag()?;
        Ok((tag, self.read_string("bytes")?))
    }

    fn read_ext_tag(&mut self) -> Result<u64> {
        let b = self.peek()?;
        if b >> 5 != MAJOR_TAG {
            return Err(self.mismatch(b, "tag"));
        }
        Ok(self.read_head()?.arg)
    }

    fn read_array_start(&mut self) -> Result<ContainerLen> {
        self.skip_unexpected_tags()?;
        let b = self.peek()?;
        if b >> 5 != MAJOR_ARRAY {
            return Err(self.mismatch(b, "array"));
        }
        let head = self.read_head()?;
        if head.is_indefinite() {
            return Ok(ContainerLen::Unknown);
        }
        Ok(ContainerLen::Known(self.read_len(head)?))
    }

    fn read_map_start(&mut self) -> Result<ContainerLen> {
        self.skip_unexpected_tags()?;
        let b = self.peek()?;
        if b >> 5 != MAJOR_MAP {
            return Err(self.mismatch(b, "map"));
        }
        let head = self.read_head()?;
        if head.is_indefinite() {
            return Ok(ContainerLen::Unknown);
        }
        Ok(ContainerLen::Known(self.read_len(head)?))
    }

    fn check_break(&mut self) -> Result<bool> {
        if self.peek()? == BD_BREAK {
            self.r.read_u8()?;
            return Ok(true);
        }
        Ok(false)
    }

    fn decode_naked(&mut self) -> Result<Naked<'_>> {
        let pos = self.r.position();
        let b = self.peek()?;
        match b >> 5 {
            MAJOR_UINT => Ok(Naked::Uint(self.read_head()?.arg)),
            MAJOR_NEG_INT => Ok(Naked::Int(self.decode_i64()?)),
            MAJOR_BYTES => Ok(Naked::Bytes(self.decode_bytes()?)),
            MAJOR_TEXT => Ok(Naked::Str(self.decode_str()?)),
            MAJOR_ARRAY => Ok(Naked::Array),
            MAJOR_MAP => Ok(Naked::Map),
            MAJOR_TAG => {
                let tag = self.read_head()?.arg;
                match tag {
                    TAG_TIME_TEXT | TAG_TIME_EPOCH => Ok(Naked::Time(self.read_time_body(tag)?)),
                    _ => Ok(Naked::Tag(tag)),
                }
            }
            _ => match b {
                BD_FALSE | BD_TRUE => Ok(Naked::Bool(self.decode_bool()?)),
                BD_NIL | BD_UNDEFINED => {
                    self.r.read_u8()?;
                    Ok(Naked::Nil)
                }
                BD_FLOAT16 | BD_FLOAT32 | BD_FLOAT64 => Ok(Naked::Float(self.decode_f64()?)),
                _ => Err(Error::syntax(pos, format!("unexpected CBOR byte 0x{b:02x}"))),
            },
        }
    }
}

impl<R: ByteReader> IntoInner<R> for CborDecDriver<R> {
    fn into_inner(self) -> R {
        self.r
    }

    fn replace_inner(&mut self, inner: R) -> R {
        std::mem::replace(&mut self.r, inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::SliceReader;
    use crate::{from_slice, to_vec, RawExt, Value, ValueMap};

    #[test]
    fn test_heads_pick_smallest_width() {
        let handle = CborHandle::new();
        assert_eq!(to_vec(&handle, &23_u64).unwrap(), [0x17]);
        assert_eq!(to_vec(&handle, &24_u64).unwrap(), [0x18, 24]);
        assert_eq!(to_vec(&handle, &1000_u64).unwrap(), [0x19, 0x03, 0xe8]);
        assert_eq!(to_vec(&handle, &-1000_i64).unwrap(), [0x39, 0x03, 0xe7]);
        assert_eq!(to_vec(&handle, &"a".to_string()).unwrap(), [0x61, b'a']);
    }

    #[test]
    fn test_rfc_examples_decode() {
        let handle = CborHandle::new();
        assert_eq!(from_slice::<f64>(&handle, &[0xf9, 0x3c, 0x00]).unwrap(), 1.0);
        assert_eq!(from_slice::<f64>(&handle, &[0xf9, 0xc4, 0x00]).unwrap(), -4.0);
        assert_eq!(from_slice::<f64>(&handle, &[0xf9, 0x00, 0x01]).unwrap(), 5.960464477539063e-8);
        assert!(from_slice::<f64>(&handle, &[0xf9, 0x7c, 0x00]).unwrap().is_infinite());
        assert_eq!(
            from_slice::<i64>(&handle, &[0x3b, 0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff]).unwrap(),
            i64::MIN
        );
        // (_ h'0102', h'030405')
        let chunked = [0x5f, 0x42, 1, 2, 0x43, 3, 4, 5, 0xff];
        assert_eq!(from_slice::<Vec<u8>>(&handle, &chunked).unwrap(), [1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_indefinite_containers_round_trip() {
        let handle = CborHandle::new().with_indefinite_length(true);
        let mut m = ValueMap::new();
        m.insert("k", Value::Array(vec![Value::Uint(1), Value::Bool(false)]));
        let bytes = to_vec(&handle, &m).unwrap();
        assert_eq!(bytes[0], 0xbf);
        assert_eq!(*bytes.last().unwrap(), BD_BREAK);
        assert_eq!(from_slice::<ValueMap>(&CborHandle::new(), &bytes).unwrap(), m);
    }

    #[test]
    fn test_time_encodings() {
        let t = Utc.timestamp_opt(1_363_896_240, 500_000_000).single().unwrap();
        let epoch = to_vec(&CborHandle::new(), &t).unwrap();
        assert_eq!(&epoch[..2], [0xc1, BD_FLOAT64]);
        assert_eq!(from_slice::<DateTime<Utc>>(&CborHandle::new(), &epoch).unwrap(), t);

        let text_handle = CborHandle::new().with_time_rfc3339(true);
        let text = to_vec(&text_handle, &t).unwrap();
        assert_eq!(text[0], 0xc0);
        let back: Value = from_slice(&text_handle, &text).unwrap();
        assert_eq!(back, Value::Time(t));
    }

    #[test]
    fn test_unknown_tags() {
        let handle = CborHandle::new();
        let input = [0xd8, 0x2a, 0x43, 1, 2, 3];
        let raw: RawExt = from_slice(&handle, &input).unwrap();
        assert_eq!(raw.tag, 42);
        assert_eq!(raw.data(), Some(&[1, 2, 3][..]));
        assert!(from_slice::<Vec<u8>>(&handle, &input).is_err());

        let skipping = CborHandle::new().with_skip_unexpected_tags(true);
        assert_eq!(from_slice::<Vec<u8>>(&skipping, &input).unwrap(), [1, 2, 3]);
    }

    #[test]
    fn test_skipped_tags_in_front_of_nil() {
        let skipping = CborHandle::new().with_skip_unexpected_tags(true);
        let mut slot = Some(5_u32);
        crate::decode_into(&skipping, &[0xc2, 0xf6], &mut slot).unwrap();
        assert_eq!(slot, None);

        crate::decode_into(&skipping, &[0xc2, 0x07], &mut slot).unwrap();
        assert_eq!(slot, Some(7));
    }

    #[test]
    fn test_reserved_info_is_a_syntax_error() {
        let mut d = CborHandle::new().new_dec_driver(SliceReader::new(&[0x1c]));
        assert!(d.decode_u64().is_err());
        let mut d = CborHandle::new().new_dec_driver(SliceReader::new(&[0x1f]));
        assert!(d.decode_u64().is_err());
    }
}
