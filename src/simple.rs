//! The simple binary format.
//!
//! Every value starts with one descriptor byte:
//!
//! | descriptor | value |
//! |---|---|
//! | `1` | nil |
//! | `2` / `3` | false / true |
//! | `4` / `5` | float32 / float64, big-endian |
//! | `8..=11` | non-negative integer in 1, 2, 4 or 8 big-endian bytes |
//! | `12..=15` | negative integer, magnitude in 1, 2, 4 or 8 bytes |
//! | `24` | time: i64 seconds and u32 nanoseconds since the epoch |
//! | `216..=220` | string |
//! | `224..=228` | bytes |
//! | `232..=236` | array |
//! | `240..=244` | map |
//! | `248..=252` | extension: length, one tag byte, payload |
//!
//! For the length-prefixed kinds, `base` means length 0 and `base + 1..=4`
//! is followed by a 1, 2, 4 or 8 byte length.

use crate::driver::{ContainerLen, DecDriver, EncDriver, ExtMode, Handle, IntoInner, Naked, ValueType};
use crate::options::Options;
use crate::reader::ByteReader;
use crate::registry::Registry;
use crate::{Error, Result};
use chrono::{DateTime, TimeZone, Utc};
use std::io;
use std::sync::Arc;

const NIL: u8 = 1;
const FALSE: u8 = 2;
const TRUE: u8 = 3;
const FLOAT32: u8 = 4;
const FLOAT64: u8 = 5;
const POS_INT: u8 = 8;
const NEG_INT: u8 = 12;
const TIME: u8 = 24;
const STRING: u8 = 216;
const BYTES: u8 = 224;
const ARRAY: u8 = 232;
const MAP: u8 = 240;
const EXT: u8 = 248;

/// Handle for the simple binary format.
///
/// # Examples
///
/// ```rust
/// use polycodec::{from_slice, to_vec, SimpleHandle};
///
/// let handle = SimpleHandle::new();
/// let bytes = to_vec(&handle, &-300_i32).unwrap();
/// assert_eq!(bytes, [13, 0x01, 0x2c]);
/// assert_eq!(from_slice::<i32>(&handle, &bytes).unwrap(), -300);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SimpleHandle {
    options: Options,
    registry: Arc<Registry>,
    enc_zero_values_as_nil: bool,
}

impl SimpleHandle {
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

    /// Encode zero numbers, empty strings and the epoch as nil (except map keys).
    #[must_use]
    pub fn with_enc_zero_values_as_nil(mut self, enabled: bool) -> Self {
        self.enc_zero_values_as_nil = enabled;
        self
    }

    pub fn enc_zero_values_as_nil(&self) -> bool {
        self.enc_zero_values_as_nil
    }
}

impl Handle for SimpleHandle {
    type EncDriver<W: io::Write> = SimpleEncDriver<W>;
    type DecDriver<R: ByteReader> = SimpleDecDriver<R>;

    fn name(&self) -> &'static str {
        "simple"
    }

    fn options(&self) -> &Options {
        &self.options
    }

    fn registry(&self) -> &Registry {
        &self.registry
    }

    fn new_enc_driver<W: io::Write>(&self, w: W) -> SimpleEncDriver<W> {
        SimpleEncDriver {
            w,
            zero_as_nil: self.enc_zero_values_as_nil,
            in_key: false,
        }
    }

    fn new_dec_driver<R: ByteReader>(&self, r: R) -> SimpleDecDriver<R> {
        SimpleDecDriver { r }
    }
}

pub struct SimpleEncDriver<W> {
    w: W,
    zero_as_nil: bool,
    in_key: bool,
}

impl<W: io::Write> SimpleEncDriver<W> {
    #[inline]
    fn nil_instead(&self, is_zero: bool) -> bool {
        self.zero_as_nil && is_zero && !self.in_key
    }

    /// Smallest of 1, 2, 4 or 8 bytes.
    fn write_uint(&mut self, base: u8, v: u64) -> Result<()> {
        if let Ok(v) = u8::try_from(v) {
            self.w.write_all(&[base, v])?;
        } else if let Ok(v) = u16::try_from(v) {
            self.w.write_all(&[base + 1])?;
            self.w.write_all(&v.to_be_bytes())?;
        } else if let Ok(v) = u32::try_from(v) {
            self.w.write_all(&[base + 2])?;
            self.w.write_all(&v.to_be_bytes())?;
        } else {
            self.w.write_all(&[base + 3])?;
            self.w.write_all(&v.to_be_bytes())?;
        }
        Ok(())
    }

    fn write_len(&mut self, base: u8, len: usize) -> Result<()> {
        if len == 0 {
            self.w.write_all(&[base])?;
            return Ok(());
        }
        self.write_uint(base + 1, len as u64)
    }
}

impl<W: io::Write> EncDriver for SimpleEncDriver<W> {
    fn encode_nil(&mut self) -> Result<()> {
        self.w.write_all(&[NIL])?;
        Ok(())
    }

    fn encode_bool(&mut self, v: bool) -> Result<()> {
        if self.nil_instead(!v) {
            return self.encode_nil();
        }
        self.w.write_all(&[if v { TRUE } else { FALSE }])?;
        Ok(())
    }

    fn encode_i64(&mut self, v: i64) -> Result<()> {
        if self.nil_instead(v == 0) {
            return self.encode_nil();
        }
        if v < 0 {
            self.write_uint(NEG_INT, v.unsigned_abs())
        } else {
            self.write_uint(POS_INT, v as u64)
        }
    }

    fn encode_u64(&mut self, v: u64) -> Result<()> {
        if self.nil_instead(v == 0) {
            return self.encode_nil();
        }
        self.write_uint(POS_INT, v)
    }

    fn encode_f32(&mut self, v: f32) -> Result<()> {
        if self.nil_instead(v == 0.0) {
            return self.encode_nil();
        }
        self.w.write_all(&[FLOAT32])?;
        self.w.write_all(&v.to_be_bytes())?;
        Ok(())
    }

    fn encode_f64(&mut self, v: f64) -> Result<()> {
        if self.nil_instead(v == 0.0) {
            return self.encode_nil();
        }
        self.w.write_all(&[FLOAT64])?;
        self.w.write_all(&v.to_be_bytes())?;
        Ok(())
    }

    fn encode_str(&mut self, v: &str) -> Result<()> {
        if self.nil_instead(v.is_empty()) {
            return self.encode_nil();
        }
        self.write_len(STRING, v.len())?;
        self.w.write_all(v.as_bytes())?;
        Ok(())
    }

    fn encode_bytes(&mut self, v: &[u8]) -> Result<()> {
        self.write_len(BYTES, v.len())?;
        self.w.write_all(v)?;
        Ok(())
    }

    fn encode_time(&mut self, v: &DateTime<Utc>) -> Result<()> {
        if self.nil_instead(v.timestamp() == 0 && v.timestamp_subsec_nanos() == 0) {
            return self.encode_nil();
        }
        self.w.write_all(&[TIME])?;
        self.w.write_all(&v.timestamp().to_be_bytes())?;
        self.w.write_all(&v.timestamp_subsec_nanos().to_be_bytes())?;
        Ok(())
    }

    fn ext_mode(&self) -> ExtMode {
        ExtMode::Bytes
    }

    fn encode_ext(&mut self, tag: u64, data: &[u8]) -> Result<()> {
        let tag = u8::try_from(tag)
            .map_err(|_| Error::unsupported(format!("extension tag {tag} exceeds one byte")))?;
        self.write_len(EXT, data.len())?;
        self.w.write_all(&[tag])?;
        self.w.write_all(data)?;
        Ok(())
    }

    fn write_array_start(&mut self, len: usize) -> Result<()> {
        self.in_key = false;
        self.write_len(ARRAY, len)
    }

    fn write_array_elem(&mut self, _first: bool) -> Result<()> {
        self.in_key = false;
        Ok(())
    }

    fn write_map_start(&mut self, len: usize) -> Result<()> {
        self.in_key = false;
        self.write_len(MAP, len)
    }

    fn write_map_elem_key(&mut self, _first: bool) -> Result<()> {
        self.in_key = true;
        Ok(())
    }

    fn write_map_elem_value(&mut self) -> Result<()> {
        self.in_key = false;
        Ok(())
    }

    fn at_end_of_encode(&mut self) -> Result<()> {
        self.w.flush()?;
        Ok(())
    }
}

impl<W: io::Write> IntoInner<W> for SimpleEncDriver<W> {
    fn into_inner(self) -> W {
        self.w
    }

    fn replace_inner(&mut self, inner: W) -> W {
        self.in_key = false;
        std::mem::replace(&mut self.w, inner)
    }
}

pub struct SimpleDecDriver<R> {
    r: R,
}

impl<R: ByteReader> SimpleDecDriver<R> {
    fn peek(&mut self) -> Result<u8> {
        let pos = self.r.position();
        self.r.peek_u8()?.ok_or_else(|| Error::eof(pos, "a descriptor"))
    }

    fn invalid(&self, bd: u8, expected: &str) -> Error {
        Error::type_mismatch(self.r.position(), expected, &describe(bd))
    }

    /// Reads the 1, 2, 4 or 8 byte unsigned integer selected by `width`.
    fn read_width(&mut self, width: u8) -> Result<u64> {
        Ok(match width {
            0 => u64::from(self.r.read_u8()?),
            1 => u64::from(u16::from_be_bytes(self.r.read_array()?)),
            2 => u64::from(u32::from_be_bytes(self.r.read_array()?)),
            _ => u64::from_be_bytes(self.r.read_array()?),
        })
    }

    fn read_len(&mut self, bd: u8, base: u8) -> Result<usize> {
        let pos = self.r.position();
        if bd == base {
            return Ok(0);
        }
        let len = self.read_width(bd - base - 1)?;
        usize::try_from(len).map_err(|_| Error::length(pos, format!("length {len} too large")))
    }

    /// Reads an integer as sign and magnitude.
    fn read_int(&mut self) -> Result<(bool, u64)> {
        let bd = self.r.read_u8()?;
        match bd {
            POS_INT..=11 => Ok((false, self.read_width(bd - POS_INT)?)),
            NEG_INT..=15 => Ok((true, self.read_width(bd - NEG_INT)?)),
            _ => Err(self.invalid(bd, "integer")),
        }
    }

    fn read_text(&mut self) -> Result<&[u8]> {
        let bd = self.r.read_u8()?;
        let base = match bd {
            STRING..=220 => STRING,
            BYTES..=228 => BYTES,
            _ => return Err(self.invalid(bd, "string or bytes")),
        };
        let len = self.read_len(bd, base)?;
        self.r.read_exact(len)
    }
}

fn describe(bd: u8) -> String {
    let kind = match bd {
        NIL => "nil",
        FALSE | TRUE => "bool",
        FLOAT32 | FLOAT64 => "float",
        POS_INT..=15 => "integer",
        TIME => "time",
        STRING..=220 => "string",
        BYTES..=228 => "bytes",
        ARRAY..=236 => "array",
        MAP..=244 => "map",
        EXT..=252 => "extension",
        _ => return format!("invalid descriptor 0x{bd:02x}"),
    };
    kind.to_string()
}

fn negate(pos: usize, magnitude: u64) -> Result<i64> {
    if magnitude == 1 << 63 {
        return Ok(i64::MIN);
    }
    i64::try_from(magnitude)
        .map(|m| -m)
        .map_err(|_| Error::overflow(pos, format!("-{magnitude}"), "i64"))
}

impl<R: ByteReader> DecDriver for SimpleDecDriver<R> {
    fn position(&self) -> usize {
        self.r.position()
    }

    fn container_type(&mut self) -> Result<ValueType> {
        Ok(match self.peek()? {
            NIL => ValueType::Nil,
            STRING..=220 => ValueType::String,
            BYTES..=228 => ValueType::Bytes,
            ARRAY..=236 => ValueType::Array,
            MAP..=244 => ValueType::Map,
            _ => ValueType::Unset,
        })
    }

    fn try_nil(&mut self) -> Result<bool> {
        if self.r.peek_u8()? == Some(NIL) {
            self.r.read_u8()?;
            return Ok(true);
        }
        Ok(false)
    }

    fn decode_bool(&mut self) -> Result<bool> {
        match self.r.read_u8()? {
            FALSE => Ok(false),
            TRUE => Ok(true),
            bd => Err(self.invalid(bd, "bool")),
        }
    }

    fn decode_i64(&mut self) -> Result<i64> {
        let pos = self.r.position();
        match self.read_int()? {
            (true, magnitude) => negate(pos, magnitude),
            (false, v) => i64::try_from(v).map_err(|_| Error::overflow(pos, v, "i64")),
        }
    }

    fn decode_u64(&mut self) -> Result<u64> {
        let pos = self.r.position();
        match self.read_int()? {
            (true, 0) => Ok(0),
            (true, magnitude) => Err(Error::overflow(pos, format!("-{magnitude}"), "u64")),
            (false, v) => Ok(v),
        }
    }

    fn decode_f64(&mut self) -> Result<f64> {
        match self.peek()? {
            FLOAT32 => {
                self.r.read_u8()?;
                Ok(f64::from(f32::from_be_bytes(self.r.read_array()?)))
            }
            FLOAT64 => {
                self.r.read_u8()?;
                Ok(f64::from_be_bytes(self.r.read_array()?))
            }
            _ => match self.read_int()? {
                (true, magnitude) => Ok(-(magnitude as f64)),
                (false, v) => Ok(v as f64),
            },
        }
    }

    fn decode_str(&mut self) -> Result<&str> {
        let pos = self.r.position();
        let bytes = self.read_text()?;
        std::str::from_utf8(bytes).map_err(|e| Error::syntax(pos, format!("invalid UTF-8: {e}")))
    }

    fn decode_bytes(&mut self) -> Result<&[u8]> {
        self.read_text()
    }

    fn decode_time(&mut self) -> Result<DateTime<Utc>> {
        let pos = self.r.position();
        match self.r.read_u8()? {
            TIME => {
                let secs = i64::from_be_bytes(self.r.read_array()?);
                let nanos = u32::from_be_bytes(self.r.read_array()?);
                Utc.timestamp_opt(secs, nanos)
                    .single()
                    .ok_or_else(|| Error::syntax(pos, format!("invalid time {secs}s {nanos}ns")))
            }
            bd => Err(self.invalid(bd, "time")),
        }
    }

    fn ext_mode(&self) -> ExtMode {
        ExtMode::Bytes
    }

    fn decode_ext(&mut self) -> Result<(u64, &[u8])> {
        let bd = self.r.read_u8()?;
        if !(EXT..=252).contains(&bd) {
            return Err(self.invalid(bd, "extension"));
        }
        let len = self.read_len(bd, EXT)?;
        let tag = u64::from(self.r.read_u8()?);
        Ok((tag, self.r.read_exact(len)?))
    }

    fn read_array_start(&mut self) -> Result<ContainerLen> {
        match self.r.read_u8()? {
            bd @ ARRAY..=236 => Ok(ContainerLen::Known(self.read_len(bd, ARRAY)?)),
            bd => Err(self.invalid(bd, "array")),
        }
    }

    fn read_map_start(&mut self) -> Result<ContainerLen> {
        match self.r.read_u8()? {
            bd @ MAP..=244 => Ok(ContainerLen::Known(self.read_len(bd, MAP)?)),
            bd => Err(self.invalid(bd, "map")),
        }
    }

    fn check_break(&mut self) -> Result<bool> {
        Ok(false)
    }

    fn decode_naked(&mut self) -> Result<Naked<'_>> {
        let pos = self.r.position();
        let bd = self.peek()?;
        match bd {
            NIL => {
                self.r.read_u8()?;
                Ok(Naked::Nil)
            }
            FALSE | TRUE => Ok(Naked::Bool(self.decode_bool()?)),
            FLOAT32 | FLOAT64 => Ok(Naked::Float(self.decode_f64()?)),
            POS_INT..=11 => Ok(Naked::Uint(self.read_int()?.1)),
            NEG_INT..=15 => Ok(Naked::Int(negate(pos, self.read_int()?.1)?)),
            TIME => Ok(Naked::Time(self.decode_time()?)),
            STRING..=220 => Ok(Naked::Str(self.decode_str()?)),
            BYTES..=228 => Ok(Naked::Bytes(self.decode_bytes()?)),
            ARRAY..=236 => Ok(Naked::Array),
            MAP..=244 => Ok(Naked::Map),
            EXT..=252 => {
                let (tag, data) = self.decode_ext()?;
                Ok(Naked::Ext { tag, data })
            }
            _ => Err(Error::syntax(pos, format!("invalid descriptor 0x{bd:02x}"))),
        }
    }
}

impl<R: ByteReader> IntoInner<R> for SimpleDecDriver<R> {
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
    use crate::{from_slice, to_vec, ErrorKind, Value};

    #[test]
    fn test_integer_widths() {
        let handle = SimpleHandle::new();
        assert_eq!(to_vec(&handle, &0_u8).unwrap(), [8, 0]);
        assert_eq!(to_vec(&handle, &255_u16).unwrap(), [8, 255]);
        assert_eq!(to_vec(&handle, &256_u16).unwrap(), [9, 1, 0]);
        assert_eq!(to_vec(&handle, &70_000_u32).unwrap(), [10, 0, 1, 0x11, 0x70]);
        assert_eq!(to_vec(&handle, &-1_i64).unwrap(), [12, 1]);
        assert_eq!(
            to_vec(&handle, &i64::MIN).unwrap(),
            [11 + 4, 0x80, 0, 0, 0, 0, 0, 0, 0]
        );
        assert_eq!(from_slice::<i64>(&handle, &[15, 0x80, 0, 0, 0, 0, 0, 0, 0]).unwrap(), i64::MIN);
    }

    #[test]
    fn test_lengths_and_text() {
        let handle = SimpleHandle::new();
        assert_eq!(to_vec(&handle, &String::new()).unwrap(), [STRING]);
        assert_eq!(to_vec(&handle, &"hi".to_string()).unwrap(), [STRING + 1, 2, b'h', b'i']);
        assert_eq!(to_vec(&handle, &vec![0xff_u8; 2]).unwrap(), [BYTES + 1, 2, 0xff, 0xff]);
        let long = "x".repeat(300);
        assert_eq!(&to_vec(&handle, &long).unwrap()[..3], [STRING + 2, 1, 44]);
    }

    #[test]
    fn test_zero_values_as_nil_spares_map_keys() {
        let handle = SimpleHandle::new().with_enc_zero_values_as_nil(true);
        assert_eq!(to_vec(&handle, &0_i32).unwrap(), [NIL]);
        assert_eq!(to_vec(&handle, &String::new()).unwrap(), [NIL]);

        let mut m = std::collections::BTreeMap::new();
        m.insert(0_u32, 0_u32);
        assert_eq!(to_vec(&handle, &m).unwrap(), [MAP + 1, 1, POS_INT, 0, NIL]);
    }

    #[test]
    fn test_time_layout() {
        let handle = SimpleHandle::new();
        let t = Utc.timestamp_opt(1, 5).single().unwrap();
        let bytes = to_vec(&handle, &t).unwrap();
        assert_eq!(bytes, [TIME, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 5]);
        assert_eq!(from_slice::<DateTime<Utc>>(&handle, &bytes).unwrap(), t);
    }

    #[test]
    fn test_naked_decoding() {
        let handle = SimpleHandle::new();
        let input = [ARRAY + 1, 4, NIL, TRUE, NEG_INT, 3, EXT + 1, 2, 9, 0xab, 0xcd];
        let v: Value = from_slice(&handle, &input).unwrap();
        let items = v.as_array().unwrap();
        assert_eq!(items[0], Value::Nil);
        assert_eq!(items[1], Value::Bool(true));
        assert_eq!(items[2], Value::Int(-3));
        let ext = items[3].as_ext().unwrap();
        assert_eq!(ext.tag, 9);
        assert_eq!(ext.data(), Some(&[0xab, 0xcd][..]));
    }

    #[test]
    fn test_decode_errors() {
        let mut d = SimpleHandle::new().new_dec_driver(SliceReader::new(&[0xc1]));
        assert_eq!(d.decode_naked().unwrap_err().kind(), ErrorKind::Syntax);

        let mut d = SimpleHandle::new().new_dec_driver(SliceReader::new(&[NEG_INT, 1]));
        assert_eq!(d.decode_u64().unwrap_err().kind(), ErrorKind::Overflow);

        let mut d = SimpleHandle::new().new_dec_driver(SliceReader::new(&[STRING + 1, 5, b'a']));
        assert_eq!(d.decode_str().unwrap_err().kind(), ErrorKind::Syntax);
    }
}
