//! JSON (RFC 8259).
//!
//! Values without a JSON counterpart are mapped onto strings: byte strings
//! use standard base64 and timestamps RFC 3339. Map keys that are not
//! strings are written quoted, and numbers are accepted in quotes when
//! decoding into numeric destinations. JSON never announces container
//! lengths, so decoding always polls for the closing bracket.

use crate::driver::{ContainerLen, DecDriver, EncDriver, ExtMode, Handle, IntoInner, Naked, ValueType};
use crate::options::Options;
use crate::reader::ByteReader;
use crate::registry::Registry;
use crate::{Error, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::io;
use std::sync::Arc;

/// Largest integer a double represents exactly.
const MAX_SAFE_INTEGER: u64 = 1 << 53;

/// When integers are written as JSON strings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntegerAsString {
    /// Always as bare numbers.
    #[default]
    None,
    /// Always quoted.
    All,
    /// Quoted when the magnitude exceeds 2^53.
    Large,
}

/// Handle for JSON.
///
/// # Examples
///
/// ```rust
/// use polycodec::{to_vec, JsonHandle};
///
/// let handle = JsonHandle::new();
/// let bytes = to_vec(&handle, &vec![Some(1_u8), None]).unwrap();
/// assert_eq!(bytes, b"[1,null]");
///
/// let pretty = JsonHandle::new().with_indent(2);
/// let bytes = to_vec(&pretty, &vec![1_i64]).unwrap();
/// assert_eq!(bytes, b"[\n  1\n]");
/// ```
#[derive(Debug, Clone, Default)]
pub struct JsonHandle {
    options: Options,
    registry: Arc<Registry>,
    indent: i8,
    term_whitespace: bool,
    html_chars_as_is: bool,
    integer_as_string: IntegerAsString,
}

impl JsonHandle {
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

    /// Pretty-print with `n` spaces per level, or `-n` tabs. Zero is compact.
    #[must_use]
    pub fn with_indent(mut self, n: i8) -> Self {
        self.indent = n;
        self
    }

    /// End every top-level value with a newline.
    #[must_use]
    pub fn with_term_whitespace(mut self, enabled: bool) -> Self {
        self.term_whitespace = enabled;
        self
    }

    /// Leave `<`, `>` and `&` unescaped in strings.
    #[must_use]
    pub fn with_html_chars_as_is(mut self, enabled: bool) -> Self {
        self.html_chars_as_is = enabled;
        self
    }

    #[must_use]
    pub fn with_integer_as_string(mut self, mode: IntegerAsString) -> Self {
        self.integer_as_string = mode;
        self
    }
}

impl Handle for JsonHandle {
    type EncDriver<W: io::Write> = JsonEncDriver<W>;
    type DecDriver<R: ByteReader> = JsonDecDriver<R>;

    fn name(&self) -> &'static str {
        "json"
    }

    fn options(&self) -> &Options {
        &self.options
    }

    fn registry(&self) -> &Registry {
        &self.registry
    }

    fn new_enc_driver<W: io::Write>(&self, w: W) -> JsonEncDriver<W> {
        JsonEncDriver {
            w,
            indent: self.indent,
            term_whitespace: self.term_whitespace,
            html_chars_as_is: self.html_chars_as_is,
            integer_as_string: self.integer_as_string,
            in_key: false,
            open: Vec::new(),
        }
    }

    fn new_dec_driver<R: ByteReader>(&self, r: R) -> JsonDecDriver<R> {
        JsonDecDriver {
            r,
            scratch: Vec::new(),
            bytes: Vec::new(),
        }
    }
}

pub struct JsonEncDriver<W> {
    w: W,
    indent: i8,
    term_whitespace: bool,
    html_chars_as_is: bool,
    integer_as_string: IntegerAsString,
    in_key: bool,
    /// One entry per open container: whether it has elements yet.
    open: Vec<bool>,
}

impl<W: io::Write> JsonEncDriver<W> {
    fn newline(&mut self) -> Result<()> {
        if self.indent == 0 {
            return Ok(());
        }
        self.w.write_all(b"\n")?;
        let (unit, width): (&[u8], usize) = if self.indent > 0 {
            (b" ", self.indent as usize)
        } else {
            (b"\t", self.indent.unsigned_abs() as usize)
        };
        for _ in 0..width * self.open.len() {
            self.w.write_all(unit)?;
        }
        Ok(())
    }

    fn open_container(&mut self, bracket: u8) -> Result<()> {
        self.w.write_all(&[bracket])?;
        self.open.push(false);
        Ok(())
    }

    fn close_container(&mut self, bracket: u8) -> Result<()> {
        if self.open.pop().unwrap_or(false) {
            self.newline()?;
        }
        self.w.write_all(&[bracket])?;
        Ok(())
    }

    fn next_elem(&mut self, first: bool) -> Result<()> {
        if !first {
            self.w.write_all(b",")?;
        }
        if let Some(has_elems) = self.open.last_mut() {
            *has_elems = true;
        }
        self.newline()
    }

    /// Writes a number or literal, quoting it when it sits in key position.
    fn write_atom(&mut self, text: &str, quote: bool) -> Result<()> {
        if quote || self.in_key {
            write!(self.w, "\"{text}\"")?;
        } else {
            self.w.write_all(text.as_bytes())?;
        }
        Ok(())
    }

    fn quote_integer(&self, magnitude: u64) -> bool {
        match self.integer_as_string {
            IntegerAsString::None => false,
            IntegerAsString::All => true,
            IntegerAsString::Large => magnitude > MAX_SAFE_INTEGER,
        }
    }

    fn write_escaped(&mut self, s: &str) -> Result<()> {
        self.w.write_all(b"\"")?;
        let mut start = 0;
        for (i, c) in s.char_indices() {
            let short = match c {
                '"' => Some("\\\""),
                '\\' => Some("\\\\"),
                '\n' => Some("\\n"),
                '\r' => Some("\\r"),
                '\t' => Some("\\t"),
                '\u{8}' => Some("\\b"),
                '\u{c}' => Some("\\f"),
                '<' | '>' | '&' if !self.html_chars_as_is => None,
                '\u{2028}' | '\u{2029}' => None,
                c if (c as u32) < 0x20 => None,
                _ => continue,
            };
            self.w.write_all(&s.as_bytes()[start..i])?;
            match short {
                Some(esc) => self.w.write_all(esc.as_bytes())?,
                None => write!(self.w, "\\u{:04x}", c as u32)?,
            }
            start = i + c.len_utf8();
        }
        self.w.write_all(&s.as_bytes()[start..])?;
        self.w.write_all(b"\"")?;
        Ok(())
    }

    fn write_float(&mut self, text: String, finite: bool) -> Result<()> {
        if !finite {
            return Err(Error::unsupported(format!("JSON cannot represent {text}")));
        }
        self.write_atom(&text, false)
    }
}

impl<W: io::Write> EncDriver for JsonEncDriver<W> {
    fn encode_nil(&mut self) -> Result<()> {
        self.write_atom("null", false)
    }

    fn encode_bool(&mut self, v: bool) -> Result<()> {
        self.write_atom(if v { "true" } else { "false" }, false)
    }

    fn encode_i64(&mut self, v: i64) -> Result<()> {
        let quote = self.quote_integer(v.unsigned_abs());
        self.write_atom(&v.to_string(), quote)
    }

    fn encode_u64(&mut self, v: u64) -> Result<()> {
        let quote = self.quote_integer(v);
        self.write_atom(&v.to_string(), quote)
    }

    fn encode_f32(&mut self, v: f32) -> Result<()> {
        self.write_float(format!("{v:?}"), v.is_finite())
    }

    fn encode_f64(&mut self, v: f64) -> Result<()> {
        self.write_float(format!("{v:?}"), v.is_finite())
    }

    fn encode_str(&mut self, v: &str) -> Result<()> {
        self.write_escaped(v)
    }

    fn encode_bytes(&mut self, v: &[u8]) -> Result<()> {
        write!(self.w, "\"{}\"", STANDARD.encode(v))?;
        Ok(())
    }

    fn encode_time(&mut self, v: &DateTime<Utc>) -> Result<()> {
        write!(self.w, "\"{}\"", v.to_rfc3339_opts(SecondsFormat::AutoSi, true))?;
        Ok(())
    }

    fn ext_mode(&self) -> ExtMode {
        ExtMode::Text
    }

    fn encode_ext(&mut self, _tag: u64, data: &[u8]) -> Result<()> {
        self.encode_bytes(data)
    }

    fn write_array_start(&mut self, _len: usize) -> Result<()> {
        self.open_container(b'[')
    }

    fn write_array_elem(&mut self, first: bool) -> Result<()> {
        self.next_elem(first)
    }

    fn write_array_end(&mut self) -> Result<()> {
        self.close_container(b']')
    }

    fn write_map_start(&mut self, _len: usize) -> Result<()> {
        self.open_container(b'{')
    }

    fn write_map_elem_key(&mut self, first: bool) -> Result<()> {
        self.next_elem(first)?;
        self.in_key = true;
        Ok(())
    }

    fn write_map_elem_value(&mut self) -> Result<()> {
        self.in_key = false;
        let sep: &[u8] = if self.indent == 0 { b":" } else { b": " };
        self.w.write_all(sep)?;
        Ok(())
    }

    fn write_map_end(&mut self) -> Result<()> {
        self.close_container(b'}')
    }

    fn at_end_of_encode(&mut self) -> Result<()> {
        if self.term_whitespace {
            self.w.write_all(b"\n")?;
        }
        self.w.flush()?;
        Ok(())
    }
}

impl<W: io::Write> IntoInner<W> for JsonEncDriver<W> {
    fn into_inner(self) -> W {
        self.w
    }

    fn replace_inner(&mut self, inner: W) -> W {
        self.open.clear();
        self.in_key = false;
        std::mem::replace(&mut self.w, inner)
    }
}

pub struct JsonDecDriver<R> {
    r: R,
    /// Unescaped text of the last string or number token.
    scratch: Vec<u8>,
    /// Base64-decoded payload of the last byte string.
    bytes: Vec<u8>,
}

impl<R: ByteReader> JsonDecDriver<R> {
    fn skip_whitespace(&mut self) -> Result<()> {
        while let Some(b' ' | b'\t' | b'\n' | b'\r') = self.r.peek_u8()? {
            self.r.read_u8()?;
        }
        Ok(())
    }

    /// First byte of the next token, not consumed.
    fn peek_token(&mut self) -> Result<u8> {
        self.skip_whitespace()?;
        let pos = self.r.position();
        self.r.peek_u8()?.ok_or_else(|| Error::eof(pos, "a JSON value"))
    }

    fn expect(&mut self, want: u8) -> Result<()> {
        let pos = self.r.position();
        let got = self.peek_token()?;
        if got != want {
            return Err(Error::syntax(
                pos,
                format!("expected '{}', found '{}'", want as char, got as char),
            ));
        }
        self.r.read_u8()?;
        Ok(())
    }

    fn read_literal(&mut self, word: &'static str) -> Result<()> {
        let pos = self.r.position();
        for expected in word.bytes() {
            if self.r.read_u8()? != expected {
                return Err(Error::syntax(pos, format!("invalid literal, expected {word}")));
            }
        }
        Ok(())
    }

    fn mismatch(&self, token: u8, expected: &str) -> Error {
        Error::type_mismatch(self.r.position(), expected, describe(token))
    }

    fn scratch_str(&self, pos: usize) -> Result<&str> {
        std::str::from_utf8(&self.scratch).map_err(|e| Error::syntax(pos, format!("invalid UTF-8: {e}")))
    }

    /// Reads a string token into `scratch`, resolving escapes.
    fn read_string(&mut self) -> Result<()> {
        self.expect(b'"')?;
        self.scratch.clear();
        loop {
            match self.r.read_u8()? {
                b'"' => return Ok(()),
                b'\\' => self.read_escape()?,
                b @ 0..=0x1f => {
                    return Err(Error::syntax(
                        self.r.position() - 1,
                        format!("control character 0x{b:02x} in string"),
                    ))
                }
                b => self.scratch.push(b),
            }
        }
    }

    fn read_escape(&mut self) -> Result<()> {
        let pos = self.r.position();
        let c = match self.r.read_u8()? {
            b'"' => '"',
            b'\\' => '\\',
            b'/' => '/',
            b'b' => '\u{8}',
            b'f' => '\u{c}',
            b'n' => '\n',
            b'r' => '\r',
            b't' => '\t',
            b'u' => {
                let hi = self.read_hex4()?;
                let code = if (0xd800..0xdc00).contains(&hi) {
                    if self.r.read_u8()? != b'\\' || self.r.read_u8()? != b'u' {
                        return Err(Error::syntax(pos, "unpaired surrogate in \\u escape"));
                    }
                    let lo = self.read_hex4()?;
                    if !(0xdc00..0xe000).contains(&lo) {
                        return Err(Error::syntax(pos, "invalid low surrogate in \\u escape"));
                    }
                    0x10000 + ((hi - 0xd800) << 10) + (lo - 0xdc00)
                } else {
                    hi
                };
                char::from_u32(code).ok_or_else(|| Error::syntax(pos, "invalid \\u escape"))?
            }
            b => return Err(Error::syntax(pos, format!("invalid escape '\\{}'", b as char))),
        };
        let mut buf = [0u8; 4];
        self.scratch.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
        Ok(())
    }

    fn read_hex4(&mut self) -> Result<u32> {
        let pos = self.r.position();
        let digits: [u8; 4] = self.r.read_array()?;
        if !digits.iter().all(u8::is_ascii_hexdigit) {
            return Err(Error::syntax(pos, "invalid hex digits in \\u escape"));
        }
        Ok(digits
            .iter()
            .fold(0, |acc, d| (acc << 4) | char::from(*d).to_digit(16).unwrap_or(0)))
    }

    /// Reads the characters of a number token into `scratch`.
    fn read_number(&mut self) -> Result<()> {
        self.scratch.clear();
        while let Some(b) = self.r.peek_u8()? {
            if !matches!(b, b'0'..=b'9' | b'-' | b'+' | b'.' | b'e' | b'E') {
                break;
            }
            self.scratch.push(b);
            self.r.read_u8()?;
        }
        Ok(())
    }

    /// Text of a bare or quoted number.
    fn read_numeric(&mut self, expected: &str) -> Result<&str> {
        let pos = self.r.position();
        match self.peek_token()? {
            b'"' => self.read_string()?,
            b'-' | b'0'..=b'9' => self.read_number()?,
            b => return Err(self.mismatch(b, expected)),
        }
        Ok(self.scratch_str(pos)?.trim())
    }
}

fn describe(token: u8) -> &'static str {
    match token {
        b'{' => "map",
        b'[' => "array",
        b'"' => "string",
        b't' | b'f' => "bool",
        b'n' => "null",
        b'-' | b'0'..=b'9' => "number",
        _ => "invalid character",
    }
}

fn parse_float(pos: usize, text: &str) -> Result<f64> {
    text.parse::<f64>()
        .map_err(|_| Error::syntax(pos, format!("invalid number {text:?}")))
}

/// Integral value of a number written with a fraction or exponent.
fn integral(pos: usize, text: &str, target: &'static str) -> Result<f64> {
    let f = parse_float(pos, text)?;
    if !f.is_finite() {
        return Err(Error::overflow(pos, text, target));
    }
    if f.fract() != 0.0 {
        return Err(Error::type_mismatch(pos, target, "number with a fraction"));
    }
    Ok(f)
}

fn parse_i64(pos: usize, text: &str) -> Result<i64> {
    if let Ok(v) = text.parse::<i64>() {
        return Ok(v);
    }
    let f = integral(pos, text, "i64")?;
    if f < -9.223_372_036_854_776e18 || f >= 9.223_372_036_854_776e18 {
        return Err(Error::overflow(pos, text, "i64"));
    }
    Ok(f as i64)
}

fn parse_u64(pos: usize, text: &str) -> Result<u64> {
    if let Ok(v) = text.parse::<u64>() {
        return Ok(v);
    }
    let f = integral(pos, text, "u64")?;
    if f < 0.0 || f >= 1.844_674_407_370_955_2e19 {
        return Err(Error::overflow(pos, text, "u64"));
    }
    Ok(f as u64)
}

impl<R: ByteReader> DecDriver for JsonDecDriver<R> {
    fn position(&self) -> usize {
        self.r.position()
    }

    fn container_type(&mut self) -> Result<ValueType> {
        Ok(match self.peek_token()? {
            b'{' => ValueType::Map,
            b'[' => ValueType::Array,
            b'"' => ValueType::String,
            b'n' => ValueType::Nil,
            _ => ValueType::Unset,
        })
    }

    fn try_nil(&mut self) -> Result<bool> {
        if self.peek_token()? != b'n' {
            return Ok(false);
        }
        self.read_literal("null")?;
        Ok(true)
    }

    fn decode_bool(&mut self) -> Result<bool> {
        let pos = self.r.position();
        match self.peek_token()? {
            b't' => self.read_literal("true").map(|()| true),
            b'f' => self.read_literal("false").map(|()| false),
            b'"' => {
                self.read_string()?;
                match self.scratch.as_slice() {
                    b"true" => Ok(true),
                    b"false" => Ok(false),
                    _ => Err(Error::type_mismatch(pos, "bool", "string")),
                }
            }
            b => Err(self.mismatch(b, "bool")),
        }
    }

    fn decode_i64(&mut self) -> Result<i64> {
        let pos = self.r.position();
        let text = self.read_numeric("integer")?;
        parse_i64(pos, text)
    }

    fn decode_u64(&mut self) -> Result<u64> {
        let pos = self.r.position();
        let text = self.read_numeric("integer")?;
        parse_u64(pos, text)
    }

    fn decode_f64(&mut self) -> Result<f64> {
        let pos = self.r.position();
        let text = self.read_numeric("float")?;
        parse_float(pos, text)
    }

    fn decode_str(&mut self) -> Result<&str> {
        let pos = self.r.position();
        match self.peek_token()? {
            b'"' => {
                self.read_string()?;
                self.scratch_str(pos)
            }
            b => Err(self.mismatch(b, "string")),
        }
    }

    fn decode_bytes(&mut self) -> Result<&[u8]> {
        let pos = self.r.position();
        match self.peek_token()? {
            b'"' => self.read_string()?,
            b => return Err(self.mismatch(b, "base64 string")),
        }
        self.bytes.clear();
        STANDARD
            .decode_vec(&self.scratch, &mut self.bytes)
            .map_err(|e| Error::syntax(pos, format!("invalid base64: {e}")))?;
        Ok(&self.bytes)
    }

    fn decode_time(&mut self) -> Result<DateTime<Utc>> {
        let pos = self.r.position();
        let text = self.decode_str()?;
        DateTime::parse_from_rfc3339(text)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| Error::syntax(pos, format!("invalid RFC 3339 time: {e}")))
    }

    fn ext_mode(&self) -> ExtMode {
        ExtMode::Text
    }

    fn decode_ext(&mut self) -> Result<(u64, &[u8])> {
        Err(Error::unsupported("JSON has no extension header"))
    }

    fn read_array_start(&mut self) -> Result<ContainerLen> {
        match self.peek_token()? {
            b'[' => {
                self.r.read_u8()?;
                Ok(ContainerLen::Unknown)
            }
            b => Err(self.mismatch(b, "array")),
        }
    }

    fn read_array_elem(&mut self, first: bool) -> Result<()> {
        if first {
            Ok(())
        } else {
            self.expect(b',')
        }
    }

    fn read_array_end(&mut self) -> Result<()> {
        self.expect(b']')
    }

    fn read_map_start(&mut self) -> Result<ContainerLen> {
        match self.peek_token()? {
            b'{' => {
                self.r.read_u8()?;
                Ok(ContainerLen::Unknown)
            }
            b => Err(self.mismatch(b, "map")),
        }
    }

    fn read_map_elem_key(&mut self, first: bool) -> Result<()> {
        if first {
            Ok(())
        } else {
            self.expect(b',')
        }
    }

    fn read_map_elem_value(&mut self) -> Result<()> {
        self.expect(b':')
    }

    fn read_map_end(&mut self) -> Result<()> {
        self.expect(b'}')
    }

    fn check_break(&mut self) -> Result<bool> {
        Ok(matches!(self.peek_token()?, b']' | b'}'))
    }

    fn decode_naked(&mut self) -> Result<Naked<'_>> {
        let pos = self.r.position();
        match self.peek_token()? {
            b'n' => self.read_literal("null").map(|()| Naked::Nil),
            b't' | b'f' => Ok(Naked::Bool(self.decode_bool()?)),
            b'"' => {
                self.read_string()?;
                Ok(Naked::Str(self.scratch_str(pos)?))
            }
            b'[' => Ok(Naked::Array),
            b'{' => Ok(Naked::Map),
            b'-' | b'0'..=b'9' => {
                self.read_number()?;
                let text = self.scratch_str(pos)?;
                if text.contains(['.', 'e', 'E']) {
                    return Ok(Naked::Float(parse_float(pos, text)?));
                }
                // Integers beyond 64 bits degrade to floats.
                if text.starts_with('-') {
                    match text.parse::<i64>() {
                        Ok(v) => Ok(Naked::Int(v)),
                        Err(_) => Ok(Naked::Float(parse_float(pos, text)?)),
                    }
                } else {
                    match text.parse::<u64>() {
                        Ok(v) => Ok(Naked::Uint(v)),
                        Err(_) => Ok(Naked::Float(parse_float(pos, text)?)),
                    }
                }
            }
            b => Err(Error::syntax(pos, format!("unexpected character '{}'", b as char))),
        }
    }
}

impl<R: ByteReader> IntoInner<R> for JsonDecDriver<R> {
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
    use crate::{from_slice, to_vec, value, ErrorKind, Value, ValueMap};
    use chrono::TimeZone;
    use std::collections::{BTreeMap, HashMap};

    fn text(handle: &JsonHandle, v: &dyn crate::reflect::Reflect) -> String {
        String::from_utf8(to_vec(handle, v).unwrap()).unwrap()
    }

    #[test]
    fn test_escaping() {
        let v = value!({"a": "<b>\n\"q\"", "b": [1, 2.5, null]});
        assert_eq!(
            text(&JsonHandle::new(), &v),
            r#"{"a":"\u003cb\u003e\n\"q\"","b":[1,2.5,null]}"#
        );
        let as_is = JsonHandle::new().with_html_chars_as_is(true);
        assert_eq!(text(&as_is, &"<&>\u{1}".to_string()), r#""<&>\u0001""#);
    }

    #[test]
    fn test_indentation() {
        let v = value!({"a": [1, 2], "e": []});
        let spaces = JsonHandle::new().with_indent(2);
        assert_eq!(text(&spaces, &v), "{\n  \"a\": [\n    1,\n    2\n  ],\n  \"e\": []\n}");
        let tabs = JsonHandle::new().with_indent(-1);
        assert_eq!(text(&tabs, &vec![true]), "[\n\ttrue\n]");
    }

    #[test]
    fn test_integer_as_string() {
        let all = JsonHandle::new().with_integer_as_string(IntegerAsString::All);
        assert_eq!(text(&all, &vec![5_i64, -5]), r#"["5","-5"]"#);
        let large = JsonHandle::new().with_integer_as_string(IntegerAsString::Large);
        assert_eq!(text(&large, &vec![1_u64 << 53, (1 << 53) + 1]), r#"[9007199254740992,"9007199254740993"]"#);
        let back: Vec<u64> = from_slice(&large, br#"[9007199254740992,"9007199254740993"]"#).unwrap();
        assert_eq!(back, [1 << 53, (1 << 53) + 1]);
    }

    #[test]
    fn test_non_string_keys_are_quoted() {
        let handle = JsonHandle::new();
        let m: BTreeMap<u8, String> = [(1, "a".to_string()), (20, "b".to_string())].into();
        assert_eq!(text(&handle, &m), r#"{"1":"a","20":"b"}"#);
        let back: BTreeMap<u8, String> = from_slice(&handle, br#"{"1":"a","20":"b"}"#).unwrap();
        assert_eq!(back, m);

        let mut vm = ValueMap::new();
        vm.insert(true, 1_i64);
        vm.insert(Value::Nil, 2_i64);
        assert_eq!(text(&handle, &vm), r#"{"true":1,"null":2}"#);
    }

    #[test]
    fn test_bytes_time_and_floats() {
        let handle = JsonHandle::new();
        assert_eq!(text(&handle, &vec![1_u8, 2, 3]), r#""AQID""#);
        let t = Utc.timestamp_opt(0, 0).single().unwrap();
        assert_eq!(text(&handle, &t), r#""1970-01-01T00:00:00Z""#);
        assert_eq!(from_slice::<DateTime<Utc>>(&handle, br#""1970-01-01T01:00:00+01:00""#).unwrap(), t);
        assert_eq!(text(&handle, &1.0_f64), "1.0");
        let err = to_vec(&handle, &f64::INFINITY).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
    }

    #[test]
    fn test_term_whitespace() {
        let handle = JsonHandle::new().with_term_whitespace(true);
        assert_eq!(to_vec(&handle, &1_u8).unwrap(), b"1\n");
        assert_eq!(to_vec(&JsonHandle::new(), &1_u8).unwrap(), b"1");
    }

    #[test]
    fn test_decode_strings_and_quoted_scalars() {
        let handle = JsonHandle::new();
        let s: String = from_slice(&handle, r#" "\u00e9\ud83d\ude00\t\/" "#.as_bytes()).unwrap();
        assert_eq!(s, "\u{e9}\u{1f600}\t/");
        let m: HashMap<String, i64> = from_slice(&handle, br#"{ "a" : "42", "b":7 }"#).unwrap();
        assert_eq!(m["a"], 42);
        assert_eq!(m["b"], 7);
        assert!(from_slice::<bool>(&handle, br#""true""#).unwrap());
        assert_eq!(from_slice::<i64>(&handle, b"1e3").unwrap(), 1000);
    }

    #[test]
    fn test_naked_decode() {
        let v: Value = from_slice(&JsonHandle::new(), br#"{"k":[1,-2,3.5,"s",true,null,1e400]}"#).unwrap();
        let items = v.as_map().unwrap().get("k").unwrap().as_array().unwrap();
        assert_eq!(items[0], Value::Uint(1));
        assert_eq!(items[1], Value::Int(-2));
        assert_eq!(items[2], Value::Float(3.5));
        assert_eq!(items[3], Value::from("s"));
        assert_eq!(items[4], Value::Bool(true));
        assert_eq!(items[5], Value::Nil);
        assert!(items[6].as_f64().unwrap().is_infinite());
    }

    #[test]
    fn test_decode_errors() {
        let handle = JsonHandle::new();
        let kind = |input: &[u8]| from_slice::<Vec<i32>>(&handle, input).unwrap_err().kind();
        assert_eq!(kind(b"[1,]"), ErrorKind::Syntax);
        assert_eq!(kind(b"[1"), ErrorKind::Syntax);
        assert_eq!(kind(b"[1 2]"), ErrorKind::Syntax);
        assert_eq!(kind(b"[1.5]"), ErrorKind::TypeMismatch);
        assert_eq!(kind(b"[\"x\"]"), ErrorKind::Syntax);
        assert_eq!(kind(b"{}"), ErrorKind::TypeMismatch);
        assert_eq!(from_slice::<u32>(&handle, b"-1").unwrap_err().kind(), ErrorKind::Overflow);
        assert_eq!(from_slice::<String>(&handle, b"\"a\x01\"").unwrap_err().kind(), ErrorKind::Syntax);
        assert_eq!(from_slice::<String>(&handle, br#""\ud800x""#).unwrap_err().kind(), ErrorKind::Syntax);
    }
}
