//! The decode engine.
//!
//! A [`Decoder`] reads values from one [`DecDriver`] into existing
//! destinations, updating them in place: slices are reused and truncated,
//! maps are merged into, options and boxes are allocated only when empty.
//! An absence marker always resets the destination to its zero value.

use crate::descriptor::{field_mut, TypeDescriptor};
use crate::driver::{has_next, ContainerLen, DecDriver, ExtMode, Handle, IntoInner, Naked, ValueType};
use crate::options::Options;
use crate::reader::{ByteReader, IoReader, SliceReader};
use crate::reflect::{ChanLike, Map, Reflect, ReflectMut, ScalarMut, Seq, Struct};
use crate::registry::ExtensionEntry;
use crate::{Error, ExtPayload, RawExt, Result, Value, ValueMap};
use std::any::TypeId;
use std::io::Read;
use tracing::{trace, warn};

/// Engine access handed to [`SelfCodec::decode_self`](crate::reflect::SelfCodec::decode_self).
pub trait ValueDecoder {
    /// Decodes the next value into `dst` with the full engine.
    fn decode_value(&mut self, dst: &mut dyn Reflect) -> Result<()>;

    /// The underlying driver, for reading primitives directly.
    fn driver(&mut self) -> &mut dyn DecDriver;

    fn options(&self) -> &Options;
}

/// Container nesting counter.
#[derive(Clone, Debug)]
pub(crate) struct Depth {
    cur: usize,
    max: usize,
}

impl Depth {
    pub(crate) fn new(max: usize) -> Self {
        Depth { cur: 0, max }
    }

    #[inline]
    pub(crate) fn enter(&mut self, pos: usize) -> Result<()> {
        self.cur += 1;
        if self.cur > self.max {
            return Err(Error::depth_limit(pos, self.max));
        }
        Ok(())
    }

    #[inline]
    pub(crate) fn exit(&mut self) {
        self.cur = self.cur.saturating_sub(1);
    }
}

/// Deserializes values from a byte source with one handle's wire format.
///
/// # Examples
///
/// ```rust
/// use polycodec::{Decoder, JsonHandle};
///
/// let handle = JsonHandle::new();
/// let mut dec = Decoder::from_slice(b"[1,2,3] [4]", &handle);
/// let mut v: Vec<u8> = Vec::new();
/// let mut items: Vec<i32> = vec![9, 9, 9, 9, 9];
/// dec.decode(&mut items).unwrap();
/// assert_eq!(items, [1, 2, 3]);
/// dec.decode(&mut v).unwrap();
/// assert_eq!(v, [4]);
/// ```
pub struct Decoder<'h, H: Handle, R: ByteReader> {
    handle: &'h H,
    driver: H::DecDriver<R>,
    depth: Depth,
}

impl<'a, 'h, H: Handle> Decoder<'h, H, SliceReader<'a>> {
    /// Decodes from an in-memory buffer, honoring the handle's zero copy option.
    pub fn from_slice(data: &'a [u8], handle: &'h H) -> Self {
        let reader = SliceReader::new(data).with_zero_copy(handle.options().zero_copy);
        Decoder::new(reader, handle)
    }
}

impl<'h, H: Handle, T: Read> Decoder<'h, H, IoReader<T>> {
    /// Decodes from a stream, buffered with the handle's reader buffer size.
    pub fn from_reader(reader: T, handle: &'h H) -> Self {
        let reader = IoReader::with_capacity(handle.options().reader_buffer_size, reader);
        Decoder::new(reader, handle)
    }
}

impl<'h, H: Handle, R: ByteReader> Decoder<'h, H, R> {
    pub fn new(source: R, handle: &'h H) -> Self {
        Decoder {
            handle,
            driver: handle.new_dec_driver(source),
            depth: Depth::new(handle.options().max_depth),
        }
    }

    pub fn handle(&self) -> &'h H {
        self.handle
    }

    /// Offset of the next unread byte.
    pub fn position(&self) -> usize {
        self.driver.position()
    }

    /// Decodes the next value in the stream into `dst`.
    ///
    /// Errors are fatal for the call; `dst` may be partially updated.
    pub fn decode(&mut self, dst: &mut dyn Reflect) -> Result<()> {
        self.depth = Depth::new(self.handle.options().max_depth);
        self.decode_value(dst)
    }

    /// Like [`decode`](Decoder::decode), but panics on error.
    ///
    /// # Panics
    ///
    /// Panics with the error message if decoding fails.
    pub fn must_decode(&mut self, dst: &mut dyn Reflect) {
        if let Err(err) = self.decode(dst) {
            panic!("decode failed: {err}");
        }
    }

    /// Rebinds the decoder to a new source, returning the old one.
    pub fn reset(&mut self, source: R) -> R {
        self.depth = Depth::new(self.handle.options().max_depth);
        self.driver.replace_inner(source)
    }

    pub fn into_inner(self) -> R {
        self.driver.into_inner()
    }

    fn decode_value(&mut self, dst: &mut dyn Reflect) -> Result<()> {
        let handle = self.handle;
        let desc = handle.registry().describe(dst)?;
        if self.driver.try_nil()? {
            dst.reset();
            return Ok(());
        }
        if let Some(entry) = &desc.extension {
            return self.decode_with_extension(entry, dst);
        }
        if desc.has_self_codec() {
            if let Some(codec) = dst.as_self_codec_mut() {
                return codec.decode_self(self);
            }
        }
        if let Some(fast) = desc.fast_path {
            return (fast.decode)(dst, &mut self.driver, handle.options(), &mut self.depth);
        }
        match dst.reflect_mut() {
            ReflectMut::Scalar(s) => decode_scalar(&mut self.driver, s, handle.options()),
            ReflectMut::Struct(s) => self.decode_struct(&desc, s),
            ReflectMut::Seq(s) if s.is_pairs() => self.decode_pairs(&desc, s),
            ReflectMut::Seq(s) => self.decode_seq(&desc, s),
            ReflectMut::Map(m) => self.decode_map(&desc, m),
            ReflectMut::Optional(o) => self.decode_value(o.get_or_insert_default()),
            ReflectMut::Boxed(inner) => self.decode_value(inner),
            ReflectMut::Chan(c) => self.decode_chan(c),
            ReflectMut::Dynamic(v) => self.decode_dynamic(v),
            ReflectMut::RawExt(r) => self.decode_raw_ext(r),
            ReflectMut::Opaque => Err(Error::unsupported(format!(
                "{} has no wire representation",
                desc.name()
            ))),
        }
    }

    fn decode_struct(&mut self, desc: &TypeDescriptor, s: &mut dyn Struct) -> Result<()> {
        match self.driver.container_type()? {
            ValueType::Map => self.decode_struct_from_map(desc, s),
            ValueType::Array => self.decode_struct_from_array(desc, s),
            other => Err(Error::type_mismatch(
                self.driver.position(),
                "map or array",
                &format!("{other:?}").to_lowercase(),
            )),
        }
    }

    fn decode_struct_from_map(&mut self, desc: &TypeDescriptor, s: &mut dyn Struct) -> Result<()> {
        let strict = self.handle.options().error_if_no_field;
        let len = self.driver.read_map_start()?;
        self.depth.enter(self.driver.position())?;
        let mut i = 0;
        while has_next(&mut self.driver, len, i)? {
            self.driver.read_map_elem_key(i == 0)?;
            let pos = self.driver.position();
            let found = {
                let name = self.driver.decode_str()?;
                desc.field_index(name).ok_or_else(|| name.to_owned())
            };
            self.driver.read_map_elem_value()?;
            match found {
                Ok(index) => {
                    let path = &desc.fields()[index].path;
                    match field_mut(s, path) {
                        Some(field) => self.decode_value(field)?,
                        None => self.skip_value()?,
                    }
                }
                Err(name) if strict => {
                    return Err(Error::unknown_field(pos, &name, desc.name()));
                }
                Err(name) => {
                    trace!(field = %name, target = desc.name(), "skipping unknown field");
                    self.skip_value()?;
                }
            }
            i += 1;
        }
        self.driver.read_map_end()?;
        self.depth.exit();
        Ok(())
    }

    fn decode_struct_from_array(&mut self, desc: &TypeDescriptor, s: &mut dyn Struct) -> Result<()> {
        let strict = self.handle.options().error_if_no_field;
        let len = self.driver.read_array_start()?;
        self.depth.enter(self.driver.position())?;
        let fields = desc.fields();
        let mut i = 0;
        while has_next(&mut self.driver, len, i)? {
            self.driver.read_array_elem(i == 0)?;
            let field = match fields.get(i) {
                Some(f) => field_mut(s, &f.path),
                None => None,
            };
            match field {
                Some(field) => self.decode_value(field)?,
                None if i >= fields.len() && strict => {
                    return Err(Error::unknown_field(
                        self.driver.position(),
                        &format!("#{i}"),
                        desc.name(),
                    ));
                }
                None => self.skip_value()?,
            }
            i += 1;
        }
        self.driver.read_array_end()?;
        self.depth.exit();
        Ok(())
    }

    fn decode_seq(&mut self, desc: &TypeDescriptor, s: &mut dyn Seq) -> Result<()> {
        let byte_elems = desc.elem().map_or(false, |e| e.type_id() == TypeId::of::<u8>());
        if byte_elems
            && matches!(
                self.driver.container_type()?,
                ValueType::Bytes | ValueType::String
            )
        {
            return self.decode_seq_from_bytes(desc, s);
        }
        let handle = self.handle;
        let options = handle.options();
        let len = self.driver.read_array_start()?;
        let pos = self.driver.position();
        self.depth.enter(pos)?;
        let elem_size = desc.elem().map_or(0, |e| e.size());
        let hint = reserve_hint(options, len, elem_size, pos);
        if hint > s.len() {
            s.reserve(hint - s.len());
        }
        let mut i = 0;
        while has_next(&mut self.driver, len, i)? {
            self.driver.read_array_elem(i == 0)?;
            if !self.decode_slot(s, i)? {
                if options.error_if_no_array_expand {
                    return Err(Error::length(
                        self.driver.position(),
                        format!("{} cannot hold element {i}", desc.name()),
                    ));
                }
                self.skip_value()?;
            }
            i += 1;
        }
        s.truncate(i);
        self.driver.read_array_end()?;
        self.depth.exit();
        Ok(())
    }

    /// Fills a fixed array of bytes from a byte string.
    fn decode_seq_from_bytes(&mut self, desc: &TypeDescriptor, s: &mut dyn Seq) -> Result<()> {
        let strict = self.handle.options().error_if_no_array_expand;
        let pos = self.driver.position();
        let data = self.driver.decode_bytes()?;
        if strict && desc.fixed_len().map_or(false, |n| data.len() > n) {
            return Err(Error::length(
                pos,
                format!("{} cannot hold {} bytes", desc.name(), data.len()),
            ));
        }
        let mut filled = 0;
        for (i, &b) in data.iter().enumerate() {
            let slot = if i < s.len() { s.get_mut(i) } else { s.push_default() };
            match slot.and_then(|e| e.downcast_mut::<u8>()) {
                Some(e) => *e = b,
                None => break,
            }
            filled += 1;
        }
        s.truncate(filled);
        Ok(())
    }

    /// Decodes into element `index`, growing the sequence if needed.
    /// Returns `false` when fixed-size storage has no room.
    fn decode_slot(&mut self, s: &mut dyn Seq, index: usize) -> Result<bool> {
        let reset = self.handle.options().slice_element_reset;
        if index < s.len() {
            if let Some(e) = s.get_mut(index) {
                if reset {
                    e.reset();
                }
                self.decode_value(e)?;
            }
            return Ok(true);
        }
        match s.push_default() {
            Some(e) => {
                self.decode_value(e)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn decode_pairs(&mut self, desc: &TypeDescriptor, s: &mut dyn Seq) -> Result<()> {
        if self.driver.container_type()? != ValueType::Map {
            return self.decode_seq(desc, s);
        }
        let len = self.driver.read_map_start()?;
        self.depth.enter(self.driver.position())?;
        let mut i = 0;
        while has_next(&mut self.driver, len, i)? {
            self.driver.read_map_elem_key(i == 0)?;
            if !self.decode_slot(s, 2 * i)? {
                self.skip_value()?;
            }
            self.driver.read_map_elem_value()?;
            if !self.decode_slot(s, 2 * i + 1)? {
                self.skip_value()?;
            }
            i += 1;
        }
        s.truncate(2 * i);
        self.driver.read_map_end()?;
        self.depth.exit();
        Ok(())
    }

    fn decode_map(&mut self, desc: &TypeDescriptor, m: &mut dyn Map) -> Result<()> {
        let handle = self.handle;
        let options = handle.options();
        let len = self.driver.read_map_start()?;
        let pos = self.driver.position();
        self.depth.enter(pos)?;
        if options.replace_maps {
            m.clear();
        }
        let entry_size = desc.key().map_or(0, |k| k.size()) + desc.elem().map_or(0, |v| v.size());
        m.reserve(reserve_hint(options, len, entry_size, pos));
        let mut i = 0;
        while has_next(&mut self.driver, len, i)? {
            self.driver.read_map_elem_key(i == 0)?;
            let mut key = m.new_key();
            self.decode_value(key.as_mut())?;
            self.driver.read_map_elem_value()?;
            let slot = m.entry_mut(key).ok_or_else(|| {
                Error::custom(format!("{}: decoded key of the wrong type", desc.name()))
            })?;
            if options.map_value_reset {
                slot.reset();
            }
            self.decode_value(slot)?;
            i += 1;
        }
        self.driver.read_map_end()?;
        self.depth.exit();
        Ok(())
    }

    fn decode_chan(&mut self, c: &mut dyn ChanLike) -> Result<()> {
        let len = self.driver.read_array_start()?;
        self.depth.enter(self.driver.position())?;
        let mut i = 0;
        while has_next(&mut self.driver, len, i)? {
            self.driver.read_array_elem(i == 0)?;
            let mut elem = c.new_elem();
            self.decode_value(elem.as_mut())?;
            c.send(elem)?;
            i += 1;
        }
        self.driver.read_array_end()?;
        self.depth.exit();
        Ok(())
    }

    /// Decodes whatever comes next into an untyped value.
    fn decode_dynamic(&mut self, v: &mut Value) -> Result<()> {
        let handle = self.handle;
        let options = handle.options();
        let pos = self.driver.position();
        *v = match self.driver.decode_naked()? {
            Naked::Nil => Value::Nil,
            Naked::Bool(b) => Value::Bool(b),
            Naked::Int(i) => Value::Int(i),
            Naked::Uint(u) if options.signed_integer => i64::try_from(u).map_or(Value::Uint(u), Value::Int),
            Naked::Uint(u) => Value::Uint(u),
            Naked::Float(f) => Value::Float(f),
            Naked::Str(s) => Value::String(s.to_owned()),
            Naked::Bytes(b) if options.raw_to_string => {
                Value::String(String::from_utf8_lossy(b).into_owned())
            }
            Naked::Bytes(b) => Value::Bytes(b.to_vec()),
            Naked::Time(t) => Value::Time(t),
            Naked::Ext { tag, data } => Value::Ext(RawExt::with_data(tag, data.to_vec())),
            Naked::Tag(tag) => {
                self.depth.enter(pos)?;
                let mut inner = Value::Nil;
                self.decode_dynamic(&mut inner)?;
                self.depth.exit();
                Value::Ext(match inner {
                    Value::Bytes(data) => RawExt::with_data(tag, data),
                    other => RawExt::with_value(tag, other),
                })
            }
            Naked::Array => self.decode_dynamic_array(pos)?,
            Naked::Map => self.decode_dynamic_map(pos)?,
        };
        Ok(())
    }

    // Containers live outside `decode_dynamic` so the frame repeated per
    // nesting level stays small.
    #[inline(never)]
    fn decode_dynamic_array(&mut self, pos: usize) -> Result<Value> {
        let handle = self.handle;
        let options = handle.options();
        let len = self.driver.read_array_start()?;
        self.depth.enter(pos)?;
        let hint = reserve_hint(options, len, std::mem::size_of::<Value>(), pos);
        let mut items = Vec::with_capacity(hint);
        while has_next(&mut self.driver, len, items.len())? {
            self.driver.read_array_elem(items.is_empty())?;
            let mut item = Value::Nil;
            self.decode_dynamic(&mut item)?;
            items.push(item);
        }
        self.driver.read_array_end()?;
        self.depth.exit();
        Ok(Value::Array(items))
    }

    #[inline(never)]
    fn decode_dynamic_map(&mut self, pos: usize) -> Result<Value> {
        let handle = self.handle;
        let options = handle.options();
        let len = self.driver.read_map_start()?;
        self.depth.enter(pos)?;
        let hint = reserve_hint(options, len, 2 * std::mem::size_of::<Value>(), pos);
        let mut map = ValueMap::with_capacity(hint);
        let mut i = 0;
        while has_next(&mut self.driver, len, i)? {
            self.driver.read_map_elem_key(i == 0)?;
            let mut key = Value::Nil;
            self.decode_dynamic(&mut key)?;
            self.driver.read_map_elem_value()?;
            self.decode_dynamic(map.entry_or_nil(key))?;
            i += 1;
        }
        self.driver.read_map_end()?;
        self.depth.exit();
        Ok(Value::Map(map))
    }

    fn skip_value(&mut self) -> Result<()> {
        let mut sink = Value::Nil;
        self.decode_dynamic(&mut sink)
    }

    fn decode_raw_ext(&mut self, r: &mut RawExt) -> Result<()> {
        match self.driver.ext_mode() {
            ExtMode::Bytes => {
                let (tag, data) = self.driver.decode_ext()?;
                *r = RawExt::with_data(tag, data.to_vec());
            }
            ExtMode::Tagged => {
                let pos = self.driver.position();
                let tag = self.driver.read_ext_tag()?;
                self.depth.enter(pos)?;
                let mut inner = Value::Nil;
                self.decode_dynamic(&mut inner)?;
                self.depth.exit();
                *r = match inner {
                    Value::Bytes(data) => RawExt::with_data(tag, data),
                    other => RawExt::with_value(tag, other),
                };
            }
            ExtMode::Text => {
                // Text formats carry no tag; keep the one already set.
                let mut inner = Value::Nil;
                self.decode_dynamic(&mut inner)?;
                r.payload = ExtPayload::Value(Box::new(inner));
            }
        }
        Ok(())
    }

    fn decode_with_extension(&mut self, entry: &ExtensionEntry, dst: &mut dyn Reflect) -> Result<()> {
        let pos = self.driver.position();
        let check_tag = |tag: u64| {
            if tag == entry.tag {
                Ok(())
            } else {
                Err(Error::type_mismatch(
                    pos,
                    &format!("extension tag {} ({})", entry.tag, entry.type_name),
                    &format!("tag {tag}"),
                ))
            }
        };
        match (self.driver.ext_mode(), entry.ext.has_value_form()) {
            (ExtMode::Bytes, false) => {
                let (tag, data) = self.driver.decode_ext()?;
                check_tag(tag)?;
                entry.ext.read_ext(dst, data)
            }
            (ExtMode::Bytes, true) => {
                let (tag, data) = self.driver.decode_ext()?;
                check_tag(tag)?;
                let data = data.to_vec();
                let value = self.decode_side(&data)?;
                entry.ext.update_ext(dst, value)
            }
            (ExtMode::Tagged, value_form) => {
                check_tag(self.driver.read_ext_tag()?)?;
                self.decode_extension_body(entry, dst, value_form)
            }
            (ExtMode::Text, value_form) => self.decode_extension_body(entry, dst, value_form),
        }
    }

    fn decode_extension_body(
        &mut self,
        entry: &ExtensionEntry,
        dst: &mut dyn Reflect,
        value_form: bool,
    ) -> Result<()> {
        if value_form {
            let mut value = Value::Nil;
            self.decode_dynamic(&mut value)?;
            entry.ext.update_ext(dst, value)
        } else {
            let data = self.driver.decode_bytes()?;
            entry.ext.read_ext(dst, data)
        }
    }

    /// Decodes one untyped value from a nested payload with the same handle.
    fn decode_side(&self, data: &[u8]) -> Result<Value> {
        let mut side = Decoder::new(SliceReader::new(data), self.handle);
        side.depth = self.depth.clone();
        let mut value = Value::Nil;
        side.decode_dynamic(&mut value)?;
        Ok(value)
    }
}

impl<H: Handle, R: ByteReader> ValueDecoder for Decoder<'_, H, R> {
    fn decode_value(&mut self, dst: &mut dyn Reflect) -> Result<()> {
        Decoder::decode_value(self, dst)
    }

    fn driver(&mut self) -> &mut dyn DecDriver {
        &mut self.driver
    }

    fn options(&self) -> &Options {
        self.handle.options()
    }
}

/// Number of elements to reserve for a container announced as `len`.
pub(crate) fn reserve_hint(options: &Options, len: ContainerLen, elem_size: usize, pos: usize) -> usize {
    let hint = options.infer_len(len.hint(), elem_size);
    if let ContainerLen::Known(announced) = len {
        if announced > hint {
            warn!(announced, capped = hint, offset = pos, "length prefix exceeds pre-allocation cap");
        }
    }
    hint
}

fn narrow<T, S>(value: S, pos: usize, target: &'static str) -> Result<T>
where
    T: TryFrom<S>,
    S: Copy + std::fmt::Display,
{
    T::try_from(value).map_err(|_| Error::overflow(pos, value, target))
}

/// Reads one primitive into `s`, range checked against its width.
pub(crate) fn decode_scalar(d: &mut dyn DecDriver, s: ScalarMut<'_>, options: &Options) -> Result<()> {
    let pos = d.position();
    match s {
        ScalarMut::Bool(v) => *v = d.decode_bool()?,
        ScalarMut::I8(v) => *v = narrow(d.decode_i64()?, pos, "i8")?,
        ScalarMut::I16(v) => *v = narrow(d.decode_i64()?, pos, "i16")?,
        ScalarMut::I32(v) => *v = narrow(d.decode_i64()?, pos, "i32")?,
        ScalarMut::I64(v) => *v = d.decode_i64()?,
        ScalarMut::Isize(v) => *v = narrow(d.decode_i64()?, pos, "isize")?,
        ScalarMut::U8(v) => *v = narrow(d.decode_u64()?, pos, "u8")?,
        ScalarMut::U16(v) => *v = narrow(d.decode_u64()?, pos, "u16")?,
        ScalarMut::U32(v) => *v = narrow(d.decode_u64()?, pos, "u32")?,
        ScalarMut::U64(v) => *v = d.decode_u64()?,
        ScalarMut::Usize(v) => *v = narrow(d.decode_u64()?, pos, "usize")?,
        ScalarMut::F32(v) => {
            let f = d.decode_f64()?;
            if f.is_finite() && f.abs() > f64::from(f32::MAX) {
                return Err(Error::overflow(pos, f, "f32"));
            }
            *v = f as f32;
        }
        ScalarMut::F64(v) => *v = d.decode_f64()?,
        ScalarMut::Char(v) => {
            let s = d.decode_str()?;
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => *v = c,
                _ => return Err(Error::type_mismatch(pos, "a single character", "string")),
            }
        }
        ScalarMut::String(v) => {
            let s = d.decode_str()?;
            v.clear();
            v.push_str(s);
        }
        ScalarMut::Bytes(v) => {
            if d.container_type()? == ValueType::Array {
                return decode_byte_array(d, v, options);
            }
            let b = d.decode_bytes()?;
            v.clear();
            v.extend_from_slice(b);
        }
        ScalarMut::Time(v) => *v = d.decode_time()?,
    }
    Ok(())
}

/// Byte strings may also arrive as an array of small integers.
fn decode_byte_array(d: &mut dyn DecDriver, v: &mut Vec<u8>, options: &Options) -> Result<()> {
    let len = d.read_array_start()?;
    v.clear();
    v.reserve(reserve_hint(options, len, 1, d.position()));
    while has_next(d, len, v.len())? {
        d.read_array_elem(v.is_empty())?;
        let pos = d.position();
        v.push(narrow(d.decode_u64()?, pos, "u8")?);
    }
    d.read_array_end()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflect::MapBySlice;
    use crate::{reflect_struct, Chan, ErrorKind, JsonHandle};
    use std::collections::{BTreeMap, HashMap};

    #[derive(Debug, Default, PartialEq)]
    struct Inner {
        id: u64,
    }

    reflect_struct!(Inner { id });

    #[derive(Debug, Default, PartialEq)]
    struct Outer {
        name: String,
        inner: Inner,
        score: Option<f32>,
    }

    reflect_struct!(Outer {
        name codec = "name",
        inner codec = ",inline",
        score codec = "score,omitempty",
    });

    fn decode_json(options: Options, input: &str, dst: &mut dyn Reflect) -> Result<()> {
        let handle = JsonHandle::new().with_options(options);
        Decoder::from_slice(input.as_bytes(), &handle).decode(dst)
    }

    #[test]
    fn test_depth_counter() {
        let mut depth = Depth::new(2);
        depth.enter(0).unwrap();
        depth.enter(1).unwrap();
        let err = depth.enter(2).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Limit);
        depth.exit();
        depth.exit();
        depth.exit();
        depth.enter(3).unwrap();
    }

    #[test]
    fn test_narrowing_is_range_checked() {
        let mut small: i8 = 0;
        let err = decode_json(Options::new(), "-129", &mut small).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Overflow);
        decode_json(Options::new(), "-128", &mut small).unwrap();
        assert_eq!(small, -128);

        let mut f: f32 = 0.0;
        assert!(decode_json(Options::new(), "1e300", &mut f).is_err());
        decode_json(Options::new(), "3", &mut f).unwrap();
        assert_eq!(f, 3.0);
    }

    #[test]
    fn test_char_needs_one_character() {
        let mut c = 'x';
        decode_json(Options::new(), r#""é""#, &mut c).unwrap();
        assert_eq!(c, 'é');
        assert!(decode_json(Options::new(), r#""ab""#, &mut c).is_err());
    }

    #[test]
    fn test_inline_fields_and_unknown_keys() {
        let mut out = Outer::default();
        decode_json(
            Options::new(),
            r#"{"name":"n","id":9,"extra":[1,{"a":2}],"score":1.5}"#,
            &mut out,
        )
        .unwrap();
        assert_eq!(out.name, "n");
        assert_eq!(out.inner.id, 9);
        assert_eq!(out.score, Some(1.5));

        let strict = Options::new().with_error_if_no_field(true);
        let err = decode_json(strict, r#"{"extra":1}"#, &mut out).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownField);
    }

    #[test]
    fn test_struct_from_positional_array() {
        let mut out = Outer::default();
        decode_json(Options::new(), r#"["a",4,null,"ignored"]"#, &mut out).unwrap();
        assert_eq!(out.name, "a");
        assert_eq!(out.inner.id, 4);
        assert_eq!(out.score, None);

        let strict = Options::new().with_error_if_no_field(true);
        assert!(decode_json(strict, r#"["a",4,null,"extra"]"#, &mut out).is_err());
    }

    #[test]
    fn test_fixed_array_drains_or_rejects_overflow() {
        let mut arr = [Inner::default(), Inner::default()];
        decode_json(Options::new(), r#"[{"id":1},{"id":2},{"id":3}]"#, &mut arr).unwrap();
        assert_eq!(arr[1].id, 2);

        let strict = Options::new().with_error_if_no_array_expand(true);
        let err = decode_json(strict, r#"[{"id":1},{"id":2},{"id":3}]"#, &mut arr).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Limit);

        decode_json(Options::new(), r#"[{"id":5}]"#, &mut arr).unwrap();
        assert_eq!(arr, [Inner { id: 5 }, Inner { id: 0 }]);
    }

    #[test]
    fn test_byte_array_from_bytes_and_numbers() {
        let mut digest = [0u8; 4];
        decode_json(Options::new(), r#""AQIDBA==""#, &mut digest).unwrap();
        assert_eq!(digest, [1, 2, 3, 4]);

        let mut raw: Vec<u8> = Vec::new();
        decode_json(Options::new(), "[7,8]", &mut raw).unwrap();
        assert_eq!(raw, [7, 8]);
        assert!(decode_json(Options::new(), "[256]", &mut raw).is_err());
    }

    #[test]
    fn test_pairs_from_map() {
        let mut pairs: MapBySlice<Value> = MapBySlice(Vec::new());
        decode_json(Options::new(), r#"{"a":1,"b":true}"#, &mut pairs).unwrap();
        assert_eq!(
            pairs.0,
            vec![Value::from("a"), Value::Uint(1), Value::from("b"), Value::Bool(true)]
        );
    }

    #[test]
    fn test_map_value_reset() {
        let mut m: BTreeMap<String, Outer> = BTreeMap::new();
        m.insert(
            "k".into(),
            Outer {
                name: "keep".into(),
                ..Outer::default()
            },
        );
        decode_json(Options::new(), r#"{"k":{"id":3}}"#, &mut m).unwrap();
        assert_eq!(m["k"].name, "keep");
        assert_eq!(m["k"].inner.id, 3);

        let reset = Options::new().with_map_value_reset(true);
        decode_json(reset, r#"{"k":{"id":4}}"#, &mut m).unwrap();
        assert_eq!(m["k"].name, "");
        assert_eq!(m["k"].inner.id, 4);
    }

    #[test]
    fn test_replace_maps() {
        let mut m: HashMap<String, Vec<u32>> = HashMap::new();
        m.insert("a".into(), vec![1]);
        decode_json(Options::new().with_replace_maps(true), r#"{"b":[2]}"#, &mut m).unwrap();
        assert_eq!(m.len(), 1);
        assert_eq!(m["b"], [2]);
    }

    #[test]
    fn test_nil_map_value_stores_zero() {
        let mut m: HashMap<String, Option<Inner>> = HashMap::new();
        m.insert("a".into(), Some(Inner { id: 1 }));
        decode_json(Options::new(), r#"{"a":null}"#, &mut m).unwrap();
        assert_eq!(m["a"], None);
    }

    #[test]
    fn test_dynamic_integer_and_raw_options() {
        let mut v = Value::Nil;
        decode_json(Options::new(), "[1,-1]", &mut v).unwrap();
        assert_eq!(v, Value::Array(vec![Value::Uint(1), Value::Int(-1)]));

        decode_json(Options::new().with_signed_integer(true), "[1]", &mut v).unwrap();
        assert!(matches!(&v, Value::Array(items) if matches!(items[0], Value::Int(1))));
    }

    #[test]
    fn test_chan_receives_elements() {
        let mut chan: Chan<u16> = Chan::new();
        decode_json(Options::new(), "[3,4]", &mut chan).unwrap();
        assert_eq!(chan.try_recv(), Some(3));
        assert_eq!(chan.try_recv(), Some(4));
        assert_eq!(chan.try_recv(), None);
    }

    #[test]
    fn test_reset_rebinds_source() {
        let handle = JsonHandle::new();
        let mut dec = Decoder::from_slice(b"1", &handle);
        let mut n = 0_u32;
        dec.decode(&mut n).unwrap();
        dec.reset(SliceReader::new(b"2"));
        dec.decode(&mut n).unwrap();
        assert_eq!(n, 2);
        assert_eq!(dec.position(), 1);
    }

    #[test]
    #[should_panic(expected = "decode failed")]
    fn test_must_decode_panics() {
        let handle = JsonHandle::new();
        let mut n = 0_u8;
        Decoder::from_slice(b"300", &handle).must_decode(&mut n);
    }
}
