//! The encode engine.
//!
//! An [`Encoder`] walks a value through its [`Reflect`] shape and drives one
//! [`EncDriver`]. For every value it checks, in order:
//!
//! 1. a registered extension for the type,
//! 2. the type's own [`SelfCodec`](crate::reflect::SelfCodec),
//! 3. a fast path for the concrete container type,
//! 4. the generic traversal of its shape.
//!
//! Traversal is read-only and deterministic. Maps are emitted in iteration
//! order unless [`Options::canonical`] asks for sorted keys.

use crate::descriptor::{field_ref, FieldDescriptor, TypeDescriptor};
use crate::driver::{EncDriver, ExtMode, Handle, IntoInner};
use crate::options::Options;
use crate::reflect::{ChanLike, Map, Reflect, ReflectRef, ScalarRef, Seq, Struct};
use crate::registry::ExtensionEntry;
use crate::{Error, ExtPayload, RawExt, Result, Value};
use std::cmp::Ordering;
use std::io;

/// Engine access handed to [`SelfCodec::encode_self`](crate::reflect::SelfCodec::encode_self).
pub trait ValueEncoder {
    /// Encodes a nested value with the full engine.
    fn encode_value(&mut self, value: &dyn Reflect) -> Result<()>;

    /// The underlying driver, for emitting primitives directly.
    fn driver(&mut self) -> &mut dyn EncDriver;

    fn options(&self) -> &Options;
}

/// Serializes values into a sink with one handle's wire format.
///
/// An encoder is bound to one sink at a time and is not meant to be shared
/// between threads; use [`reset`](Encoder::reset) to reuse it.
///
/// # Examples
///
/// ```rust
/// use polycodec::{Encoder, SimpleHandle};
///
/// let handle = SimpleHandle::new();
/// let mut enc = Encoder::new(Vec::new(), &handle);
/// enc.encode(&vec![1_u32, 2, 3]).unwrap();
/// assert_eq!(enc.into_inner(), vec![0xe9, 3, 0x08, 1, 0x08, 2, 0x08, 3]);
/// ```
pub struct Encoder<'h, H: Handle, W: io::Write> {
    handle: &'h H,
    driver: H::EncDriver<W>,
}

impl<'h, H: Handle, W: io::Write> Encoder<'h, H, W> {
    pub fn new(sink: W, handle: &'h H) -> Self {
        Encoder {
            handle,
            driver: handle.new_enc_driver(sink),
        }
    }

    pub fn handle(&self) -> &'h H {
        self.handle
    }

    /// Encodes one top-level value and flushes the sink.
    ///
    /// On error, bytes already written stay in the sink.
    pub fn encode(&mut self, value: &dyn Reflect) -> Result<()> {
        self.encode_value(value)?;
        self.driver.at_end_of_encode()
    }

    /// Like [`encode`](Encoder::encode), but panics on error.
    ///
    /// # Panics
    ///
    /// Panics with the error message if encoding fails.
    pub fn must_encode(&mut self, value: &dyn Reflect) {
        if let Err(err) = self.encode(value) {
            panic!("encode failed: {err}");
        }
    }

    /// Rebinds the encoder to a new sink, returning the old one.
    pub fn reset(&mut self, sink: W) -> W {
        self.driver.replace_inner(sink)
    }

    pub fn into_inner(self) -> W {
        self.driver.into_inner()
    }

    fn encode_value(&mut self, value: &dyn Reflect) -> Result<()> {
        let handle = self.handle;
        let desc = handle.registry().describe(value)?;
        if let Some(entry) = &desc.extension {
            return self.encode_with_extension(entry, value);
        }
        if desc.has_self_codec() {
            if let Some(codec) = value.as_self_codec() {
                return codec.encode_self(self);
            }
        }
        if let Some(fast) = desc.fast_path {
            return (fast.encode)(value, &mut self.driver, handle.options());
        }
        match value.reflect_ref() {
            ReflectRef::Scalar(s) => encode_scalar(&mut self.driver, s, handle.options()),
            ReflectRef::Struct(s) => self.encode_struct(&desc, s),
            ReflectRef::Seq(s) if s.is_pairs() => self.encode_pairs(s),
            ReflectRef::Seq(s) => self.encode_seq(s),
            ReflectRef::Map(m) => self.encode_map(m),
            ReflectRef::Optional(o) => match o.get() {
                Some(inner) => self.encode_value(inner),
                None => self.driver.encode_nil(),
            },
            ReflectRef::Boxed(inner) => self.encode_value(inner),
            ReflectRef::Chan(c) => self.encode_chan(c),
            ReflectRef::Dynamic(v) => self.encode_dynamic(v),
            ReflectRef::RawExt(r) => self.encode_raw_ext(r),
            ReflectRef::Opaque => Err(Error::unsupported(format!(
                "{} has no wire representation",
                desc.name()
            ))),
        }
    }

    fn encode_struct(&mut self, desc: &TypeDescriptor, s: &dyn Struct) -> Result<()> {
        let handle = self.handle;
        let options = handle.options();
        if desc.to_array() || options.struct_to_array {
            // Positional: every field keeps its slot, empty or not.
            let fields = desc.fields();
            self.driver.write_array_start(fields.len())?;
            for (i, field) in fields.iter().enumerate() {
                self.driver.write_array_elem(i == 0)?;
                match field_ref(s, &field.path) {
                    Some(v) => self.encode_value(v)?,
                    None => self.driver.encode_nil()?,
                }
            }
            return self.driver.write_array_end();
        }

        let present: Vec<(&FieldDescriptor, &dyn Reflect)> = desc
            .fields()
            .iter()
            .filter_map(|f| {
                let v = field_ref(s, &f.path)?;
                (!(f.omit_empty && is_empty(v, options.recursive_empty_check))).then_some((f, v))
            })
            .collect();
        self.driver.write_map_start(present.len())?;
        for (i, (field, v)) in present.into_iter().enumerate() {
            self.driver.write_map_elem_key(i == 0)?;
            self.driver.encode_str(&field.wire_name)?;
            self.driver.write_map_elem_value()?;
            self.encode_value(v)?;
        }
        self.driver.write_map_end()
    }

    fn encode_seq(&mut self, s: &dyn Seq) -> Result<()> {
        let len = s.len();
        self.driver.write_array_start(len)?;
        for i in 0..len {
            self.driver.write_array_elem(i == 0)?;
            match s.get(i) {
                Some(e) => self.encode_value(e)?,
                None => self.driver.encode_nil()?,
            }
        }
        self.driver.write_array_end()
    }

    fn encode_pairs(&mut self, s: &dyn Seq) -> Result<()> {
        let len = s.len();
        if len % 2 != 0 {
            return Err(Error::unsupported(format!(
                "{}: key/value sequence has odd length {len}",
                s.reflect_type_name()
            )));
        }
        let entries: Vec<(&dyn Reflect, &dyn Reflect)> = (0..len / 2)
            .filter_map(|i| Some((s.get(2 * i)?, s.get(2 * i + 1)?)))
            .collect();
        self.encode_entries(entries)
    }

    fn encode_map(&mut self, m: &dyn Map) -> Result<()> {
        let entries: Vec<(&dyn Reflect, &dyn Reflect)> = m.iter().collect();
        self.encode_entries(entries)
    }

    fn encode_entries(&mut self, mut entries: Vec<(&dyn Reflect, &dyn Reflect)>) -> Result<()> {
        if self.handle.options().canonical {
            self.sort_canonical(&mut entries)?;
        }
        self.driver.write_map_start(entries.len())?;
        for (i, (k, v)) in entries.into_iter().enumerate() {
            self.driver.write_map_elem_key(i == 0)?;
            self.encode_value(k)?;
            self.driver.write_map_elem_value()?;
            self.encode_value(v)?;
        }
        self.driver.write_map_end()
    }

    /// Sorts by natural key order when all keys share one scalar class, and
    /// by each key's own encoded bytes otherwise.
    fn sort_canonical(&self, entries: &mut Vec<(&dyn Reflect, &dyn Reflect)>) -> Result<()> {
        let classes: Option<Vec<u8>> = entries
            .iter()
            .map(|(k, _)| natural_key(k.reflect_ref()).map(|s| key_class(&s)))
            .collect();
        let uniform = classes.map_or(false, |c| c.windows(2).all(|w| w[0] == w[1]));
        if uniform {
            entries.sort_by(|a, b| canonical_order(a.0.reflect_ref(), b.0.reflect_ref()));
            return Ok(());
        }

        let mut keyed = Vec::with_capacity(entries.len());
        for (k, v) in entries.drain(..) {
            let bytes = self.encode_side(|side| side.encode_value(k))?;
            keyed.push((bytes, k, v));
        }
        keyed.sort_by(|a, b| a.0.cmp(&b.0));
        entries.extend(keyed.into_iter().map(|(_, k, v)| (k, v)));
        Ok(())
    }

    fn encode_chan(&mut self, c: &dyn ChanLike) -> Result<()> {
        let items = c.drain(self.handle.options().chan_recv_timeout);
        self.driver.write_array_start(items.len())?;
        for (i, item) in items.iter().enumerate() {
            self.driver.write_array_elem(i == 0)?;
            self.encode_value(item.as_ref())?;
        }
        self.driver.write_array_end()
    }

    fn encode_dynamic(&mut self, v: &Value) -> Result<()> {
        let handle = self.handle;
        let options = handle.options();
        match v {
            Value::Nil => self.driver.encode_nil(),
            Value::Bool(b) => self.driver.encode_bool(*b),
            Value::Int(i) => self.driver.encode_i64(*i),
            Value::Uint(u) => self.driver.encode_u64(*u),
            Value::Float(f) => self.driver.encode_f64(*f),
            Value::String(s) => encode_scalar(&mut self.driver, ScalarRef::Str(s), options),
            Value::Bytes(b) => self.driver.encode_bytes(b),
            Value::Time(t) => self.driver.encode_time(t),
            Value::Array(arr) => {
                self.driver.write_array_start(arr.len())?;
                for (i, e) in arr.iter().enumerate() {
                    self.driver.write_array_elem(i == 0)?;
                    self.encode_dynamic(e)?;
                }
                self.driver.write_array_end()
            }
            Value::Map(map) => {
                let entries: Vec<(&dyn Reflect, &dyn Reflect)> = map
                    .iter()
                    .map(|(k, v)| (k as &dyn Reflect, v as &dyn Reflect))
                    .collect();
                self.encode_entries(entries)
            }
            Value::Ext(ext) => self.encode_raw_ext(ext),
        }
    }

    fn encode_raw_ext(&mut self, ext: &RawExt) -> Result<()> {
        match (&ext.payload, self.driver.ext_mode()) {
            (ExtPayload::Data(data), ExtMode::Text) => self.driver.encode_bytes(data),
            (ExtPayload::Data(data), _) => self.driver.encode_ext(ext.tag, data),
            (ExtPayload::Value(v), ExtMode::Text) => self.encode_dynamic(v),
            (ExtPayload::Value(v), ExtMode::Tagged) => {
                self.driver.write_ext_tag(ext.tag)?;
                self.encode_dynamic(v)
            }
            (ExtPayload::Value(v), ExtMode::Bytes) => {
                let data = self.encode_side(|side| side.encode_dynamic(v))?;
                self.driver.encode_ext(ext.tag, &data)
            }
        }
    }

    fn encode_with_extension(&mut self, entry: &ExtensionEntry, value: &dyn Reflect) -> Result<()> {
        let mode = self.driver.ext_mode();
        if entry.ext.has_value_form() {
            let converted = entry.ext.convert_ext(value)?;
            return match mode {
                ExtMode::Text => self.encode_dynamic(&converted),
                ExtMode::Tagged => {
                    self.driver.write_ext_tag(entry.tag)?;
                    self.encode_dynamic(&converted)
                }
                ExtMode::Bytes => {
                    let data = self.encode_side(|side| side.encode_dynamic(&converted))?;
                    self.driver.encode_ext(entry.tag, &data)
                }
            };
        }
        let data = entry.ext.write_ext(value)?;
        match mode {
            ExtMode::Text => self.driver.encode_bytes(&data),
            ExtMode::Bytes | ExtMode::Tagged => self.driver.encode_ext(entry.tag, &data),
        }
    }

    /// Runs `f` against a scratch encoder of the same handle and returns its bytes.
    fn encode_side<F>(&self, f: F) -> Result<Vec<u8>>
    where
        F: FnOnce(&mut Encoder<'h, H, Vec<u8>>) -> Result<()>,
    {
        let mut side = Encoder::new(Vec::new(), self.handle);
        f(&mut side)?;
        Ok(side.into_inner())
    }
}

impl<H: Handle, W: io::Write> ValueEncoder for Encoder<'_, H, W> {
    fn encode_value(&mut self, value: &dyn Reflect) -> Result<()> {
        Encoder::encode_value(self, value)
    }

    fn driver(&mut self) -> &mut dyn EncDriver {
        &mut self.driver
    }

    fn options(&self) -> &Options {
        self.handle.options()
    }
}

/// Emits one primitive.
pub(crate) fn encode_scalar(d: &mut dyn EncDriver, s: ScalarRef<'_>, options: &Options) -> Result<()> {
    match s {
        ScalarRef::Bool(b) => d.encode_bool(b),
        ScalarRef::Int(i) => d.encode_i64(i),
        ScalarRef::Uint(u) => d.encode_u64(u),
        ScalarRef::F32(f) => d.encode_f32(f),
        ScalarRef::F64(f) => d.encode_f64(f),
        ScalarRef::Char(c) => {
            let mut buf = [0u8; 4];
            encode_scalar(d, ScalarRef::Str(c.encode_utf8(&mut buf)), options)
        }
        ScalarRef::Str(s) if options.string_to_raw => d.encode_str_as_raw(s),
        ScalarRef::Str(s) => d.encode_str(s),
        ScalarRef::Bytes(b) => d.encode_bytes(b),
        ScalarRef::Time(t) => d.encode_time(t),
    }
}

/// Whether a value counts as empty for `omitempty`.
pub(crate) fn is_empty(v: &dyn Reflect, recursive: bool) -> bool {
    match v.reflect_ref() {
        ReflectRef::Scalar(s) => s.is_empty(),
        ReflectRef::Seq(s) => s.is_empty(),
        ReflectRef::Map(m) => m.is_empty(),
        ReflectRef::Optional(o) => match o.get() {
            None => true,
            Some(inner) => recursive && is_empty(inner, recursive),
        },
        ReflectRef::Boxed(inner) => recursive && is_empty(inner, recursive),
        ReflectRef::Struct(s) => {
            recursive
                && (0..s.field_count())
                    .filter_map(|i| s.field_at(i))
                    .all(|f| is_empty(f, recursive))
        }
        ReflectRef::Dynamic(v) => match v {
            Value::Nil => true,
            Value::Bool(b) => !b,
            Value::Int(i) => *i == 0,
            Value::Uint(u) => *u == 0,
            Value::Float(f) => *f == 0.0,
            Value::String(s) => s.is_empty(),
            Value::Bytes(b) => b.is_empty(),
            Value::Array(a) => a.is_empty(),
            Value::Map(m) => m.is_empty(),
            Value::Time(_) | Value::Ext(_) => false,
        },
        ReflectRef::Chan(_) | ReflectRef::RawExt(_) | ReflectRef::Opaque => false,
    }
}

/// The key as a comparable primitive, if it has a natural order.
fn natural_key(r: ReflectRef<'_>) -> Option<ScalarRef<'_>> {
    match r {
        ReflectRef::Scalar(s) => Some(s),
        ReflectRef::Dynamic(v) => match v {
            Value::Bool(b) => Some(ScalarRef::Bool(*b)),
            Value::Int(i) => Some(ScalarRef::Int(*i)),
            Value::Uint(u) => Some(ScalarRef::Uint(*u)),
            Value::Float(f) => Some(ScalarRef::F64(*f)),
            Value::String(s) => Some(ScalarRef::Str(s)),
            Value::Bytes(b) => Some(ScalarRef::Bytes(b)),
            Value::Time(t) => Some(ScalarRef::Time(t)),
            _ => None,
        },
        _ => None,
    }
}

fn key_class(s: &ScalarRef<'_>) -> u8 {
    match s {
        ScalarRef::Str(_) | ScalarRef::Char(_) => 0,
        ScalarRef::Int(_) => 1,
        ScalarRef::Uint(_) => 2,
        ScalarRef::F32(_) | ScalarRef::F64(_) => 3,
        ScalarRef::Bool(_) => 4,
        ScalarRef::Bytes(_) => 5,
        ScalarRef::Time(_) => 6,
    }
}

/// Natural order of two keys of the same class.
pub(crate) fn canonical_order(a: ReflectRef<'_>, b: ReflectRef<'_>) -> Ordering {
    let (Some(a), Some(b)) = (natural_key(a), natural_key(b)) else {
        return Ordering::Equal;
    };
    match (a, b) {
        (ScalarRef::Str(x), ScalarRef::Str(y)) => x.cmp(y),
        (ScalarRef::Char(x), ScalarRef::Char(y)) => x.cmp(&y),
        (ScalarRef::Str(x), ScalarRef::Char(y)) => x.cmp(y.encode_utf8(&mut [0u8; 4])),
        (ScalarRef::Char(x), ScalarRef::Str(y)) => {
            let mut buf = [0u8; 4];
            let x: &str = x.encode_utf8(&mut buf);
            x.cmp(y)
        }
        (ScalarRef::Int(x), ScalarRef::Int(y)) => x.cmp(&y),
        (ScalarRef::Uint(x), ScalarRef::Uint(y)) => x.cmp(&y),
        (ScalarRef::F32(x), ScalarRef::F32(y)) => x.total_cmp(&y),
        (ScalarRef::F64(x), ScalarRef::F64(y)) => x.total_cmp(&y),
        (ScalarRef::F32(x), ScalarRef::F64(y)) => f64::from(x).total_cmp(&y),
        (ScalarRef::F64(x), ScalarRef::F32(y)) => x.total_cmp(&f64::from(y)),
        (ScalarRef::Bool(x), ScalarRef::Bool(y)) => x.cmp(&y),
        (ScalarRef::Bytes(x), ScalarRef::Bytes(y)) => x.cmp(y),
        (ScalarRef::Time(x), ScalarRef::Time(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{reflect_struct, JsonHandle, SimpleHandle, ValueMap};
    use std::collections::{BTreeMap, HashMap};

    #[derive(Debug, Default, PartialEq)]
    struct Widget {
        name: String,
        count: u32,
        tags: Vec<String>,
        parent: Option<Box<Widget>>,
    }

    reflect_struct!(Widget {
        name codec = "name",
        count codec = "count,omitempty",
        tags codec = "tags,omitempty",
        parent codec = "parent,omitempty",
    });

    #[derive(Debug, Default, PartialEq)]
    struct Point {
        x: i32,
        y: i32,
    }

    reflect_struct!(Point codec = ",toarray" {
        x,
        y,
    });

    fn json(v: &dyn Reflect) -> String {
        json_with(&JsonHandle::new(), v)
    }

    fn json_with(h: &JsonHandle, v: &dyn Reflect) -> String {
        let mut enc = Encoder::new(Vec::new(), h);
        enc.encode(v).unwrap();
        String::from_utf8(enc.into_inner()).unwrap()
    }

    #[test]
    fn test_omitempty_skips_in_maps() {
        let w = Widget {
            name: "widget".into(),
            ..Widget::default()
        };
        assert_eq!(json(&w), r#"{"name":"widget"}"#);

        let w = Widget {
            name: "w".into(),
            count: 7,
            tags: vec!["a".into()],
            parent: None,
        };
        assert_eq!(json(&w), r#"{"name":"w","count":7,"tags":["a"]}"#);
    }

    #[test]
    fn test_toarray_keeps_positions() {
        assert_eq!(json(&Point { x: 0, y: 5 }), "[0,5]");
    }

    #[test]
    fn test_struct_to_array_option() {
        let handle = JsonHandle::new().with_options(Options::new().with_struct_to_array(true));
        let w = Widget {
            name: "w".into(),
            ..Widget::default()
        };
        assert_eq!(json_with(&handle, &w), r#"["w",0,[],null]"#);
    }

    #[test]
    fn test_recursive_empty_check() {
        let w = Widget {
            name: "w".into(),
            parent: Some(Box::new(Widget::default())),
            ..Widget::default()
        };
        assert_eq!(json(&w), r#"{"name":"w","parent":{"name":""}}"#);

        let handle =
            JsonHandle::new().with_options(Options::new().with_recursive_empty_check(true));
        assert_eq!(json_with(&handle, &w), r#"{"name":"w"}"#);
    }

    #[test]
    fn test_canonical_sorts_keys() {
        let handle = JsonHandle::new().with_options(Options::new().with_canonical(true));
        let mut m = HashMap::new();
        for (k, v) in [("b", 2), ("c", 3), ("a", 1)] {
            m.insert(k.to_string(), v);
        }
        assert_eq!(json_with(&handle, &m), r#"{"a":1,"b":2,"c":3}"#);

        let mut ints: HashMap<i32, bool> = HashMap::new();
        ints.insert(10, true);
        ints.insert(-2, false);
        ints.insert(3, true);
        assert_eq!(json_with(&handle, &ints), r#"{"-2":false,"3":true,"10":true}"#);
    }

    #[test]
    fn test_canonical_mixed_keys_use_encoded_order() {
        let handle = SimpleHandle::new().with_options(Options::new().with_canonical(true));
        let mut m = ValueMap::new();
        m.insert("z", 1_u64);
        m.insert(5_u64, 2_u64);
        let mut enc = Encoder::new(Vec::new(), &handle);
        enc.encode(&m).unwrap();
        // posint descriptor 0x08 sorts before string descriptor 0xd9.
        assert_eq!(
            enc.into_inner(),
            vec![0xf1, 2, 0x08, 5, 0x08, 2, 0xd9, 1, b'z', 0x08, 1]
        );
    }

    #[test]
    fn test_pairs_encode_as_map() {
        use crate::reflect::MapBySlice;
        let pairs = MapBySlice(vec![Value::from("k"), Value::from(true)]);
        assert_eq!(json(&pairs), r#"{"k":true}"#);

        let odd = MapBySlice(vec![Value::from("k")]);
        let handle = JsonHandle::new();
        let mut enc = Encoder::new(Vec::new(), &handle);
        assert!(enc.encode(&odd).is_err());
    }

    #[test]
    fn test_btree_map_and_nested_containers() {
        let mut m: BTreeMap<String, Vec<Option<i8>>> = BTreeMap::new();
        m.insert("x".into(), vec![Some(1), None]);
        assert_eq!(json(&m), r#"{"x":[1,null]}"#);
    }

    #[test]
    #[should_panic(expected = "encode failed")]
    fn test_must_encode_panics() {
        let handle = JsonHandle::new();
        let mut enc = Encoder::new(Vec::new(), &handle);
        enc.must_encode(&f64::NAN);
    }
}
