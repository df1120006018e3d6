//! Value shapes: the runtime view of Rust values used by the engines.
//!
//! Instead of inspecting arbitrary memory, the encode and decode engines see
//! every value through [`Reflect`], which exposes one of a small closed set of
//! shapes ([`ReflectRef`] / [`ReflectMut`]):
//!
//! - **Scalar**: numbers, bools, chars, strings, raw bytes, timestamps
//! - **Struct**: records with named fields ([`Struct`])
//! - **Seq**: vectors, arrays and flattened pair lists ([`Seq`])
//! - **Map**: hash, btree and insertion ordered maps ([`Map`])
//! - **Optional** / **Boxed**: nil-able and non-nil pointers
//! - **Chan**: channel-like sources and sinks ([`ChanLike`])
//! - **Dynamic** / **RawExt**: the untyped [`Value`] and tagged raw payloads
//! - **Opaque**: types that only travel through an extension or a self codec
//!
//! Static shape information comes from [`Typed::type_info`]. User structs get
//! both traits from [`reflect_struct!`](crate::reflect_struct); types with a
//! custom wire form use [`reflect_opaque!`](crate::reflect_opaque).
//!
//! ```rust
//! use polycodec::reflect::{Reflect, ReflectRef, ScalarRef};
//!
//! let value: &dyn Reflect = &42_u16;
//! assert!(matches!(value.reflect_ref(), ReflectRef::Scalar(ScalarRef::Uint(42))));
//! ```

mod impls;
mod info;
mod macros;

pub use impls::MapBySlice;
pub use info::{FieldInfo, MapInfo, ScalarKind, SeqInfo, StructInfo, Tags, TypeInfo, TypeRef};

use crate::decode::ValueDecoder;
use crate::encode::ValueEncoder;
use crate::options::ChanTimeout;
use crate::{RawExt, Result, Value};
use chrono::{DateTime, Utc};
use std::any::{Any, TypeId};

/// Types that can describe their shape without a value.
pub trait Typed: 'static {
    fn type_info() -> TypeInfo;
}

/// Object safe runtime view of a value.
pub trait Reflect: Any + Send + Sync {
    /// Shape information of the concrete type behind this value.
    fn reflect_type_info(&self) -> TypeInfo;

    fn reflect_type_name(&self) -> &'static str;

    fn reflect_ref(&self) -> ReflectRef<'_>;

    fn reflect_mut(&mut self) -> ReflectMut<'_>;

    /// Resets the value to its zero value (`Default`).
    fn reset(&mut self);

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any>;

    /// Returns the self-describing codec of this value, if it has one.
    fn as_self_codec(&self) -> Option<&dyn SelfCodec> {
        None
    }

    fn as_self_codec_mut(&mut self) -> Option<&mut dyn SelfCodec> {
        None
    }
}

impl dyn Reflect {
    /// `TypeId` of the concrete value (not of the trait object).
    #[inline]
    pub fn reflect_type_id(&self) -> TypeId {
        self.as_any().type_id()
    }

    #[inline]
    pub fn is<T: Reflect>(&self) -> bool {
        self.as_any().is::<T>()
    }

    #[inline]
    pub fn downcast_ref<T: Reflect>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    #[inline]
    pub fn downcast_mut<T: Reflect>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}

/// Everything a container needs from its element type.
pub trait Element: Reflect + Typed + Default {}

impl<T: Reflect + Typed + Default> Element for T {}

/// Borrowed shape of a value, for encoding.
pub enum ReflectRef<'a> {
    Scalar(ScalarRef<'a>),
    Struct(&'a dyn Struct),
    Seq(&'a dyn Seq),
    Map(&'a dyn Map),
    Optional(&'a dyn Optional),
    Boxed(&'a dyn Reflect),
    Chan(&'a dyn ChanLike),
    Dynamic(&'a Value),
    RawExt(&'a RawExt),
    Opaque,
}

/// Mutably borrowed shape of a value, for decoding.
pub enum ReflectMut<'a> {
    Scalar(ScalarMut<'a>),
    Struct(&'a mut dyn Struct),
    Seq(&'a mut dyn Seq),
    Map(&'a mut dyn Map),
    Optional(&'a mut dyn Optional),
    Boxed(&'a mut dyn Reflect),
    Chan(&'a mut dyn ChanLike),
    Dynamic(&'a mut Value),
    RawExt(&'a mut RawExt),
    Opaque,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ScalarRef<'a> {
    Bool(bool),
    Int(i64),
    Uint(u64),
    F32(f32),
    F64(f64),
    Char(char),
    Str(&'a str),
    Bytes(&'a [u8]),
    Time(&'a DateTime<Utc>),
}

impl ScalarRef<'_> {
    /// Whether this is the zero value of its kind (`omitempty`).
    pub fn is_empty(&self) -> bool {
        match *self {
            ScalarRef::Bool(b) => !b,
            ScalarRef::Int(i) => i == 0,
            ScalarRef::Uint(u) => u == 0,
            ScalarRef::F32(f) => f == 0.0,
            ScalarRef::F64(f) => f == 0.0,
            ScalarRef::Char(c) => c == '\0',
            ScalarRef::Str(s) => s.is_empty(),
            ScalarRef::Bytes(b) => b.is_empty(),
            ScalarRef::Time(t) => t.timestamp() == 0 && t.timestamp_subsec_nanos() == 0,
        }
    }
}

#[derive(Debug)]
pub enum ScalarMut<'a> {
    Bool(&'a mut bool),
    I8(&'a mut i8),
    I16(&'a mut i16),
    I32(&'a mut i32),
    I64(&'a mut i64),
    Isize(&'a mut isize),
    U8(&'a mut u8),
    U16(&'a mut u16),
    U32(&'a mut u32),
    U64(&'a mut u64),
    Usize(&'a mut usize),
    F32(&'a mut f32),
    F64(&'a mut f64),
    Char(&'a mut char),
    String(&'a mut String),
    Bytes(&'a mut Vec<u8>),
    Time(&'a mut DateTime<Utc>),
}

/// Records with positional fields. Names and options come from [`TypeInfo`].
pub trait Struct: Reflect {
    fn field_at(&self, index: usize) -> Option<&dyn Reflect>;

    fn field_at_mut(&mut self, index: usize) -> Option<&mut dyn Reflect>;

    fn field_count(&self) -> usize;
}

pub trait Seq: Reflect {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&self, index: usize) -> Option<&dyn Reflect>;

    fn get_mut(&mut self, index: usize) -> Option<&mut dyn Reflect>;

    /// Appends a zero element and returns it; `None` for fixed-size storage.
    fn push_default(&mut self) -> Option<&mut dyn Reflect>;

    /// Shrinks to `len` elements. Fixed-size storage resets the tail instead.
    fn truncate(&mut self, len: usize);

    fn reserve(&mut self, additional: usize);

    /// Elements are flattened key/value pairs that travel as a map.
    fn is_pairs(&self) -> bool {
        false
    }
}

pub trait Map: Reflect {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn iter(&self) -> Box<dyn Iterator<Item = (&dyn Reflect, &dyn Reflect)> + '_>;

    fn clear(&mut self);

    fn reserve(&mut self, additional: usize);

    /// A zero key, ready to be decoded into.
    fn new_key(&self) -> Box<dyn Reflect>;

    /// Returns the value stored under `key`, inserting a zero value first if
    /// absent. `None` if `key` is not of this map's key type.
    fn entry_mut(&mut self, key: Box<dyn Reflect>) -> Option<&mut dyn Reflect>;
}

pub trait Optional: Reflect {
    fn get(&self) -> Option<&dyn Reflect>;

    fn get_mut(&mut self) -> Option<&mut dyn Reflect>;

    fn set_none(&mut self);

    /// Returns the contained value, allocating a zero value first if empty.
    fn get_or_insert_default(&mut self) -> &mut dyn Reflect;
}

pub trait ChanLike: Reflect {
    /// Receives pending elements according to `timeout`.
    fn drain(&self, timeout: ChanTimeout) -> Vec<Box<dyn Reflect>>;

    fn new_elem(&self) -> Box<dyn Reflect>;

    fn send(&mut self, elem: Box<dyn Reflect>) -> Result<()>;
}

/// A value that knows how to encode and decode itself.
///
/// The engines hand over the whole value; nothing about its shape is inspected.
pub trait SelfCodec {
    fn encode_self(&self, encoder: &mut dyn ValueEncoder) -> Result<()>;

    fn decode_self(&mut self, decoder: &mut dyn ValueDecoder) -> Result<()>;
}
