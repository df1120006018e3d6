//! The registry: type descriptor cache plus extension table.
//!
//! A [`Registry`] is owned by a handle (usually behind an `Arc`, so several
//! handles can share one). Its lifecycle has two phases:
//!
//! 1. **Setup**: the application registers extensions.
//! 2. **Use**: the first `describe` call (made by any encode or decode)
//!    freezes the extension table. Registering afterwards is an error.
//!
//! Descriptors are built lazily and published fully formed behind an `Arc`;
//! concurrent sessions only ever see complete descriptors.
//!
//! # Examples
//!
//! ```rust
//! use polycodec::{reflect_opaque, Registry};
//!
//! #[derive(Debug, Default, PartialEq)]
//! struct Money {
//!     cents: i64,
//! }
//! reflect_opaque!(Money);
//!
//! let registry = Registry::new();
//! registry
//!     .register_bytes_ext::<Money>(
//!         7,
//!         |m| m.cents.to_be_bytes().to_vec(),
//!         |b| {
//!             let raw: [u8; 8] = b.try_into().map_err(polycodec::Error::custom)?;
//!             Ok(Money { cents: i64::from_be_bytes(raw) })
//!         },
//!     )
//!     .unwrap();
//! assert_eq!(registry.extension_tag::<Money>(), Some(7));
//! ```

use crate::descriptor::{Kind, TypeDescriptor};
use crate::fast_path;
use crate::reflect::{Reflect, Typed};
use crate::{Error, Result, Value};
use parking_lot::RwLock;
use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Struct tag namespaces consulted by default, in order.
pub const DEFAULT_TAG_KEYS: &[&str] = &["codec", "json"];

/// A user supplied wire representation for one type.
///
/// There are two forms. The byte form (`write_ext` / `read_ext`) turns the
/// value into an opaque payload carried under the extension tag. The value
/// form (`convert_ext` / `update_ext`, enabled by `has_value_form`) turns it
/// into a [`Value`] that is encoded like any other; text formats require it
/// for a readable representation and fall back to the byte form otherwise.
pub trait Extension: Send + Sync {
    fn write_ext(&self, value: &dyn Reflect) -> Result<Vec<u8>> {
        Err(Error::unsupported(format!(
            "{}: extension has no byte form",
            value.reflect_type_name()
        )))
    }

    fn read_ext(&self, dst: &mut dyn Reflect, _data: &[u8]) -> Result<()> {
        Err(Error::unsupported(format!(
            "{}: extension has no byte form",
            dst.reflect_type_name()
        )))
    }

    fn has_value_form(&self) -> bool {
        false
    }

    fn convert_ext(&self, value: &dyn Reflect) -> Result<Value> {
        Err(Error::unsupported(format!(
            "{}: extension has no value form",
            value.reflect_type_name()
        )))
    }

    fn update_ext(&self, dst: &mut dyn Reflect, _src: Value) -> Result<()> {
        Err(Error::unsupported(format!(
            "{}: extension has no value form",
            dst.reflect_type_name()
        )))
    }
}

/// A registered extension.
pub struct ExtensionEntry {
    pub tag: u64,
    pub type_name: &'static str,
    pub ext: Box<dyn Extension>,
}

impl fmt::Debug for ExtensionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionEntry")
            .field("tag", &self.tag)
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

fn downcast<T: Reflect>(value: &dyn Reflect) -> Result<&T> {
    value.downcast_ref::<T>().ok_or_else(|| {
        Error::custom(format!(
            "extension for {} called with {}",
            std::any::type_name::<T>(),
            value.reflect_type_name()
        ))
    })
}

fn downcast_mut<T: Reflect>(value: &mut dyn Reflect) -> Result<&mut T> {
    let found = value.reflect_type_name();
    value.downcast_mut::<T>().ok_or_else(|| {
        Error::custom(format!(
            "extension for {} called with {}",
            std::any::type_name::<T>(),
            found
        ))
    })
}

struct BytesExt<T> {
    to: fn(&T) -> Vec<u8>,
    from: fn(&[u8]) -> Result<T>,
}

impl<T: Reflect> Extension for BytesExt<T> {
    fn write_ext(&self, value: &dyn Reflect) -> Result<Vec<u8>> {
        Ok((self.to)(downcast::<T>(value)?))
    }

    fn read_ext(&self, dst: &mut dyn Reflect, data: &[u8]) -> Result<()> {
        *downcast_mut::<T>(dst)? = (self.from)(data)?;
        Ok(())
    }
}

struct ValueExt<T> {
    to: fn(&T) -> Value,
    from: fn(Value) -> Result<T>,
}

impl<T: Reflect> Extension for ValueExt<T> {
    fn has_value_form(&self) -> bool {
        true
    }

    fn convert_ext(&self, value: &dyn Reflect) -> Result<Value> {
        Ok((self.to)(downcast::<T>(value)?))
    }

    fn update_ext(&self, dst: &mut dyn Reflect, src: Value) -> Result<()> {
        *downcast_mut::<T>(dst)? = (self.from)(src)?;
        Ok(())
    }
}

/// Type descriptor cache and extension table.
pub struct Registry {
    tag_keys: Vec<String>,
    descriptors: RwLock<HashMap<TypeId, Arc<TypeDescriptor>>>,
    extensions: RwLock<HashMap<TypeId, Arc<ExtensionEntry>>>,
    in_use: AtomicBool,
}

impl Registry {
    /// Creates a registry reading the `codec`, then `json` tag namespaces.
    pub fn new() -> Self {
        Self::with_tag_keys(DEFAULT_TAG_KEYS)
    }

    /// Creates a registry reading the given tag namespaces, in order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use polycodec::Registry;
    ///
    /// let registry = Registry::with_tag_keys(&["wire"]);
    /// assert_eq!(registry.tag_keys(), ["wire".to_string()]);
    /// ```
    pub fn with_tag_keys<S: AsRef<str>>(keys: &[S]) -> Self {
        Registry {
            tag_keys: keys.iter().map(|k| k.as_ref().to_string()).collect(),
            descriptors: RwLock::new(HashMap::new()),
            extensions: RwLock::new(HashMap::new()),
            in_use: AtomicBool::new(false),
        }
    }

    pub fn tag_keys(&self) -> &[String] {
        &self.tag_keys
    }

    /// Registers an extension for `T` under `tag`.
    ///
    /// Fails if `T` already has one, or if the registry has already been used
    /// to encode or decode.
    pub fn register_extension<T: Reflect>(&self, tag: u64, ext: Box<dyn Extension>) -> Result<()> {
        let type_name = std::any::type_name::<T>();
        if self.in_use.load(Ordering::Acquire) {
            return Err(Error::registration(format!(
                "cannot register {type_name}: registry already in use"
            )));
        }
        let mut extensions = self.extensions.write();
        if let Some(existing) = extensions.get(&TypeId::of::<T>()) {
            return Err(Error::registration(format!(
                "{type_name} already has an extension (tag {})",
                existing.tag
            )));
        }
        extensions.insert(
            TypeId::of::<T>(),
            Arc::new(ExtensionEntry {
                tag,
                type_name,
                ext,
            }),
        );
        debug!(type_name, tag, "registered extension");
        Ok(())
    }

    /// Registers a byte-form extension from a pair of conversion functions.
    pub fn register_bytes_ext<T: Reflect>(
        &self,
        tag: u64,
        to: fn(&T) -> Vec<u8>,
        from: fn(&[u8]) -> Result<T>,
    ) -> Result<()> {
        self.register_extension::<T>(tag, Box::new(BytesExt { to, from }))
    }

    /// Registers a value-form extension from a pair of conversion functions.
    pub fn register_value_ext<T: Reflect>(
        &self,
        tag: u64,
        to: fn(&T) -> Value,
        from: fn(Value) -> Result<T>,
    ) -> Result<()> {
        self.register_extension::<T>(tag, Box::new(ValueExt { to, from }))
    }

    pub fn extension_tag<T: Reflect>(&self) -> Option<u64> {
        self.extensions.read().get(&TypeId::of::<T>()).map(|e| e.tag)
    }

    /// Whether encode/decode traffic has gone through this registry.
    pub fn is_in_use(&self) -> bool {
        self.in_use.load(Ordering::Acquire)
    }

    /// Number of cached descriptors.
    pub fn cached_len(&self) -> usize {
        self.descriptors.read().len()
    }

    /// Returns the descriptor of `value`'s concrete type, building and caching
    /// it on first sight.
    ///
    /// Fails for opaque types that have neither an extension nor a self codec.
    pub fn describe(&self, value: &dyn Reflect) -> Result<Arc<TypeDescriptor>> {
        let type_id = value.reflect_type_id();
        if let Some(desc) = self.descriptors.read().get(&type_id) {
            return Ok(Arc::clone(desc));
        }
        self.in_use.store(true, Ordering::Release);

        let mut desc = TypeDescriptor::build(
            type_id,
            value.reflect_type_name(),
            value.reflect_type_info(),
            &self.tag_keys,
            value.as_self_codec().is_some(),
        )?;
        {
            let extensions = self.extensions.read();
            desc.extension = extensions.get(&type_id).cloned();
            if desc.extension.is_none() {
                desc.fast_path = fast_path::lookup(type_id).filter(|entry| {
                    !extensions.contains_key(&entry.elem)
                        && entry.key.map_or(true, |k| !extensions.contains_key(&k))
                });
            }
        }
        if desc.kind() == Kind::Opaque && desc.extension.is_none() && !desc.has_self_codec() {
            return Err(Error::unsupported(format!(
                "{} has no extension or self codec",
                desc.name()
            )));
        }

        debug!(
            type_name = desc.name(),
            kind = ?desc.kind(),
            fields = desc.fields().len(),
            fast_path = desc.has_fast_path(),
            "built type descriptor"
        );
        let mut descriptors = self.descriptors.write();
        // Equivalent descriptors may race here; the first one published stays.
        Ok(Arc::clone(
            descriptors.entry(type_id).or_insert_with(|| Arc::new(desc)),
        ))
    }

    /// Describes a type without a value at hand.
    pub fn describe_type<T: Reflect + Typed + Default>(&self) -> Result<Arc<TypeDescriptor>> {
        self.describe(&T::default())
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("tag_keys", &self.tag_keys)
            .field("cached", &self.cached_len())
            .field("extensions", &self.extensions.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{reflect_opaque, ErrorKind};
    use std::thread;

    #[derive(Debug, Default, PartialEq)]
    struct Token(u32);
    reflect_opaque!(Token);

    fn token_to(t: &Token) -> Vec<u8> {
        t.0.to_be_bytes().to_vec()
    }

    fn token_from(b: &[u8]) -> Result<Token> {
        let raw: [u8; 4] = b.try_into().map_err(Error::custom)?;
        Ok(Token(u32::from_be_bytes(raw)))
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let registry = Registry::new();
        registry.register_bytes_ext::<Token>(3, token_to, token_from).unwrap();
        let err = registry
            .register_bytes_ext::<Token>(4, token_to, token_from)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Registration);
        assert_eq!(registry.extension_tag::<Token>(), Some(3));
    }

    #[test]
    fn test_registration_after_use_fails() {
        let registry = Registry::new();
        registry.describe(&5_u32).unwrap();
        let err = registry
            .register_bytes_ext::<Token>(3, token_to, token_from)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Registration);
    }

    #[test]
    fn test_opaque_without_extension_is_unsupported() {
        let registry = Registry::new();
        let err = registry.describe(&Token(1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
    }

    #[test]
    fn test_descriptors_are_cached_once() {
        let registry = Registry::new();
        let a = registry.describe(&vec![1_i64]).unwrap();
        let b = registry.describe(&Vec::<i64>::new()).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.cached_len(), 1);
        assert!(a.has_fast_path());
    }

    #[test]
    fn test_extension_disables_fast_path_of_containers() {
        let registry = Registry::new();
        registry
            .register_bytes_ext::<u32>(9, |v| v.to_be_bytes().to_vec(), |_| Ok(0))
            .unwrap();
        let desc = registry.describe(&vec![1_u32]).unwrap();
        assert!(!desc.has_fast_path());
    }

    #[test]
    fn test_concurrent_describe() {
        let registry = Arc::new(Registry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.describe(&String::new()).unwrap())
            })
            .collect();
        let descs: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(descs.iter().all(|d| Arc::ptr_eq(d, &descs[0])));
    }
}
