//! Type descriptors: the compiled, cached view of a type's shape.
//!
//! A [`TypeDescriptor`] is built once per concrete type from its
//! [`TypeInfo`] and the registry's tag namespaces. For structs it resolves
//! wire names, `omitempty` and `inline` flattening into a flat field list,
//! each field addressed by an index path through nested structs.
//!
//! ## Struct tags
//!
//! ```text
//! tag     = "-" | name *("," option)
//! option  = "omitempty" | "inline" | "toarray"
//! ```
//!
//! An empty name keeps the Rust field name. When several fields end up with
//! the same wire name, the one declared at the shallowest nesting wins.

use crate::fast_path::FastPathEntry;
use crate::reflect::{
    Reflect, ReflectMut, ReflectRef, ScalarKind, Struct, StructInfo, Tags, TypeInfo, TypeRef,
};
use crate::registry::ExtensionEntry;
use crate::{Error, Result};
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

// Guards against cycles of inlined structs.
const MAX_INLINE_DEPTH: usize = 16;

/// Shape summary of a described type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kind {
    Scalar(ScalarKind),
    Struct,
    Seq,
    Map,
    Optional,
    Boxed,
    Chan,
    Dynamic,
    RawExt,
    Opaque,
}

/// One serializable field of a struct, after tag resolution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Rust field name.
    pub name: &'static str,
    pub wire_name: String,
    /// Field indices from the outer struct down to this field.
    pub path: Vec<usize>,
    pub omit_empty: bool,
}

/// Cached traversal plan for one concrete type.
#[derive(Clone, Debug)]
pub struct TypeDescriptor {
    type_id: TypeId,
    name: &'static str,
    kind: Kind,
    fields: Vec<FieldDescriptor>,
    by_wire_name: HashMap<String, usize>,
    to_array: bool,
    elem: Option<TypeRef>,
    key: Option<TypeRef>,
    fixed_len: Option<usize>,
    pairs: bool,
    self_codec: bool,
    pub(crate) extension: Option<Arc<ExtensionEntry>>,
    pub(crate) fast_path: Option<&'static FastPathEntry>,
}

impl TypeDescriptor {
    pub(crate) fn build(
        type_id: TypeId,
        name: &'static str,
        info: TypeInfo,
        tag_keys: &[String],
        self_codec: bool,
    ) -> Result<Self> {
        let mut desc = TypeDescriptor {
            type_id,
            name,
            kind: Kind::Opaque,
            fields: Vec::new(),
            by_wire_name: HashMap::new(),
            to_array: false,
            elem: None,
            key: None,
            fixed_len: None,
            pairs: false,
            self_codec,
            extension: None,
            fast_path: None,
        };
        desc.kind = match info {
            TypeInfo::Scalar(kind) => Kind::Scalar(kind),
            TypeInfo::Struct(info) => {
                let struct_tag = lookup_tag(info.tags, tag_keys).map(ParsedTag::parse);
                desc.to_array = struct_tag.as_ref().map_or(false, |t| t.to_array);
                let omit_all = struct_tag.as_ref().map_or(false, |t| t.omit_empty);

                let mut candidates = Vec::new();
                collect_fields(&info, tag_keys, &mut Vec::new(), 0, &mut candidates)?;
                for mut field in resolve_conflicts(candidates) {
                    field.omit_empty |= omit_all;
                    desc.by_wire_name
                        .insert(field.wire_name.clone(), desc.fields.len());
                    desc.fields.push(field);
                }
                Kind::Struct
            }
            TypeInfo::Seq(info) => {
                desc.elem = Some(info.elem);
                desc.fixed_len = info.fixed_len;
                desc.pairs = info.pairs;
                Kind::Seq
            }
            TypeInfo::Map(info) => {
                desc.key = Some(info.key);
                desc.elem = Some(info.value);
                Kind::Map
            }
            TypeInfo::Optional(inner) => {
                desc.elem = Some(inner);
                Kind::Optional
            }
            TypeInfo::Boxed(inner) => {
                desc.elem = Some(inner);
                Kind::Boxed
            }
            TypeInfo::Chan(elem) => {
                desc.elem = Some(elem);
                Kind::Chan
            }
            TypeInfo::Dynamic => Kind::Dynamic,
            TypeInfo::RawExt => Kind::RawExt,
            TypeInfo::Opaque => Kind::Opaque,
        };
        Ok(desc)
    }

    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// Serializable fields in encoding order (structs only).
    #[inline]
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Index into [`fields`](Self::fields) of the field with this wire name.
    #[inline]
    pub fn field_index(&self, wire_name: &str) -> Option<usize> {
        self.by_wire_name.get(wire_name).copied()
    }

    /// Whether the struct travels as a positional sequence by its own tag.
    #[inline]
    pub fn to_array(&self) -> bool {
        self.to_array
    }

    /// Element type of sequences, options, boxes and channels; value type of maps.
    #[inline]
    pub fn elem(&self) -> Option<TypeRef> {
        self.elem
    }

    #[inline]
    pub fn key(&self) -> Option<TypeRef> {
        self.key
    }

    #[inline]
    pub fn fixed_len(&self) -> Option<usize> {
        self.fixed_len
    }

    #[inline]
    pub fn is_pairs(&self) -> bool {
        self.pairs
    }

    #[inline]
    pub fn has_self_codec(&self) -> bool {
        self.self_codec
    }

    #[inline]
    pub fn extension_tag(&self) -> Option<u64> {
        self.extension.as_ref().map(|e| e.tag)
    }

    #[inline]
    pub fn has_fast_path(&self) -> bool {
        self.fast_path.is_some()
    }
}

struct ParsedTag<'a> {
    skip: bool,
    name: &'a str,
    omit_empty: bool,
    inline: bool,
    to_array: bool,
}

impl<'a> ParsedTag<'a> {
    fn parse(tag: &'a str) -> Self {
        if tag == "-" {
            return ParsedTag {
                skip: true,
                name: "",
                omit_empty: false,
                inline: false,
                to_array: false,
            };
        }
        let mut parts = tag.split(',');
        let name = parts.next().unwrap_or("").trim();
        let mut parsed = ParsedTag {
            skip: false,
            name,
            omit_empty: false,
            inline: false,
            to_array: false,
        };
        for opt in parts {
            match opt.trim() {
                "omitempty" => parsed.omit_empty = true,
                "inline" => parsed.inline = true,
                "toarray" => parsed.to_array = true,
                // int/uint/float key hints and unknown options are ignored
                _ => {}
            }
        }
        parsed
    }
}

/// First tag found in the configured namespaces, in order.
fn lookup_tag(tags: Tags, tag_keys: &[String]) -> Option<&'static str> {
    tag_keys.iter().find_map(|key| {
        tags.iter()
            .find(|(ns, _)| *ns == key.as_str())
            .map(|(_, tag)| *tag)
    })
}

fn inline_target(ty: &TypeRef) -> Option<StructInfo> {
    match ty.info() {
        TypeInfo::Struct(info) => Some(info),
        TypeInfo::Boxed(inner) => match inner.info() {
            TypeInfo::Struct(info) => Some(info),
            _ => None,
        },
        _ => None,
    }
}

fn collect_fields(
    info: &StructInfo,
    tag_keys: &[String],
    prefix: &mut Vec<usize>,
    depth: usize,
    out: &mut Vec<FieldDescriptor>,
) -> Result<()> {
    if depth > MAX_INLINE_DEPTH {
        return Err(Error::unsupported(format!(
            "struct {} inlines too deeply (cycle?)",
            info.name
        )));
    }
    for (index, field) in info.fields.iter().enumerate() {
        let tag = lookup_tag(field.tags, tag_keys).map(ParsedTag::parse);
        if tag.as_ref().map_or(false, |t| t.skip) {
            continue;
        }
        prefix.push(index);
        let inline = tag.as_ref().map_or(false, |t| t.inline);
        match inline.then(|| inline_target(&field.ty)).flatten() {
            Some(inner) => collect_fields(&inner, tag_keys, prefix, depth + 1, out)?,
            None => {
                let wire_name = match tag.as_ref().map(|t| t.name) {
                    Some(name) if !name.is_empty() => name.to_string(),
                    _ => field.name.to_string(),
                };
                out.push(FieldDescriptor {
                    name: field.name,
                    wire_name,
                    path: prefix.clone(),
                    omit_empty: tag.as_ref().map_or(false, |t| t.omit_empty),
                });
            }
        }
        prefix.pop();
    }
    Ok(())
}

/// Keeps one field per wire name: the shallowest, then the first declared.
fn resolve_conflicts(candidates: Vec<FieldDescriptor>) -> Vec<FieldDescriptor> {
    let mut winner: HashMap<&str, usize> = HashMap::new();
    for (i, field) in candidates.iter().enumerate() {
        match winner.get(field.wire_name.as_str()) {
            Some(&w) if candidates[w].path.len() <= field.path.len() => {}
            _ => {
                winner.insert(field.wire_name.as_str(), i);
            }
        }
    }
    let keep: Vec<bool> = candidates
        .iter()
        .enumerate()
        .map(|(i, f)| winner.get(f.wire_name.as_str()) == Some(&i))
        .collect();
    candidates
        .into_iter()
        .zip(keep)
        .filter_map(|(f, keep)| keep.then_some(f))
        .collect()
}

fn as_struct(value: &dyn Reflect) -> Option<&dyn Struct> {
    match value.reflect_ref() {
        ReflectRef::Struct(s) => Some(s),
        ReflectRef::Boxed(inner) => as_struct(inner),
        _ => None,
    }
}

fn as_struct_mut(value: &mut dyn Reflect) -> Option<&mut dyn Struct> {
    match value.reflect_mut() {
        ReflectMut::Struct(s) => Some(s),
        ReflectMut::Boxed(inner) => as_struct_mut(inner),
        _ => None,
    }
}

/// Follows a field path through nested (possibly boxed) structs.
pub(crate) fn field_ref<'a>(root: &'a dyn Struct, path: &[usize]) -> Option<&'a dyn Reflect> {
    let (&last, parents) = path.split_last()?;
    let mut cur = root;
    for &index in parents {
        cur = as_struct(cur.field_at(index)?)?;
    }
    cur.field_at(last)
}

pub(crate) fn field_mut<'a>(
    root: &'a mut dyn Struct,
    path: &[usize],
) -> Option<&'a mut dyn Reflect> {
    let (&last, parents) = path.split_last()?;
    let mut cur = root;
    for &index in parents {
        cur = as_struct_mut(cur.field_at_mut(index)?)?;
    }
    cur.field_at_mut(last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflect::{Reflect, Typed};
    use crate::reflect_struct;

    #[derive(Debug, Default, PartialEq)]
    struct Inner {
        id: u32,
        label: String,
    }

    reflect_struct!(Inner {
        id codec = "id",
        label codec = "name",
    });

    #[derive(Debug, Default, PartialEq)]
    struct Outer {
        name: String,
        inner: Inner,
        secret: String,
        plain: i8,
    }

    reflect_struct!(Outer codec = ",toarray" {
        name json = "title" codec = "name,omitempty",
        inner codec = ",inline",
        secret codec = "-",
        plain,
    });

    fn describe<T: Typed + Reflect>(value: &T) -> TypeDescriptor {
        TypeDescriptor::build(
            value.as_any().type_id(),
            value.reflect_type_name(),
            T::type_info(),
            &["codec".to_string(), "json".to_string()],
            false,
        )
        .unwrap()
    }

    #[test]
    fn test_tags_resolve_names_and_options() {
        let desc = describe(&Outer::default());
        assert_eq!(desc.kind(), Kind::Struct);
        assert!(desc.to_array());

        let names: Vec<_> = desc.fields().iter().map(|f| f.wire_name.as_str()).collect();
        // The outer "name" shadows the inlined one; "secret" is skipped.
        assert_eq!(names, vec!["name", "id", "plain"]);
        assert!(desc.fields()[0].omit_empty);
        assert_eq!(desc.fields()[1].path, vec![1, 0]);
        assert_eq!(desc.field_index("plain"), Some(2));
        assert_eq!(desc.field_index("secret"), None);
    }

    #[test]
    fn test_namespace_order() {
        let desc = TypeDescriptor::build(
            TypeId::of::<Outer>(),
            "Outer",
            Outer::type_info(),
            &["json".to_string()],
            false,
        )
        .unwrap();
        assert_eq!(desc.fields()[0].wire_name, "title");
        assert!(!desc.to_array());
    }

    #[test]
    fn test_field_paths() {
        let mut outer = Outer {
            inner: Inner {
                id: 4,
                label: "x".into(),
            },
            ..Outer::default()
        };
        let got = field_ref(&outer, &[1, 0]).and_then(|f| f.downcast_ref::<u32>());
        assert_eq!(got, Some(&4));

        let slot = field_mut(&mut outer, &[1, 1]).unwrap();
        *slot.downcast_mut::<String>().unwrap() = "y".into();
        assert_eq!(outer.inner.label, "y");
        assert!(field_ref(&outer, &[9]).is_none());
    }
}
