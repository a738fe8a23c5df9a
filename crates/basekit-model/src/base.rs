//! Schemaless objects and the shared handles that link them into graphs.
//!
//! A [`Base`] is a bag of properties under a type-chain discriminator. The
//! chain is a colon-separated list of type names, most-derived first
//! (`"Objects.Geometry.Mesh:Objects.Base"`), which is what lets a consumer
//! that only knows an ancestor still decode the object meaningfully.
//!
//! Properties live in two maps:
//! - declared: properties a registered type descriptor knows about
//! - dynamic: everything attached at runtime
//!
//! The two namespaces never overlap; writes that would cross them fail with
//! [`PropertyError`].
//!
//! [`BaseHandle`] wraps a `Base` in `Arc<RwLock<..>>` so one object can sit
//! under several parents (or, erroneously, under itself; the serializer
//! rejects cycles at encode time).

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::PropertyError;
use crate::issue::DecodeIssue;
use crate::reference::ObjectId;
use crate::value::PropValue;
use crate::{is_reserved_field, GENERIC_TYPE};

/// A dynamic object: type chain, properties, and an id once encoded.
#[derive(Debug, Clone, Default)]
pub struct Base {
    chain: Vec<String>,
    /// Content-derived id. `None` until the object has been encoded or was
    /// decoded from an addressable document.
    pub id: Option<ObjectId>,
    declared: BTreeMap<String, PropValue>,
    dynamic: BTreeMap<String, PropValue>,
    issues: Vec<DecodeIssue>,
}

impl Base {
    /// Creates an object from a colon-separated type chain.
    ///
    /// Blank segments are dropped; an entirely blank chain falls back to the
    /// generic `"Base"` type.
    pub fn new(type_chain: &str) -> Self {
        let chain: Vec<String> = type_chain
            .split(':')
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .collect();
        Base {
            chain: if chain.is_empty() {
                vec![GENERIC_TYPE.to_string()]
            } else {
                chain
            },
            ..Base::default()
        }
    }

    /// Creates a generic object with no declared shape.
    pub fn generic() -> Self {
        Base::new(GENERIC_TYPE)
    }

    /// Creates a chunk document holding one slice of a split list.
    pub fn data_chunk(items: Vec<PropValue>) -> Self {
        let mut declared = BTreeMap::new();
        declared.insert(crate::CHUNK_DATA_PROP.to_string(), PropValue::List(items));
        Base {
            chain: vec![crate::CHUNK_TYPE.to_string()],
            declared,
            ..Base::default()
        }
    }

    /// Full chain joined with `:`, as written to the wire.
    pub fn type_chain(&self) -> String {
        self.chain.join(":")
    }

    /// Most-derived type name.
    pub fn type_name(&self) -> &str {
        // Construction guarantees at least one segment.
        self.chain.first().map(String::as_str).unwrap_or(GENERIC_TYPE)
    }

    /// Chain segments, most-derived first.
    pub fn ancestry(&self) -> &[String] {
        &self.chain
    }

    /// True when `name` appears anywhere in the chain.
    pub fn is_of_type(&self, name: &str) -> bool {
        self.chain.iter().any(|segment| segment == name)
    }

    // ==================== Property access ====================

    /// Sets a declared property.
    pub fn set_declared(
        &mut self,
        name: impl Into<String>,
        value: PropValue,
    ) -> Result<(), PropertyError> {
        let name = name.into();
        if is_reserved_field(&name) {
            return Err(PropertyError::ReservedName { name });
        }
        if self.dynamic.contains_key(&name) {
            return Err(PropertyError::DynamicCollision { name });
        }
        self.declared.insert(name, value);
        Ok(())
    }

    /// Sets a dynamic property.
    pub fn set_dynamic(
        &mut self,
        name: impl Into<String>,
        value: PropValue,
    ) -> Result<(), PropertyError> {
        let name = name.into();
        if is_reserved_field(&name) {
            return Err(PropertyError::ReservedName { name });
        }
        if self.declared.contains_key(&name) {
            return Err(PropertyError::DeclaredCollision { name });
        }
        self.dynamic.insert(name, value);
        Ok(())
    }

    /// Looks a property up in either map.
    pub fn get(&self, name: &str) -> Option<&PropValue> {
        self.declared.get(name).or_else(|| self.dynamic.get(name))
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut PropValue> {
        if let Some(value) = self.declared.get_mut(name) {
            return Some(value);
        }
        self.dynamic.get_mut(name)
    }

    /// Removes a property from whichever map holds it.
    pub fn remove(&mut self, name: &str) -> Option<PropValue> {
        self.declared
            .remove(name)
            .or_else(|| self.dynamic.remove(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.declared.contains_key(name) || self.dynamic.contains_key(name)
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.declared.contains_key(name)
    }

    /// Declared properties in name order.
    pub fn declared(&self) -> impl Iterator<Item = (&str, &PropValue)> {
        self.declared.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Dynamic properties in name order.
    pub fn dynamic(&self) -> impl Iterator<Item = (&str, &PropValue)> {
        self.dynamic.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// All properties, declared first, each map in name order.
    pub fn properties(&self) -> impl Iterator<Item = (&str, &PropValue)> {
        self.declared().chain(self.dynamic())
    }

    pub fn property_count(&self) -> usize {
        self.declared.len() + self.dynamic.len()
    }

    // ==================== Decode diagnostics ====================

    /// Attaches a non-fatal decode diagnostic to this object.
    pub fn push_issue(&mut self, issue: DecodeIssue) {
        self.issues.push(issue);
    }

    pub fn issues(&self) -> &[DecodeIssue] {
        &self.issues
    }

    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }
}

impl PartialEq for Base {
    /// Content equality: chain and both property maps.
    ///
    /// `id` and decode issues are intentionally excluded; the id derives from
    /// the content and issues describe a particular decode, not the object.
    fn eq(&self, other: &Self) -> bool {
        self.chain == other.chain
            && self.declared == other.declared
            && self.dynamic == other.dynamic
    }
}

/// Shared, lockable handle to a [`Base`].
///
/// Handles are cheap to clone and compare by content; use [`ptr_eq`]
/// (`BaseHandle::ptr_eq`) for identity. Structural equality recurses through
/// nested objects, so it must only be asked of acyclic graphs; the
/// serializer's cycle rejection runs before any code path that compares.
#[derive(Clone)]
pub struct BaseHandle(Arc<RwLock<Base>>);

impl BaseHandle {
    pub fn new(base: Base) -> Self {
        BaseHandle(Arc::new(RwLock::new(base)))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Base> {
        self.0.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Base> {
        self.0.write()
    }

    /// True when both handles point at the same allocation.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Stable address of the underlying allocation, for identity sets.
    pub fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }
}

impl From<Base> for BaseHandle {
    fn from(base: Base) -> Self {
        BaseHandle::new(base)
    }
}

impl PartialEq for BaseHandle {
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        let a = self.read();
        let b = other.read();
        *a == *b
    }
}

impl fmt::Debug for BaseHandle {
    /// Non-recursive summary; printing the full graph could chase a cycle.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guard = self.read();
        f.debug_struct("BaseHandle")
            .field("type", &guard.type_chain())
            .field("id", &guard.id)
            .field("properties", &guard.property_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_parsing_drops_blank_segments() {
        let base = Base::new("Objects.Geometry.Mesh: Objects.Base :");
        assert_eq!(base.type_name(), "Objects.Geometry.Mesh");
        assert_eq!(base.type_chain(), "Objects.Geometry.Mesh:Objects.Base");
        assert!(base.is_of_type("Objects.Base"));
        assert!(!base.is_of_type("Objects"));
    }

    #[test]
    fn blank_chain_falls_back_to_generic() {
        assert_eq!(Base::new("").type_chain(), "Base");
        assert_eq!(Base::new(" : ").type_chain(), "Base");
        assert_eq!(Base::generic().type_name(), "Base");
    }

    #[test]
    fn namespaces_do_not_overlap() {
        let mut base = Base::new("Widget");
        base.set_declared("height", 3i64.into()).expect("declared set");

        let err = base.set_dynamic("height", 4i64.into()).expect_err("collision");
        assert_eq!(
            err,
            PropertyError::DeclaredCollision {
                name: "height".to_string()
            }
        );

        base.set_dynamic("tag", "a".into()).expect("dynamic set");
        let err = base.set_declared("tag", "b".into()).expect_err("collision");
        assert_eq!(
            err,
            PropertyError::DynamicCollision {
                name: "tag".to_string()
            }
        );

        // Overwriting within the same namespace is fine.
        base.set_declared("height", 5i64.into()).expect("overwrite");
        assert_eq!(base.get("height").and_then(PropValue::as_i64), Some(5));
    }

    #[test]
    fn reserved_names_are_rejected() {
        let mut base = Base::generic();
        for name in crate::RESERVED_FIELDS {
            assert!(matches!(
                base.set_dynamic(name, PropValue::Null),
                Err(PropertyError::ReservedName { .. })
            ));
            assert!(matches!(
                base.set_declared(name, PropValue::Null),
                Err(PropertyError::ReservedName { .. })
            ));
        }
    }

    #[test]
    fn equality_ignores_id_and_issues() {
        let mut a = Base::new("Widget");
        a.set_dynamic("x", 1i64.into()).expect("set");
        let mut b = a.clone();
        b.id = Some(ObjectId::from("cafe"));
        b.push_issue(DecodeIssue::new(crate::IssueKind::UnknownType {
            chain: "Widget".to_string(),
        }));
        assert_eq!(a, b);

        b.set_dynamic("x", 2i64.into()).expect("set");
        assert_ne!(a, b);
    }

    #[test]
    fn handles_share_and_compare() {
        let handle = BaseHandle::new(Base::new("Widget"));
        let alias = handle.clone();
        assert!(handle.ptr_eq(&alias));

        alias.write().set_dynamic("n", 1i64.into()).expect("set");
        assert_eq!(handle.read().get("n").and_then(PropValue::as_i64), Some(1));

        let mut other = Base::new("Widget");
        other.set_dynamic("n", 1i64.into()).expect("set");
        let other = BaseHandle::new(other);
        assert!(!handle.ptr_eq(&other));
        assert_eq!(handle, other);
    }

    #[test]
    fn data_chunks_declare_their_payload() {
        let chunk = Base::data_chunk(vec![1i64.into(), 2i64.into()]);
        assert_eq!(chunk.type_chain(), crate::CHUNK_TYPE);
        assert!(chunk.is_declared(crate::CHUNK_DATA_PROP));
        let data = chunk
            .get(crate::CHUNK_DATA_PROP)
            .and_then(PropValue::as_list)
            .expect("data list");
        assert_eq!(data.len(), 2);
    }

    #[test]
    fn properties_iterate_declared_then_dynamic() {
        let mut base = Base::new("Widget");
        base.set_dynamic("zz", 1i64.into()).expect("set");
        base.set_declared("aa", 2i64.into()).expect("set");
        base.set_dynamic("bb", 3i64.into()).expect("set");

        let names: Vec<&str> = base.properties().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["aa", "bb", "zz"]);
        assert_eq!(base.property_count(), 3);
    }
}
