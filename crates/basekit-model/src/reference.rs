//! Content-addressed identifiers, references, and document payloads.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::base::BaseHandle;

/// Content-derived identifier of an addressable document.
///
/// Ids are produced by hashing a document's canonical form, so two objects
/// with identical content always share an id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    pub fn new(id: impl Into<String>) -> Self {
        ObjectId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ObjectId {
    fn from(id: String) -> Self {
        ObjectId(id)
    }
}

impl From<&str> for ObjectId {
    fn from(id: &str) -> Self {
        ObjectId(id.to_string())
    }
}

impl AsRef<str> for ObjectId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Totals for a reference target's transitive closure, target included.
///
/// `size` counts canonical bytes, `count` counts documents. Consumers use
/// these to plan fetches without resolving anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosureSummary {
    pub size: u64,
    pub count: u64,
}

impl ClosureSummary {
    pub fn new(size: u64, count: u64) -> Self {
        ClosureSummary { size, count }
    }
}

/// A pointer to a detached object.
///
/// References always carry the target's id; the target handle is attached
/// once (and if) the referenced document has been fetched and decoded.
#[derive(Debug, Clone)]
pub struct ObjectReference {
    pub id: ObjectId,
    pub closure: Option<ClosureSummary>,
    pub target: Option<BaseHandle>,
}

impl ObjectReference {
    pub fn new(id: impl Into<ObjectId>) -> Self {
        ObjectReference {
            id: id.into(),
            closure: None,
            target: None,
        }
    }

    pub fn with_closure(mut self, closure: ClosureSummary) -> Self {
        self.closure = Some(closure);
        self
    }

    pub fn with_target(mut self, target: BaseHandle) -> Self {
        self.target = Some(target);
        self
    }

    /// True when the referenced object has been fetched and attached.
    pub fn is_resolved(&self) -> bool {
        self.target.is_some()
    }
}

impl PartialEq for ObjectReference {
    /// Two references are equal when both targets are attached and equal,
    /// or otherwise when their ids match.
    fn eq(&self, other: &Self) -> bool {
        match (&self.target, &other.target) {
            (Some(a), Some(b)) => a == b,
            _ => self.id == other.id,
        }
    }
}

/// A serialized object ready for (or read from) a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectDocument {
    pub id: ObjectId,
    pub json: String,
}

impl ObjectDocument {
    pub fn new(id: impl Into<ObjectId>, json: impl Into<String>) -> Self {
        ObjectDocument {
            id: id.into(),
            json: json.into(),
        }
    }

    /// Canonical size of the document in bytes.
    pub fn size(&self) -> u64 {
        self.json.len() as u64
    }
}
