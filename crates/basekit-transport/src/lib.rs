//! Object document transports.
//!
//! A [`Transport`] is any store that can answer three questions about
//! content-addressed documents: do you have this id, give me this id, and
//! take these documents. Because ids derive from content, `save_objects` is
//! idempotent everywhere and callers dedupe by asking `has_object` first.
//!
//! This crate provides:
//! - [`MemoryTransport`]: in-process store for tests and staging
//! - [`FsTransport`]: sharded on-disk store with atomic writes

use std::fmt;

use async_trait::async_trait;
use basekit_model::{ObjectDocument, ObjectId};

pub mod fs;
pub mod memory;

pub use fs::FsTransport;
pub use memory::MemoryTransport;

/// Failure at the transport layer.
///
/// Per-document save failures do not use this type; they are reported in
/// [`SaveReport::failed`] so one bad document does not abort a batch.
#[derive(Debug)]
pub enum TransportError {
    /// An underlying IO operation failed.
    Io {
        context: String,
        source: std::io::Error,
    },
    /// The backend rejected or could not complete the operation.
    Backend { transport: String, detail: String },
}

impl TransportError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        TransportError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn backend(transport: impl Into<String>, detail: impl Into<String>) -> Self {
        TransportError::Backend {
            transport: transport.into(),
            detail: detail.into(),
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Io { context, source } => {
                write!(f, "io error while {}: {}", context, source)
            }
            TransportError::Backend { transport, detail } => {
                write!(f, "transport '{}' failed: {}", transport, detail)
            }
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransportError::Io { source, .. } => Some(source),
            TransportError::Backend { .. } => None,
        }
    }
}

/// Outcome of a batch save.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveReport {
    /// Documents now present because of this call.
    pub saved: usize,
    /// Documents the backend could not persist.
    pub failed: Vec<ObjectId>,
}

impl SaveReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Folds another batch's outcome into this one.
    pub fn merge(&mut self, other: SaveReport) {
        self.saved += other.saved;
        self.failed.extend(other.failed);
    }
}

/// A store for content-addressed object documents.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Short name for logs and receipts.
    fn name(&self) -> &str;

    /// Whether a document with this id is already present.
    async fn has_object(&self, id: &ObjectId) -> Result<bool, TransportError>;

    /// Fetches a document's JSON payload; `None` when the id is unknown.
    async fn get_object(&self, id: &ObjectId) -> Result<Option<String>, TransportError>;

    /// Persists a batch of documents.
    ///
    /// Saving an id that is already present must succeed without rewriting
    /// meaningfully different content; ids derive from content, so a
    /// collision is the same document.
    async fn save_objects(
        &self,
        documents: &[ObjectDocument],
    ) -> Result<SaveReport, TransportError>;
}
