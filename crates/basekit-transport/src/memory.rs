//! In-memory transport.

use std::collections::HashMap;

use async_trait::async_trait;
use basekit_model::{ObjectDocument, ObjectId};
use parking_lot::RwLock;

use crate::{SaveReport, Transport, TransportError};

/// In-process document store.
///
/// Thread-safe via an internal RwLock. Useful as a staging area for tests
/// and as the receive-side cache in round-trip pipelines.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    objects: RwLock<HashMap<ObjectId, String>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Synchronous insert, mainly for seeding test fixtures.
    pub fn insert(&self, document: ObjectDocument) {
        self.objects.write().insert(document.id, document.json);
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    /// Ids currently held, in no particular order.
    pub fn ids(&self) -> Vec<ObjectId> {
        self.objects.read().keys().cloned().collect()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn name(&self) -> &str {
        "memory"
    }

    async fn has_object(&self, id: &ObjectId) -> Result<bool, TransportError> {
        Ok(self.objects.read().contains_key(id))
    }

    async fn get_object(&self, id: &ObjectId) -> Result<Option<String>, TransportError> {
        Ok(self.objects.read().get(id).cloned())
    }

    async fn save_objects(
        &self,
        documents: &[ObjectDocument],
    ) -> Result<SaveReport, TransportError> {
        let mut objects = self.objects.write();
        for document in documents {
            objects.insert(document.id.clone(), document.json.clone());
        }
        Ok(SaveReport {
            saved: documents.len(),
            failed: Vec::new(),
        })
    }
}
