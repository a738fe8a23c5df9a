//! Filesystem transport with a sharded directory layout.
//!
//! Documents live under `<root>/objects/aa/bb/<id>.json`, where `aa` and
//! `bb` are the first two byte pairs of the id. Two shard levels keep
//! directory fan-out flat for stores with millions of objects. Writes go to
//! a temp file first and are renamed into place, so readers never observe a
//! half-written document.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use basekit_model::{ObjectDocument, ObjectId};
use tracing::warn;

use crate::{SaveReport, Transport, TransportError};

/// On-disk document store.
#[derive(Debug)]
pub struct FsTransport {
    root: PathBuf,
}

impl FsTransport {
    /// Opens (or creates) a store rooted at `root`.
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self, TransportError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| TransportError::io(format!("creating store root {}", root.display()), e))?;
        Ok(FsTransport { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Full path for an id.
    fn object_path(&self, id: &ObjectId) -> PathBuf {
        let name = filesystem_name(id);
        let aa = &name[0..2];
        let bb = &name[2..4];
        self.root
            .join("objects")
            .join(aa)
            .join(bb)
            .join(format!("{}.json", name))
    }

    async fn write_atomic(&self, path: &Path, json: &str) -> Result<(), TransportError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                TransportError::io(format!("creating shard directory {}", parent.display()), e)
            })?;
        }
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json.as_bytes())
            .await
            .map_err(|e| TransportError::io(format!("writing {}", tmp.display()), e))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| TransportError::io(format!("renaming into {}", path.display()), e))?;
        Ok(())
    }
}

/// Maps an id onto a filesystem-safe name of at least shard width.
///
/// Engine-produced ids are lowercase hex and pass through unchanged; foreign
/// ids get their path-hostile characters replaced and short ids padded so
/// the two shard levels always have something to slice.
fn filesystem_name(id: &ObjectId) -> String {
    let mut name: String = id
        .as_str()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    while name.len() < 4 {
        name.push('0');
    }
    name
}

#[async_trait]
impl Transport for FsTransport {
    fn name(&self) -> &str {
        "fs"
    }

    async fn has_object(&self, id: &ObjectId) -> Result<bool, TransportError> {
        let path = self.object_path(id);
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| TransportError::io(format!("checking {}", path.display()), e))
    }

    async fn get_object(&self, id: &ObjectId) -> Result<Option<String>, TransportError> {
        let path = self.object_path(id);
        match tokio::fs::read_to_string(&path).await {
            Ok(json) => Ok(Some(json)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(TransportError::io(format!("reading {}", path.display()), e)),
        }
    }

    async fn save_objects(
        &self,
        documents: &[ObjectDocument],
    ) -> Result<SaveReport, TransportError> {
        let mut report = SaveReport::default();
        for document in documents {
            let path = self.object_path(&document.id);

            // Same id means same content; skip the rewrite.
            match tokio::fs::try_exists(&path).await {
                Ok(true) => {
                    report.saved += 1;
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(id = %document.id, error = %e, "existence check failed, retrying as write");
                }
            }

            match self.write_atomic(&path, &document.json).await {
                Ok(()) => report.saved += 1,
                Err(e) => {
                    warn!(id = %document.id, error = %e, "failed to persist document");
                    report.failed.push(document.id.clone());
                }
            }
        }
        Ok(report)
    }
}
