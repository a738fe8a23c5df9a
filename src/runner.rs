//! Execution behind the `basekit` CLI commands.
//!
//! Each command struct from [`crate::args`] gets an `execute` method here:
//! `hash` works on a plain file and never touches a store, while `inspect`
//! and `copy` open [`FsTransport`] stores and run the regular
//! receive/send pipeline.

use std::io::Read;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tracing::warn;

use basekit_model::{Base, ClosureSummary, ObjectId, PropValue, ID_FIELD};
use basekit_registry::TypeRegistry;
use basekit_serializer::{canonical_of_map, hash_canonical, Deserializer, ReceiveMode, Serializer};
use basekit_transport::FsTransport;

use crate::args::{default_store, CopyCmd, HashCmd, InspectCmd};

// ==================== hash ====================

impl HashCmd {
    pub fn execute(&self, json_output: bool) -> Result<()> {
        let payload = if self.file.as_os_str() == "-" {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read stdin")?;
            buffer
        } else {
            std::fs::read_to_string(&self.file)
                .with_context(|| format!("Failed to read {}", self.file.display()))?
        };

        let token: serde_json::Value =
            serde_json::from_str(&payload).context("Document is not valid JSON")?;
        let mut body = match token {
            serde_json::Value::Object(map) => map,
            _ => bail!("Document is not a JSON object"),
        };

        // The id never participates in its own hash.
        let embedded = match body.remove(ID_FIELD) {
            Some(serde_json::Value::String(id)) => Some(id),
            Some(_) => bail!("Document id field is not a string"),
            None => None,
        };

        let id = hash_canonical(&canonical_of_map(&body));
        let matches = embedded.as_deref().map(|old| old == id.as_str());

        if json_output {
            #[derive(Serialize)]
            struct HashView {
                id: String,
                embedded_id: Option<String>,
                matches: Option<bool>,
            }

            let view = HashView {
                id: id.to_string(),
                embedded_id: embedded.clone(),
                matches,
            };
            println!("{}", serde_json::to_string_pretty(&view)?);
        } else {
            println!("{id}");
        }

        if self.verify {
            match matches {
                Some(true) => {}
                Some(false) => bail!(
                    "Embedded id {} does not match computed id {}",
                    embedded.unwrap_or_default(),
                    id
                ),
                None => bail!("Document has no embedded id to verify"),
            }
        }
        Ok(())
    }
}

// ==================== inspect ====================

impl InspectCmd {
    pub async fn execute(&self, json_output: bool) -> Result<()> {
        let store = self.store.clone().unwrap_or_else(default_store);
        let transport = Arc::new(
            FsTransport::new(&store)
                .await
                .with_context(|| format!("Failed to open store at {}", store.display()))?,
        );

        let registry = TypeRegistry::new();
        let id = ObjectId::from(self.id.as_str());
        let mode = if self.deep {
            ReceiveMode::Deep
        } else {
            ReceiveMode::Shallow
        };
        let received = Deserializer::new(&registry)
            .receive(&id, transport, mode)
            .await
            .with_context(|| format!("Failed to load {} from {}", self.id, store.display()))?;

        let root = received.root.read();
        let references = reference_rows(&root);

        if json_output {
            #[derive(Serialize)]
            struct PropertyView {
                name: String,
                value: String,
            }

            #[derive(Serialize)]
            struct ReferenceView {
                property: String,
                id: String,
                resolved: bool,
                closure_count: Option<u64>,
                closure_size: Option<u64>,
            }

            #[derive(Serialize)]
            struct IssueView {
                object_id: Option<String>,
                message: String,
            }

            #[derive(Serialize)]
            struct ObjectView {
                id: String,
                #[serde(rename = "type")]
                type_chain: String,
                property_count: usize,
                properties: Vec<PropertyView>,
                references: Vec<ReferenceView>,
                issues: Vec<IssueView>,
            }

            let view = ObjectView {
                id: self.id.clone(),
                type_chain: root.type_chain(),
                property_count: root.property_count(),
                properties: root
                    .properties()
                    .map(|(name, value)| PropertyView {
                        name: name.to_string(),
                        value: summarize(value),
                    })
                    .collect(),
                references: references
                    .iter()
                    .map(|row| ReferenceView {
                        property: row.property.clone(),
                        id: row.id.to_string(),
                        resolved: row.resolved,
                        closure_count: row.closure.as_ref().map(|c| c.count),
                        closure_size: row.closure.as_ref().map(|c| c.size),
                    })
                    .collect(),
                issues: received
                    .issues
                    .iter()
                    .map(|entry| IssueView {
                        object_id: entry.object_id.as_ref().map(|oid| oid.to_string()),
                        message: entry.issue.to_string(),
                    })
                    .collect(),
            };
            println!("{}", serde_json::to_string_pretty(&view)?);
        } else {
            println!("\x1b[1mObject:\x1b[0m {}", self.id);
            println!("\x1b[1mType:\x1b[0m {}", root.type_chain());
            println!("\x1b[1mProperties:\x1b[0m {}", root.property_count());
            for (name, value) in root.properties() {
                println!("  {:<24} {}", name, summarize(value));
            }
            if !references.is_empty() {
                println!("\x1b[1mReferences:\x1b[0m");
                for row in &references {
                    let state = if row.resolved { "resolved" } else { "unresolved" };
                    let closure = row
                        .closure
                        .as_ref()
                        .map(|c| format!(", closure {} docs / {} bytes", c.count, c.size))
                        .unwrap_or_default();
                    println!("  {:<24} {} ({state}{closure})", row.property, row.id);
                }
            }
            if !received.issues.is_empty() {
                println!("\x1b[33mIssues:\x1b[0m");
                for entry in &received.issues {
                    let location = entry
                        .object_id
                        .as_ref()
                        .map(|oid| oid.as_str().to_string())
                        .unwrap_or_else(|| "inline".to_string());
                    println!("  [{location}] {}", entry.issue);
                }
            }
        }
        Ok(())
    }
}

/// One reference found under a property of the inspected object.
struct ReferenceRow {
    property: String,
    id: ObjectId,
    resolved: bool,
    closure: Option<ClosureSummary>,
}

/// Collects references reachable through the object's own properties,
/// without crossing into other documents.
fn reference_rows(root: &Base) -> Vec<ReferenceRow> {
    let mut rows = Vec::new();
    for (name, value) in root.properties() {
        collect_references(name, value, &mut rows);
    }
    rows
}

fn collect_references(path: &str, value: &PropValue, rows: &mut Vec<ReferenceRow>) {
    match value {
        PropValue::Reference(reference) => rows.push(ReferenceRow {
            property: path.to_string(),
            id: reference.id.clone(),
            resolved: reference.target.is_some(),
            closure: reference.closure,
        }),
        PropValue::List(items) => {
            for (index, item) in items.iter().enumerate() {
                collect_references(&format!("{path}[{index}]"), item, rows);
            }
        }
        PropValue::Map(entries) => {
            for (key, item) in entries {
                collect_references(&format!("{path}.{key}"), item, rows);
            }
        }
        _ => {}
    }
}

/// Short single-line rendering of a property value.
fn summarize(value: &PropValue) -> String {
    match value {
        PropValue::Null => "null".to_string(),
        PropValue::Bool(flag) => flag.to_string(),
        PropValue::Number(number) => number.to_string(),
        PropValue::Text(text) => {
            if text.chars().count() > 40 {
                let clipped: String = text.chars().take(40).collect();
                format!("{clipped:?}...")
            } else {
                format!("{text:?}")
            }
        }
        PropValue::List(items) => format!("list({})", items.len()),
        PropValue::Map(entries) => format!("map({})", entries.len()),
        PropValue::Object(handle) => format!("object {}", handle.read().type_name()),
        PropValue::Reference(reference) => {
            if reference.target.is_some() {
                format!("ref {} (resolved)", reference.id)
            } else {
                format!("ref {} (unresolved)", reference.id)
            }
        }
    }
}

// ==================== copy ====================

impl CopyCmd {
    pub async fn execute(&self, json_output: bool) -> Result<()> {
        let source = Arc::new(FsTransport::new(&self.from).await.with_context(|| {
            format!("Failed to open source store at {}", self.from.display())
        })?);
        let destination = Arc::new(FsTransport::new(&self.to).await.with_context(|| {
            format!("Failed to open destination store at {}", self.to.display())
        })?);

        let registry = TypeRegistry::new();
        let id = ObjectId::from(self.id.as_str());
        let mode = if self.shallow {
            ReceiveMode::Shallow
        } else {
            ReceiveMode::Deep
        };

        let received = Deserializer::new(&registry)
            .receive(&id, source, mode)
            .await
            .with_context(|| format!("Failed to load {} from {}", self.id, self.from.display()))?;
        if !received.is_clean() {
            warn!(
                issues = received.issues.len(),
                "copying a graph with unresolved content"
            );
        }

        let receipt = Serializer::new(&registry)
            .send(&received.root, destination)
            .await
            .context("Failed to store the copied graph")?;
        if receipt.root_id != id {
            warn!(
                requested = %id,
                stored = %receipt.root_id,
                "computed root id differs from the requested id"
            );
        }

        if json_output {
            #[derive(Serialize)]
            struct CopyView {
                root_id: String,
                total: usize,
                sent: usize,
                skipped: usize,
                failed: Vec<String>,
                issues: usize,
            }

            let view = CopyView {
                root_id: receipt.root_id.to_string(),
                total: receipt.total,
                sent: receipt.sent,
                skipped: receipt.skipped,
                failed: receipt.failed.iter().map(|oid| oid.to_string()).collect(),
                issues: received.issues.len(),
            };
            println!("{}", serde_json::to_string_pretty(&view)?);
        } else {
            println!(
                "\x1b[1mCopied:\x1b[0m {} -> {}",
                self.from.display(),
                self.to.display()
            );
            println!("\x1b[1mRoot:\x1b[0m {}", receipt.root_id);
            println!(
                "\x1b[1mDocuments:\x1b[0m {} total, {} sent, {} skipped",
                receipt.total, receipt.sent, receipt.skipped
            );
            if !received.issues.is_empty() {
                println!(
                    "\x1b[33m{} diagnostics carried over unchanged\x1b[0m",
                    received.issues.len()
                );
            }
        }

        if !receipt.is_complete() {
            bail!("{} documents failed to save", receipt.failed.len());
        }
        Ok(())
    }
}
