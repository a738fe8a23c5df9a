//! Object-graph serialization over content-addressed documents.
//!
//! An object graph rooted in a [`basekit_model::BaseHandle`] encodes into a
//! set of canonical JSON documents, one per detached object, each addressed
//! by the truncated SHA-256 of its own body. Equal subtrees collapse into a
//! single document; long lists split into bounded chunk documents; parents
//! point at children through reference tokens carrying closure totals.
//! Decoding reverses all of it, resolving references out of a fetched store
//! and downgrading whatever cannot be resolved to diagnostics instead of
//! failures.
//!
//! Encode and decode are synchronous. The async [`transfer`] layer moves
//! graphs through a [`basekit_transport::Transport`] with deduplicating
//! probes, bounded fan-out, and cooperative cancellation.
//!
//! ```
//! use basekit_model::{Base, BaseHandle, PropValue};
//! use basekit_registry::TypeRegistry;
//! use basekit_serializer::{Deserializer, Serializer};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = TypeRegistry::new();
//!
//! let mut mesh = Base::new("Mesh");
//! mesh.set_dynamic(
//!     "@(2)verts",
//!     PropValue::List((0..3i64).map(PropValue::from).collect()),
//! )?;
//! let root = BaseHandle::new(mesh);
//!
//! // Two chunk documents plus the root.
//! let graph = Serializer::new(&registry).encode(&root)?;
//! assert_eq!(graph.document_count(), 3);
//!
//! let root_json = &graph.root_document().expect("root document").json;
//! let decoded = Deserializer::new(&registry).decode_document(root_json)?;
//! assert_eq!(decoded.read().type_chain(), "Mesh");
//! # Ok(())
//! # }
//! ```

pub mod cancel;
pub mod canonical;
mod codec;
pub mod decode;
pub mod encode;
pub mod error;
pub mod options;
pub mod transfer;

pub use cancel::CancelToken;
pub use canonical::{canonical_of_map, hash_canonical, to_canonical_json, ID_LENGTH};
pub use decode::{collect_issues, Deserializer, ObjectIssue};
pub use encode::{EncodedGraph, Serializer};
pub use error::{DecodeError, EncodeError};
pub use options::{ReceiveMode, SerializeOptions};
pub use transfer::{ReceivedGraph, SendReceipt};
