//! Basekit
//!
//! Content-addressed serialization for dynamic object graphs:
//!
//! - **Model**: schemaless [`Base`] objects with typed property routing
//! - **Registry**: runtime type descriptors and abstract-type codecs
//! - **Serializer**: canonical JSON encoding, decomposition, and transfer
//! - **Transport**: pluggable object stores (in-memory, local filesystem)
//!
//! The member crates are re-exported here, so most callers depend on this
//! crate alone. See [`Serializer`] and [`Deserializer`] for the main entry
//! points, and [`args`] for the `basekit` command-line surface.

pub mod args;
pub mod runner;

pub use basekit_model::{
    parse_prop_name, Base, BaseHandle, ClosureSummary, DecodeIssue, IssueKind, ObjectDocument,
    ObjectId, ObjectReference, PropName, PropValue, PropertyError,
};
pub use basekit_registry::{
    AbstractCodec, AbstractTypeRegistry, PropertySpec, Shape, TypeDescriptor, TypeRegistry,
    TypeResolution,
};
pub use basekit_serializer::{
    canonical_of_map, collect_issues, hash_canonical, to_canonical_json, CancelToken, DecodeError,
    Deserializer, EncodeError, EncodedGraph, ObjectIssue, ReceiveMode, ReceivedGraph, SendReceipt,
    SerializeOptions, Serializer,
};
pub use basekit_transport::{FsTransport, MemoryTransport, SaveReport, Transport, TransportError};
