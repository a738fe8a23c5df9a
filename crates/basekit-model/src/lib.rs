//! Dynamic object model for the basekit workspace.
//!
//! This crate provides the foundational types shared by every other basekit
//! crate, with no opinion about how objects are encoded or moved:
//! - [`Base`]: a schemaless object with a type-chain discriminator and
//!   declared/dynamic property maps
//! - [`BaseHandle`]: a shared, lockable handle so one object can appear in
//!   several places of a graph
//! - [`PropValue`]: the value tree a property can hold
//! - [`ObjectReference`] / [`ObjectDocument`]: pointers to and payloads of
//!   content-addressed objects
//! - detach-marker parsing for `@`-prefixed dynamic property names
//! - [`DecodeIssue`]: non-fatal diagnostics attached to decoded objects

pub mod base;
pub mod detach;
pub mod error;
pub mod issue;
pub mod reference;
pub mod value;

pub use base::{Base, BaseHandle};
pub use detach::{parse_prop_name, PropName};
pub use error::PropertyError;
pub use issue::{DecodeIssue, IssueKind};
pub use reference::{ClosureSummary, ObjectDocument, ObjectId, ObjectReference};
pub use value::PropValue;

// ==================== Wire constants ====================

/// Property carrying the colon-separated type chain, most-derived first.
pub const TYPE_FIELD: &str = "speckle_type";

/// Property carrying the content-derived id of an addressable document.
pub const ID_FIELD: &str = "id";

/// Property that marks a token as a reference to a detached object.
pub const REFERENCE_ID_FIELD: &str = "referencedId";

/// Type-chain value used on reference tokens.
pub const REFERENCE_TYPE: &str = "reference";

/// Property carrying `{ size, count }` totals for a reference target's
/// transitive closure.
pub const CLOSURE_FIELD: &str = "__closure";

/// Type chain of the generic fallback object.
pub const GENERIC_TYPE: &str = "Base";

/// Type chain of the chunk documents produced for oversized collections.
pub const CHUNK_TYPE: &str = "Core.DataChunk";

/// Declared property holding a chunk document's slice of elements.
pub const CHUNK_DATA_PROP: &str = "data";

/// Reserved property names that never route through the property maps.
pub const RESERVED_FIELDS: [&str; 3] = [TYPE_FIELD, ID_FIELD, CLOSURE_FIELD];

/// True when `name` is one of the wire-level fields owned by the engine.
pub fn is_reserved_field(name: &str) -> bool {
    RESERVED_FIELDS.contains(&name)
}
