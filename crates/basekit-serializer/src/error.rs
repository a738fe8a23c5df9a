//! Fatal serializer errors.
//!
//! Anything recoverable (unknown types, shape mismatches, missing
//! sub-graphs) is reported as a [`DecodeIssue`](basekit_model::DecodeIssue)
//! on the decoded objects instead. These enums cover the cases where no
//! useful result exists.

use std::fmt;

use basekit_model::ObjectId;
use basekit_transport::TransportError;

/// Why an encode (or send) produced nothing.
#[derive(Debug)]
pub enum EncodeError {
    /// The in-memory graph references itself. `path` is the chain of type
    /// names from the root down to the repeated object.
    CycleDetected { path: Vec<String> },
    /// A registered abstract codec rejected a value it owns.
    Abstract {
        property: String,
        source: anyhow::Error,
    },
    /// The cancel token fired.
    Canceled,
    /// The transport failed while probing or saving.
    Transport(TransportError),
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeError::CycleDetected { path } => {
                write!(f, "reference cycle through {}", path.join(" -> "))
            }
            EncodeError::Abstract { property, source } => {
                write!(f, "abstract codec failed on property '{}': {}", property, source)
            }
            EncodeError::Canceled => write!(f, "encode canceled"),
            EncodeError::Transport(e) => write!(f, "transport failed during send: {}", e),
        }
    }
}

impl std::error::Error for EncodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EncodeError::Transport(e) => Some(e),
            EncodeError::Abstract { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<TransportError> for EncodeError {
    fn from(e: TransportError) -> Self {
        EncodeError::Transport(e)
    }
}

/// Why a decode (or receive) produced nothing.
#[derive(Debug)]
pub enum DecodeError {
    /// The payload is not a JSON object with a string type chain.
    Malformed {
        id: Option<ObjectId>,
        detail: String,
    },
    /// The requested root id is not present on the transport.
    MissingRoot { id: ObjectId },
    /// Stored documents reference each other in a loop.
    CycleDetected { id: ObjectId },
    /// The cancel token fired.
    Canceled,
    /// The transport failed while fetching the root document.
    Transport(TransportError),
}

impl DecodeError {
    pub fn malformed(id: Option<ObjectId>, detail: impl Into<String>) -> Self {
        DecodeError::Malformed {
            id,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Malformed { id: Some(id), detail } => {
                write!(f, "malformed document {}: {}", id, detail)
            }
            DecodeError::Malformed { id: None, detail } => {
                write!(f, "malformed document: {}", detail)
            }
            DecodeError::MissingRoot { id } => {
                write!(f, "root object {} not found on transport", id)
            }
            DecodeError::CycleDetected { id } => {
                write!(f, "stored reference cycle through {}", id)
            }
            DecodeError::Canceled => write!(f, "decode canceled"),
            DecodeError::Transport(e) => write!(f, "transport failed during receive: {}", e),
        }
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DecodeError::Transport(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TransportError> for DecodeError {
    fn from(e: TransportError) -> Self {
        DecodeError::Transport(e)
    }
}
