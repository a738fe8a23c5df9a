//! Errors raised by invalid property writes on [`Base`](crate::Base).

use std::fmt;

/// Rejected property-map mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyError {
    /// A dynamic write used a name that belongs to a declared property.
    DeclaredCollision { name: String },
    /// A declared write used a name already taken by a dynamic property.
    DynamicCollision { name: String },
    /// The name is owned by the wire format and cannot hold user data.
    ReservedName { name: String },
}

impl fmt::Display for PropertyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyError::DeclaredCollision { name } => {
                write!(f, "property '{}' is declared and cannot be set dynamically", name)
            }
            PropertyError::DynamicCollision { name } => {
                write!(f, "property '{}' is already set dynamically", name)
            }
            PropertyError::ReservedName { name } => {
                write!(f, "property name '{}' is reserved by the wire format", name)
            }
        }
    }
}

impl std::error::Error for PropertyError {}
