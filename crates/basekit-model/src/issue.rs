//! Non-fatal decode diagnostics.
//!
//! Decoding is deliberately forgiving: an unknown type, a property that does
//! not match its declared shape, or a reference that could not be fetched
//! all produce a usable object plus a [`DecodeIssue`] attached to it. Only
//! structural problems (unparseable document, missing root) abort a decode.

use std::fmt;

use crate::reference::ObjectId;

/// What went wrong, with enough data to act on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueKind {
    /// No chain segment matched a registered type; the object was decoded
    /// through the generic fallback.
    UnknownType { chain: String },
    /// A declared property's value did not match the descriptor's shape.
    /// The value is kept as decoded.
    ShapeMismatch { expected: String, found: String },
    /// A declared abstract property named a qualified type with no
    /// registered codec; the raw value was decoded generically.
    UnresolvedAbstractType { qualified_name: String },
    /// A referenced document could not be fetched; the reference stays
    /// unresolved.
    UnresolvedReference { id: ObjectId },
}

/// A diagnostic attached to the object whose decode produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeIssue {
    pub kind: IssueKind,
    /// Owning property, when the issue concerns one.
    pub property: Option<String>,
}

impl DecodeIssue {
    pub fn new(kind: IssueKind) -> Self {
        DecodeIssue {
            kind,
            property: None,
        }
    }

    pub fn on_property(kind: IssueKind, property: impl Into<String>) -> Self {
        DecodeIssue {
            kind,
            property: Some(property.into()),
        }
    }
}

impl fmt::Display for DecodeIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            IssueKind::UnknownType { chain } => {
                write!(f, "unknown type chain '{}', decoded as generic object", chain)?;
            }
            IssueKind::ShapeMismatch { expected, found } => {
                write!(f, "expected {} but found {}", expected, found)?;
            }
            IssueKind::UnresolvedAbstractType { qualified_name } => {
                write!(f, "no codec registered for abstract type '{}'", qualified_name)?;
            }
            IssueKind::UnresolvedReference { id } => {
                write!(f, "referenced object {} could not be fetched", id)?;
            }
        }
        if let Some(property) = &self.property {
            write!(f, " (property '{}')", property)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_property_context() {
        let issue = DecodeIssue::on_property(
            IssueKind::ShapeMismatch {
                expected: "number".to_string(),
                found: "text".to_string(),
            },
            "height",
        );
        assert_eq!(
            issue.to_string(),
            "expected number but found text (property 'height')"
        );

        let bare = DecodeIssue::new(IssueKind::UnresolvedReference {
            id: ObjectId::from("deadbeef"),
        });
        assert_eq!(
            bare.to_string(),
            "referenced object deadbeef could not be fetched"
        );
    }
}
