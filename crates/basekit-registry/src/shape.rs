//! Declared property shapes.

use basekit_model::PropValue;

/// Expected shape of a declared property.
///
/// Shapes gate nothing: a mismatch is recorded as an issue and the decoded
/// value is kept, so no data is lost to a stale descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape {
    /// Anything goes.
    Any,
    Bool,
    Number,
    Text,
    /// Homogeneous list of the inner shape.
    List(Box<Shape>),
    /// Homogeneous list of exactly the given length.
    Array(Box<Shape>, usize),
    /// String-keyed map of the inner shape.
    Map(Box<Shape>),
    /// A nested object, inline or referenced.
    Object,
    /// An opaque host value handled by the abstract type registry under
    /// this qualified name.
    Abstract(String),
}

impl Shape {
    pub fn list(inner: Shape) -> Self {
        Shape::List(Box::new(inner))
    }

    pub fn array(inner: Shape, len: usize) -> Self {
        Shape::Array(Box::new(inner), len)
    }

    pub fn map(inner: Shape) -> Self {
        Shape::Map(Box::new(inner))
    }

    pub fn abstract_type(qualified_name: impl Into<String>) -> Self {
        Shape::Abstract(qualified_name.into())
    }

    /// Whether `value` satisfies this shape. `Null` satisfies every shape;
    /// properties are nullable by default.
    pub fn matches(&self, value: &PropValue) -> bool {
        if value.is_null() {
            return true;
        }
        match self {
            Shape::Any => true,
            Shape::Bool => matches!(value, PropValue::Bool(_)),
            Shape::Number => matches!(value, PropValue::Number(_)),
            Shape::Text => matches!(value, PropValue::Text(_)),
            Shape::List(inner) => match value {
                PropValue::List(items) => items.iter().all(|item| inner.matches(item)),
                _ => false,
            },
            Shape::Array(inner, len) => match value {
                PropValue::List(items) => {
                    items.len() == *len && items.iter().all(|item| inner.matches(item))
                }
                _ => false,
            },
            Shape::Map(inner) => match value {
                PropValue::Map(entries) => entries.values().all(|entry| inner.matches(entry)),
                _ => false,
            },
            Shape::Object => {
                matches!(value, PropValue::Object(_) | PropValue::Reference(_))
            }
            // Validity of abstract values is the codec's business.
            Shape::Abstract(_) => true,
        }
    }

    /// Human-readable form for mismatch reports.
    pub fn describe(&self) -> String {
        match self {
            Shape::Any => "any".to_string(),
            Shape::Bool => "bool".to_string(),
            Shape::Number => "number".to_string(),
            Shape::Text => "text".to_string(),
            Shape::List(inner) => format!("list of {}", inner.describe()),
            Shape::Array(inner, len) => format!("array of {} {}", len, inner.describe()),
            Shape::Map(inner) => format!("map of {}", inner.describe()),
            Shape::Object => "object".to_string(),
            Shape::Abstract(name) => format!("abstract {}", name),
        }
    }
}
