//! Property value tree.
//!
//! [`PropValue`] is the closed set of shapes a property can hold. It is a
//! superset of the JSON data model: on top of the scalar/list/map variants it
//! carries [`Object`](PropValue::Object) for nested in-memory objects and
//! [`Reference`](PropValue::Reference) for pointers to detached documents.
//!
//! Numbers keep their `serde_json::Number` representation so integer and
//! floating wire forms survive a decode/encode round trip unchanged.

use std::collections::BTreeMap;

use serde_json::Number;

use crate::base::BaseHandle;
use crate::reference::ObjectReference;

/// A single property value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PropValue {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    Text(String),
    List(Vec<PropValue>),
    Map(BTreeMap<String, PropValue>),
    /// A nested object held in memory.
    Object(BaseHandle),
    /// A pointer to a detached object, resolved or not.
    Reference(ObjectReference),
}

impl PropValue {
    /// Short name of the variant, for diagnostics and mismatch reports.
    pub fn kind(&self) -> &'static str {
        match self {
            PropValue::Null => "null",
            PropValue::Bool(_) => "bool",
            PropValue::Number(_) => "number",
            PropValue::Text(_) => "text",
            PropValue::List(_) => "list",
            PropValue::Map(_) => "map",
            PropValue::Object(_) => "object",
            PropValue::Reference(_) => "reference",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, PropValue::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PropValue::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            PropValue::Number(n) => n.as_u64(),
            _ => None,
        }
    }

    /// Numeric value as f64, covering both integer and floating forms.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropValue::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[PropValue]> {
        match self {
            PropValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_list_mut(&mut self) -> Option<&mut Vec<PropValue>> {
        match self {
            PropValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, PropValue>> {
        match self {
            PropValue::Map(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&BaseHandle> {
        match self {
            PropValue::Object(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<&ObjectReference> {
        match self {
            PropValue::Reference(reference) => Some(reference),
            _ => None,
        }
    }
}

impl From<bool> for PropValue {
    fn from(b: bool) -> Self {
        PropValue::Bool(b)
    }
}

impl From<i32> for PropValue {
    fn from(n: i32) -> Self {
        PropValue::Number(Number::from(n))
    }
}

impl From<i64> for PropValue {
    fn from(n: i64) -> Self {
        PropValue::Number(Number::from(n))
    }
}

impl From<u64> for PropValue {
    fn from(n: u64) -> Self {
        PropValue::Number(Number::from(n))
    }
}

impl From<usize> for PropValue {
    fn from(n: usize) -> Self {
        PropValue::Number(Number::from(n as u64))
    }
}

impl From<f64> for PropValue {
    /// Non-finite floats have no JSON representation and collapse to `Null`.
    fn from(n: f64) -> Self {
        match Number::from_f64(n) {
            Some(n) => PropValue::Number(n),
            None => PropValue::Null,
        }
    }
}

impl From<&str> for PropValue {
    fn from(s: &str) -> Self {
        PropValue::Text(s.to_string())
    }
}

impl From<String> for PropValue {
    fn from(s: String) -> Self {
        PropValue::Text(s)
    }
}

impl From<Vec<PropValue>> for PropValue {
    fn from(items: Vec<PropValue>) -> Self {
        PropValue::List(items)
    }
}

impl From<BTreeMap<String, PropValue>> for PropValue {
    fn from(entries: BTreeMap<String, PropValue>) -> Self {
        PropValue::Map(entries)
    }
}

impl From<BaseHandle> for PropValue {
    fn from(handle: BaseHandle) -> Self {
        PropValue::Object(handle)
    }
}

impl From<crate::base::Base> for PropValue {
    fn from(base: crate::base::Base) -> Self {
        PropValue::Object(BaseHandle::new(base))
    }
}

impl From<ObjectReference> for PropValue {
    fn from(reference: ObjectReference) -> Self {
        PropValue::Reference(reference)
    }
}

impl<T: Into<PropValue>> From<Option<T>> for PropValue {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => PropValue::Null,
        }
    }
}

impl FromIterator<PropValue> for PropValue {
    fn from_iter<I: IntoIterator<Item = PropValue>>(iter: I) -> Self {
        PropValue::List(iter.into_iter().collect())
    }
}
