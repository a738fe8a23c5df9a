//! Value codec: native property values <-> JSON tokens.
//!
//! The token model is plain JSON plus two structural conventions:
//! - an object with a string `referencedId` is a reference token
//! - an object with a `speckle_type` is a nested object
//! - any other object is an ordinary string-keyed map
//!
//! Graph-level concerns (detaching, chunking, cycle checks) live in the
//! encode/decode walks; this module only translates values, calling back
//! into the walk for nested objects and references.

use std::collections::BTreeMap;

use basekit_model::{
    ClosureSummary, ObjectId, PropValue, CLOSURE_FIELD, REFERENCE_ID_FIELD, REFERENCE_TYPE,
    TYPE_FIELD,
};
use serde_json::{Map, Number, Value};

use crate::decode::DecodeWalk;
use crate::encode::EncodeWalk;
use crate::error::{DecodeError, EncodeError};

// ==================== Encode: native -> token ====================

pub(crate) fn encode_value(
    walk: &mut EncodeWalk<'_>,
    value: &PropValue,
) -> Result<Value, EncodeError> {
    match value {
        PropValue::Null => Ok(Value::Null),
        PropValue::Bool(b) => Ok(Value::Bool(*b)),
        PropValue::Number(n) => Ok(Value::Number(n.clone())),
        PropValue::Text(s) => Ok(Value::String(s.clone())),
        PropValue::List(items) => {
            let mut tokens = Vec::with_capacity(items.len());
            for item in items {
                tokens.push(encode_value(walk, item)?);
            }
            Ok(Value::Array(tokens))
        }
        PropValue::Map(entries) => {
            let mut map = Map::new();
            for (key, entry) in entries {
                map.insert(key.clone(), encode_value(walk, entry)?);
            }
            Ok(Value::Object(map))
        }
        // Objects reached through a plain value position embed inline;
        // detachment is decided per property, before the codec is reached.
        PropValue::Object(handle) => walk.inline_object(handle),
        PropValue::Reference(reference) => walk.encode_reference(reference),
    }
}

/// Builds a reference token from an id and optional closure totals.
pub(crate) fn reference_token(id: &ObjectId, closure: Option<ClosureSummary>) -> Value {
    let mut map = Map::new();
    map.insert(
        TYPE_FIELD.to_string(),
        Value::String(REFERENCE_TYPE.to_string()),
    );
    map.insert(
        REFERENCE_ID_FIELD.to_string(),
        Value::String(id.to_string()),
    );
    if let Some(closure) = closure {
        let mut totals = Map::new();
        totals.insert("size".to_string(), Value::Number(Number::from(closure.size)));
        totals.insert(
            "count".to_string(),
            Value::Number(Number::from(closure.count)),
        );
        map.insert(CLOSURE_FIELD.to_string(), Value::Object(totals));
    }
    Value::Object(map)
}

// ==================== Decode: token -> native ====================

pub(crate) fn decode_value(
    walk: &mut DecodeWalk<'_>,
    token: &Value,
) -> Result<PropValue, DecodeError> {
    match token {
        Value::Null => Ok(PropValue::Null),
        Value::Bool(b) => Ok(PropValue::Bool(*b)),
        Value::Number(n) => Ok(PropValue::Number(n.clone())),
        Value::String(s) => Ok(PropValue::Text(s.clone())),
        Value::Array(items) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                values.push(decode_value(walk, item)?);
            }
            Ok(PropValue::List(values))
        }
        Value::Object(map) => {
            if let Some(id) = map.get(REFERENCE_ID_FIELD).and_then(Value::as_str) {
                walk.resolve_reference(id, parse_closure(map))
            } else if map.contains_key(TYPE_FIELD) {
                Ok(PropValue::Object(walk.decode_nested(map)?))
            } else {
                let mut entries = BTreeMap::new();
                for (key, entry) in map {
                    entries.insert(key.clone(), decode_value(walk, entry)?);
                }
                Ok(PropValue::Map(entries))
            }
        }
    }
}

/// Reads `__closure` totals off a reference token, if well-formed.
pub(crate) fn parse_closure(map: &Map<String, Value>) -> Option<ClosureSummary> {
    let totals = map.get(CLOSURE_FIELD)?.as_object()?;
    Some(ClosureSummary {
        size: totals.get("size")?.as_u64()?,
        count: totals.get("count")?.as_u64()?,
    })
}
