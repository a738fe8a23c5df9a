//! Canonical JSON form and content-derived ids.
//!
//! The canonical form is what gets hashed, so it must be byte-identical for
//! equal content no matter who produces it: object keys are emitted in
//! lexicographic order by the writer itself (never trusting the map's
//! iteration order), numbers keep their `serde_json::Number` display form,
//! and string escaping is fixed here rather than delegated. A document
//! decoded on one machine and re-encoded on another reproduces the same
//! bytes, and therefore the same id.

use std::fmt::Write as _;

use basekit_model::ObjectId;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Hex characters kept from the sha256 digest.
pub const ID_LENGTH: usize = 32;

/// Serializes a token tree to its canonical byte form.
pub fn to_canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

/// Canonical form of an object body, keys sorted.
pub fn canonical_of_map(map: &Map<String, Value>) -> String {
    let mut out = String::new();
    write_map(&mut out, map);
    out
}

/// Derives the content id for a canonical body.
pub fn hash_canonical(canonical: &str) -> ObjectId {
    let digest = Sha256::digest(canonical.as_bytes());
    let hex = hex::encode(digest);
    ObjectId::new(&hex[..ID_LENGTH])
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => write_escaped(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => write_map(out, map),
    }
}

fn write_map(out: &mut String, map: &Map<String, Value>) {
    let mut entries: Vec<(&String, &Value)> = map.iter().collect();
    entries.sort_unstable_by(|a, b| a.0.cmp(b.0));

    out.push('{');
    for (i, (key, value)) in entries.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        write_escaped(out, key);
        out.push(':');
        write_value(out, value);
    }
    out.push('}');
}

fn write_escaped(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                // Writing into a String cannot fail.
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keys_are_sorted_regardless_of_insertion_order() {
        let mut map = Map::new();
        map.insert("zebra".to_string(), json!(1));
        map.insert("apple".to_string(), json!(2));
        map.insert("mango".to_string(), json!(3));
        assert_eq!(
            canonical_of_map(&map),
            r#"{"apple":2,"mango":3,"zebra":1}"#
        );
    }

    #[test]
    fn nested_objects_sort_too() {
        let value = json!({
            "b": { "y": 1, "x": 2 },
            "a": [ { "q": 1, "p": 2 } ]
        });
        assert_eq!(
            to_canonical_json(&value),
            r#"{"a":[{"p":2,"q":1}],"b":{"x":2,"y":1}}"#
        );
    }

    #[test]
    fn number_forms_are_distinct() {
        assert_eq!(to_canonical_json(&json!(1)), "1");
        assert_eq!(to_canonical_json(&json!(1.0)), "1.0");
        assert_eq!(to_canonical_json(&json!(-0.5)), "-0.5");
        assert_eq!(to_canonical_json(&json!(u64::MAX)), "18446744073709551615");
    }

    #[test]
    fn strings_escape_controls_and_quotes() {
        assert_eq!(
            to_canonical_json(&json!("a\"b\\c\nd\te\u{01}f")),
            r#""a\"b\\c\nd\te\u0001f""#
        );
        // Non-ASCII passes through unescaped.
        assert_eq!(to_canonical_json(&json!("日本")), "\"日本\"");
    }

    #[test]
    fn ids_are_stable_and_content_sensitive() {
        let a = hash_canonical(r#"{"x":1}"#);
        let b = hash_canonical(r#"{"x":1}"#);
        let c = hash_canonical(r#"{"x":2}"#);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_str().len(), ID_LENGTH);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }
}
