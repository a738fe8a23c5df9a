//! Codecs for opaque host values.
//!
//! Some declared properties hold values the engine cannot interpret: handles
//! into a host application, platform-specific payloads, foreign encodings.
//! A [`Shape::Abstract`](crate::Shape::Abstract) property names such a type
//! by its qualified name, and this registry maps that name to a paired
//! decode/encode closure.
//!
//! A missing codec is not fatal in either direction. The serializer falls
//! back to generic token handling and, on decode, records an
//! `UnresolvedAbstractType` issue on the owning object, so the raw value
//! survives a pass through a consumer that does not know the type.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use basekit_model::PropValue;
use parking_lot::RwLock;
use serde_json::Value;

type DecodeFn = dyn Fn(&Value) -> Result<PropValue> + Send + Sync;
type EncodeFn = dyn Fn(&PropValue) -> Result<Value> + Send + Sync;

/// Paired decode/encode closures for one qualified type name.
#[derive(Clone)]
pub struct AbstractCodec {
    decode: Arc<DecodeFn>,
    encode: Arc<EncodeFn>,
}

impl AbstractCodec {
    pub fn new<D, E>(decode: D, encode: E) -> Self
    where
        D: Fn(&Value) -> Result<PropValue> + Send + Sync + 'static,
        E: Fn(&PropValue) -> Result<Value> + Send + Sync + 'static,
    {
        AbstractCodec {
            decode: Arc::new(decode),
            encode: Arc::new(encode),
        }
    }

    /// Raw wire token -> native value.
    pub fn decode(&self, token: &Value) -> Result<PropValue> {
        (self.decode)(token)
    }

    /// Native value -> raw wire token.
    pub fn encode(&self, value: &PropValue) -> Result<Value> {
        (self.encode)(value)
    }
}

impl std::fmt::Debug for AbstractCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AbstractCodec")
    }
}

/// Qualified name -> codec table.
#[derive(Debug, Default)]
pub struct AbstractTypeRegistry {
    codecs: RwLock<HashMap<String, AbstractCodec>>,
}

impl AbstractTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the codec for a qualified name.
    pub fn register(&self, qualified_name: impl Into<String>, codec: AbstractCodec) {
        self.codecs.write().insert(qualified_name.into(), codec);
    }

    /// Looks up the codec for a qualified name.
    pub fn codec(&self, qualified_name: &str) -> Option<AbstractCodec> {
        self.codecs.read().get(qualified_name).cloned()
    }

    pub fn contains(&self, qualified_name: &str) -> bool {
        self.codecs.read().contains_key(qualified_name)
    }

    pub fn len(&self) -> usize {
        self.codecs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.codecs.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use serde_json::json;

    /// A codec that stores a pair of numbers as "x,y" text on the wire.
    fn point_codec() -> AbstractCodec {
        AbstractCodec::new(
            |token| {
                let text = token
                    .as_str()
                    .ok_or_else(|| anyhow!("expected a string token"))?;
                let (x, y) = text
                    .split_once(',')
                    .ok_or_else(|| anyhow!("expected 'x,y'"))?;
                Ok(PropValue::List(vec![
                    x.trim().parse::<f64>()?.into(),
                    y.trim().parse::<f64>()?.into(),
                ]))
            },
            |value| {
                let items = value
                    .as_list()
                    .ok_or_else(|| anyhow!("expected a list value"))?;
                match items {
                    [a, b] => Ok(json!(format!(
                        "{},{}",
                        a.as_f64().unwrap_or(0.0),
                        b.as_f64().unwrap_or(0.0)
                    ))),
                    _ => Err(anyhow!("expected two elements")),
                }
            },
        )
    }

    #[test]
    fn registered_codecs_round_trip() {
        let registry = AbstractTypeRegistry::new();
        registry.register("Host.Point2d", point_codec());

        let codec = registry.codec("Host.Point2d").expect("codec");
        let native = codec.decode(&json!("1.5,2")).expect("decode");
        assert_eq!(
            native,
            PropValue::List(vec![1.5f64.into(), 2.0f64.into()])
        );

        let token = codec.encode(&native).expect("encode");
        assert_eq!(token, json!("1.5,2"));
    }

    #[test]
    fn missing_codec_is_a_lookup_miss() {
        let registry = AbstractTypeRegistry::new();
        assert!(registry.codec("Host.Unknown").is_none());
        assert!(!registry.contains("Host.Unknown"));
    }

    #[test]
    fn codec_errors_propagate() {
        let codec = point_codec();
        assert!(codec.decode(&json!(42)).is_err());
        assert!(codec.encode(&PropValue::Null).is_err());
    }
}
