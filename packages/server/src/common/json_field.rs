//! Lenient JSON text columns.
//!
//! Structured findings are stored as serialized text and decoded on read.
//! Decoding never fails: a NULL, empty, or malformed column reads as an empty
//! mapping or sequence.

use serde_json::{Map, Value};

/// Decodes a JSON object column, falling back to an empty mapping.
pub fn object_or_empty(raw: Option<&str>) -> Map<String, Value> {
    match raw.map(serde_json::from_str::<Value>) {
        Some(Ok(Value::Object(map))) => map,
        _ => Map::new(),
    }
}

/// Decodes a JSON array column, falling back to an empty sequence.
pub fn array_or_empty(raw: Option<&str>) -> Vec<Value> {
    match raw.map(serde_json::from_str::<Value>) {
        Some(Ok(Value::Array(items))) => items,
        _ => Vec::new(),
    }
}

/// Encodes a value for storage. Empty objects, empty arrays and null store as NULL.
pub fn encode(value: &Value) -> Option<String> {
    let empty = match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    };
    if empty {
        None
    } else {
        Some(value.to_string())
    }
}
