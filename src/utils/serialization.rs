// Canonical JSON used for every hash preimage. Object keys are emitted in
// lexicographic order regardless of how serde_json's map is configured.
use crate::error::Result;
use serde::Serialize;
use serde_json::{Map, Value};

/// Recursively rebuild a JSON value with sorted object keys
pub fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = Map::new();
            for (key, inner) in entries {
                sorted.insert(key, canonicalize(inner));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// Serialize an already-canonical value to its compact string form
pub fn canonical_string(value: &Value) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

/// Serialize any value to canonical JSON
pub fn to_canonical_json<T: Serialize>(data: &T) -> Result<String> {
    let value = canonicalize(serde_json::to_value(data)?);
    canonical_string(&value)
}
