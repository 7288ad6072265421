//! String encodings used in the backing store
//!
//! - Record metadata is stored as compact JSON.
//! - Queue items are stored as canonical JSON: object keys sorted at every
//!   nesting level, so structurally equal values always encode to the same
//!   bytes and exact-match list removal works regardless of field order.

use serde_json::Value;

use crate::error::{StoreError, StoreResult};
use crate::record::RecordMetadata;

/// Encode record metadata for storage
pub fn encode_metadata(meta: &RecordMetadata) -> StoreResult<String> {
    Ok(serde_json::to_string(meta)?)
}

/// Decode stored record metadata
pub fn decode_metadata(raw: &str) -> StoreResult<RecordMetadata> {
    Ok(serde_json::from_str(raw)?)
}

/// Canonical JSON text of a value
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

/// Parse JSON text produced by [`canonical_json`]
pub fn parse_json(raw: &str) -> StoreResult<Value> {
    Ok(serde_json::from_str(raw)?)
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // Display on a string Value yields its quoted, escaped form
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Parse a stored decimal counter
pub fn decode_counter(raw: &str) -> StoreResult<u64> {
    raw.trim()
        .parse::<u64>()
        .map_err(|e| StoreError::Serialization(format!("invalid counter '{}': {}", raw, e)))
}
