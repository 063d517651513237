//! Loose value semantics used when probing script results
//!
//! Scripts in the wild return values from dynamically typed languages, so
//! emptiness and truthiness follow those conventions rather than Rust's.

use serde_json::{Map, Value};

/// Whether a value counts as "empty": null, false, zero, `""`, `"0"`,
/// an empty list or an empty mapping.
pub fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f == 0.0),
        Value::String(s) => s.is_empty() || s == "0",
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

/// Inverse of [`is_empty`]
pub fn is_truthy(value: &Value) -> bool {
    !is_empty(value)
}

/// Whether `key` is present in `map` with a non-null value
pub fn is_set(map: &Map<String, Value>, key: &str) -> bool {
    map.get(key).map_or(false, |v| !v.is_null())
}

/// Look up `key` when `value` is a mapping
pub fn get<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    value.as_object().and_then(|m| m.get(key))
}

/// Shallow merge: every key of `overlay` overwrites the same key in `base`
pub fn merge_shallow(base: &mut Map<String, Value>, overlay: &Map<String, Value>) {
    for (key, value) in overlay {
        base.insert(key.clone(), value.clone());
    }
}
