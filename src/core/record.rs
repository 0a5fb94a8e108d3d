//! Helpers for the JSON records held in a table mirror.
//!
//! Records are plain `serde_json::Value` objects. Row keys may be strings,
//! numbers or booleans on the wire; they are normalised to strings so that
//! `1` and `"1"` address the same record.

use serde_json::{Map, Value};

/// Normalised identifier of a record, or `None` for values that cannot key a row.
pub fn row_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Looks up a field by name, following `.`-separated paths into nested objects.
pub fn field<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return None;
    }
    if let Some(direct) = record.get(path) {
        return Some(direct);
    }
    path.split('.')
        .try_fold(record, |current, segment| current.get(segment))
}

/// Row id of `record` under the `key` field.
pub fn record_id(record: &Value, key: &str) -> Option<String> {
    field(record, key).and_then(row_id)
}

/// Shallow merge of `patch` onto `target`, skipping the listed keys.
///
/// Non-object targets are replaced by an empty object first.
pub fn merge_into(target: &mut Value, patch: &Value, skip: &[&str]) {
    let Some(patch) = patch.as_object() else {
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Some(target) = target.as_object_mut() {
        for (key, value) in patch {
            if skip.contains(&key.as_str()) {
                continue;
            }
            target.insert(key.clone(), value.clone());
        }
    }
}

/// Layers `maps` left to right; later maps win.
pub fn layered(maps: &[&Map<String, Value>]) -> Map<String, Value> {
    let mut merged = Map::new();
    for map in maps {
        for (key, value) in map.iter() {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}
