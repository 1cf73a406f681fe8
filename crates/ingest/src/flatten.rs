//! Collapse nested extractor output into single-level facts.
//!
//! Nested map keys are joined to their parent with `_`; list elements are
//! keyed by their index. Scalars are kept as-is, nulls are dropped, and
//! pointer locations (`vector_db/...`) pass through untouched.

use quill_core::profile::{FactSet, FieldValue, is_pointer_value};
use serde_json::{Map, Value};

/// Separator placed between a parent key and a child key or index.
pub const SEPARATOR: &str = "_";

/// Flatten a JSON object into a single-level fact set.
pub fn flatten(map: &Map<String, Value>) -> FactSet {
    let mut out = FactSet::new();
    for (key, value) in map {
        walk(key.clone(), value, &mut out);
    }
    out
}

/// Flatten any JSON value. Top-level arrays are keyed by index and a
/// top-level scalar lands under `value`.
pub fn flatten_value(value: &Value) -> FactSet {
    match value {
        Value::Object(map) => flatten(map),
        Value::Array(items) => {
            let mut out = FactSet::new();
            for (i, item) in items.iter().enumerate() {
                walk(i.to_string(), item, &mut out);
            }
            out
        }
        other => {
            let mut out = FactSet::new();
            walk("value".into(), other, &mut out);
            out
        }
    }
}

fn walk(key: String, value: &Value, out: &mut FactSet) {
    match value {
        Value::String(s) if is_pointer_value(s) => {
            out.insert(key, FieldValue::Text(s.clone()));
        }
        Value::Object(map) => {
            for (child, v) in map {
                walk(format!("{key}{SEPARATOR}{child}"), v, out);
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                walk(format!("{key}{SEPARATOR}{i}"), item, out);
            }
        }
        Value::Null => {}
        scalar => {
            if let Some(v) = FieldValue::from_json(scalar) {
                out.insert(key, v);
            }
        }
    }
}

/// Re-nest a flat fact set by splitting keys on the separator.
///
/// Objects whose keys are exactly `0..n` become arrays again. Keys that
/// themselves contain the separator cannot be told apart from nesting.
pub fn unflatten(facts: &FactSet) -> Value {
    let mut root = Map::new();
    for (key, value) in facts {
        let parts: Vec<&str> = key.split(SEPARATOR).collect();
        insert_path(&mut root, &parts, value.to_json());
    }
    arrays_from_index_maps(Value::Object(root))
}

fn insert_path(node: &mut Map<String, Value>, parts: &[&str], value: Value) {
    match parts {
        [] => {}
        [last] => {
            node.insert((*last).to_string(), value);
        }
        [head, rest @ ..] => {
            let child = node
                .entry((*head).to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            if let Value::Object(map) = child {
                insert_path(map, rest, value);
            }
        }
    }
}

fn arrays_from_index_maps(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let is_sequence = !map.is_empty()
                && (0..map.len()).all(|i| map.contains_key(&i.to_string()));
            if is_sequence {
                let mut map = map;
                let items = (0..map.len())
                    .filter_map(|i| map.remove(&i.to_string()))
                    .map(arrays_from_index_maps)
                    .collect();
                Value::Array(items)
            } else {
                Value::Object(
                    map.into_iter()
                        .map(|(k, v)| (k, arrays_from_index_maps(v)))
                        .collect(),
                )
            }
        }
        other => other,
    }
}
