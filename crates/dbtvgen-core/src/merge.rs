//! Recursive "override onto defaults" merge for YAML mappings
//!
//! Used for layering root defaults, directory defaults and per-model options,
//! and for folding a freshly generated schema document onto one that already
//! exists on disk.
//!
//! Rules, applied key by key:
//! - key only in `updated`: taken as-is
//! - both values are mappings: merged recursively
//! - both values are sequences: `updated` items not yet present in `base`
//!   are appended (mapping items carrying a `name` key are matched by name and
//!   merged in place, anything else is matched by equality)
//! - anything else: `updated` wins
//!
//! Neither input is mutated.
//!
//! Sequences are only ever extended, so a test or column that is no longer
//! generated (e.g. a `relationships` test pointing at a renamed model) stays in
//! an existing schema.yml until it is removed by hand or rewritten with
//! `--overwrite`.

use serde_yaml::{Mapping, Value};

/// Merge `updated` on top of `base`, returning a fresh mapping
pub fn recursive_merge(base: &Mapping, updated: &Mapping) -> Mapping {
    let mut merged = base.clone();

    for (key, new_value) in updated {
        let value = match merged.get(key) {
            Some(existing) => merge_values(existing, new_value),
            None => new_value.clone(),
        };
        merged.insert(key.clone(), value);
    }

    merged
}

/// Merge two arbitrary YAML values with the same rules as [`recursive_merge`]
pub fn merge_values(base: &Value, updated: &Value) -> Value {
    match (base, updated) {
        (Value::Mapping(base), Value::Mapping(updated)) => {
            Value::Mapping(recursive_merge(base, updated))
        }
        (Value::Sequence(base), Value::Sequence(updated)) => {
            Value::Sequence(merge_sequences(base, updated))
        }
        _ => updated.clone(),
    }
}

fn merge_sequences(base: &[Value], updated: &[Value]) -> Vec<Value> {
    let mut merged = base.to_vec();

    for item in updated {
        let named_match = item_name(item)
            .and_then(|name| merged.iter().position(|existing| item_name(existing) == Some(name)));

        match named_match {
            Some(index) => {
                let combined = merge_values(&merged[index], item);
                merged[index] = combined;
            }
            None if merged.contains(item) => {}
            None => merged.push(item.clone()),
        }
    }

    merged
}

/// Identity of a sequence item: the `name` key of a mapping item
fn item_name(value: &Value) -> Option<&str> {
    match value {
        Value::Mapping(mapping) => mapping.get("name").and_then(Value::as_str),
        _ => None,
    }
}
