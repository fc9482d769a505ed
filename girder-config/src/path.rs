// Dotted-path access into the configuration tree

use crate::{ConfigError, Result};
use serde_json::{Map, Value};

/// `HTTP__COOKIE__SECRET` becomes `http.cookie.secret`
pub(crate) fn from_env_key(key: &str) -> String {
    key.split("__")
        .map(|segment| segment.to_lowercase())
        .collect::<Vec<_>>()
        .join(".")
}

/// Environment-style strings that read as booleans or numbers are typed
pub(crate) fn scalar(raw: &str) -> Value {
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => {
            if let Ok(n) = raw.parse::<i64>() {
                Value::from(n)
            } else if let Some(n) = raw.parse::<f64>().ok().filter(|n| n.is_finite()) {
                Value::from(n)
            } else {
                Value::String(raw.to_string())
            }
        }
    }
}

pub(crate) fn get<'a>(root: &'a Value, key: &str) -> Option<&'a Value> {
    if key.is_empty() {
        return Some(root);
    }
    key.split('.').try_fold(root, |node, segment| node.get(segment))
}

/// Write `value` at `key`, creating intermediate objects.
///
/// A scalar standing where an object is needed is replaced.
pub(crate) fn insert(root: &mut Value, key: &str, value: Value) -> Result<()> {
    let segments: Vec<&str> = key.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(ConfigError::InvalidKey(key.to_string()));
    }

    insert_at(root, &segments, value);
    Ok(())
}

fn insert_at(node: &mut Value, segments: &[&str], value: Value) {
    let Some((first, rest)) = segments.split_first() else {
        *node = value;
        return;
    };
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    if let Value::Object(map) = node {
        let child = map.entry(first.to_string()).or_insert(Value::Null);
        insert_at(child, rest, value);
    }
}

/// Deep-merge `source` into `target`; objects merge, everything else overwrites
pub(crate) fn merge(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target), Value::Object(source)) => {
            for (key, value) in source {
                match target.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (target, source) => *target = source,
    }
}
