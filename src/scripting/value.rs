//! Values crossing the host boundary
//!
//! The host and Rhai disagree on number handling, so numbers always cross
//! as their text form. Containers are walked recursively.

use rhai::{Array, Dynamic, Map};
use serde_json::Value;

/// Convert a script value for the host
pub fn to_host_value(value: &Dynamic) -> Value {
    let value = value.flatten_clone();

    if value.is_unit() {
        return Value::Null;
    }
    if let Ok(b) = value.as_bool() {
        return Value::Bool(b);
    }
    if value.is_int() || value.is_float() {
        return Value::String(value.to_string());
    }
    if let Ok(c) = value.as_char() {
        return Value::String(c.to_string());
    }
    if value.is_string() {
        return Value::String(value.into_string().unwrap_or_default());
    }
    if value.is_array() {
        let items = value.into_array().unwrap_or_default();
        return Value::Array(items.iter().map(to_host_value).collect());
    }
    if value.is_map() {
        let map = value.try_cast::<Map>().unwrap_or_default();
        return Value::Object(
            map.iter()
                .map(|(k, v)| (k.to_string(), to_host_value(v)))
                .collect(),
        );
    }
    Value::String(value.to_string())
}

/// Convert a host answer for scripts, numbers becoming strings
pub fn from_host_value(value: Value) -> Dynamic {
    match value {
        Value::Null => Dynamic::UNIT,
        Value::Bool(b) => Dynamic::from(b),
        Value::Number(n) => Dynamic::from(n.to_string()),
        Value::String(s) => Dynamic::from(s),
        Value::Array(items) => {
            let array: Array = items.into_iter().map(from_host_value).collect();
            Dynamic::from_array(array)
        }
        Value::Object(fields) => {
            let map: Map = fields
                .into_iter()
                .map(|(k, v)| (k.into(), from_host_value(v)))
                .collect();
            Dynamic::from_map(map)
        }
    }
}
