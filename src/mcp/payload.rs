//! Tool result payloads
//!
//! Every tool result goes through [`to_payload`] before it is rendered as text,
//! so whatever a handler returns ends up as plain, portable JSON.

use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::error::Result;

/// Serialize a handler result into a normalized JSON value
pub fn to_payload<T: Serialize>(value: &T) -> Result<Value> {
    Ok(normalize(serde_json::to_value(value)?))
}

/// Walk mappings and sequences, keeping order, and normalize every number.
///
/// Integers stay integers. Floats stay floats, except that non-finite values
/// become `null` and negative zero becomes `0.0`.
pub fn normalize(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| (key, normalize(value)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(normalize).collect()),
        Value::Number(number) => normalize_number(number),
        other => other,
    }
}

fn normalize_number(number: Number) -> Value {
    if number.is_i64() || number.is_u64() {
        return Value::Number(number);
    }
    match number.as_f64() {
        Some(f) if f.is_finite() => {
            let f = if f == 0.0 { 0.0 } else { f };
            Number::from_f64(f).map_or(Value::Null, Value::Number)
        }
        _ => Value::Null,
    }
}

/// Render a payload as the text block returned to the client
pub fn render(value: &Value) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// `{error, args}` payload for a failed tool call
pub fn error_payload(message: impl Into<String>, args: &Value) -> Value {
    let mut map = Map::new();
    map.insert("error".to_string(), Value::String(message.into()));
    map.insert("args".to_string(), args.clone());
    Value::Object(map)
}
