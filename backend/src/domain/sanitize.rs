//! JSON sanitisation for semi-structured payloads.
//!
//! PostgreSQL JSONB rejects NaN and infinite numbers outright, so every
//! payload headed for persistence passes through this module first. It is the
//! single gate between raw provider data and anything written as JSONB.
//!
//! Two entry points:
//! - [`finite_number`] converts a raw `f64` into a JSON value, mapping
//!   non-finite inputs to `null`. Payload builders use it for every float.
//! - [`sanitize`] walks an already-built value and scrubs any non-finite
//!   number that slipped through, preserving container shape and key order.
//!
//! Both are total and pure; sanitisation never fails.

use serde_json::{Map, Number, Value};

/// Convert a float into a JSON-safe value.
///
/// Non-finite inputs (NaN, ±infinity) become `Value::Null`; finite inputs
/// become numbers.
///
/// # Examples
/// ```
/// use backend::domain::sanitize::finite_number;
/// use serde_json::Value;
///
/// assert_eq!(finite_number(f64::NAN), Value::Null);
/// assert_eq!(finite_number(2.5), serde_json::json!(2.5));
/// ```
pub fn finite_number(value: f64) -> Value {
    Number::from_f64(value).map_or(Value::Null, Value::Number)
}

/// Recursively sanitise a JSON value.
///
/// Objects and arrays are rebuilt in order with each element sanitised;
/// numbers that cannot be represented as finite floats become `null`; all
/// other values pass through unchanged. Idempotent: sanitising a sanitised
/// value is a no-op.
///
/// # Examples
/// ```
/// use backend::domain::sanitize::sanitize;
/// use serde_json::json;
///
/// let value = json!({ "a": [1, 2.5, null], "b": "text" });
/// assert_eq!(sanitize(value.clone()), value);
/// ```
pub fn sanitize(value: Value) -> Value {
    match value {
        Value::Number(number) => sanitize_number(number),
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize).collect()),
        Value::Object(entries) => Value::Object(
            entries
                .into_iter()
                .map(|(key, item)| (key, sanitize(item)))
                .collect::<Map<_, _>>(),
        ),
        other => other,
    }
}

fn sanitize_number(number: Number) -> Value {
    // Integers are always representable; only float-valued numbers can be
    // non-finite (e.g. when built with arbitrary precision enabled upstream).
    if number.is_i64() || number.is_u64() {
        return Value::Number(number);
    }
    number.as_f64().map_or(Value::Null, finite_number)
}
