//! Defensive accessors on raw exchange JSON.
//!
//! Every accessor takes an object key (`&str`) or an array index (`usize`) and
//! returns `None` when the key is absent, the value is `null`, an empty string, or
//! of a type that cannot be read as the requested one. None of them panic.
//!
//! ```rust
//! use exchange_api_core::normalize::{safe_integer, safe_number, safe_string_2};
//! use serde_json::json;
//!
//! let raw = json!({"px": "27000.5", "qty": 1e-3, "ts": "1700000000000"});
//! assert_eq!(safe_number(&raw, "qty").unwrap().to_string(), "0.001");
//! assert_eq!(safe_string_2(&raw, "price", "px").as_deref(), Some("27000.5"));
//! assert_eq!(safe_integer(&raw, "ts"), Some(1_700_000_000_000));
//! ```

use serde_json::value::Index;
use serde_json::{Map, Value};

use crate::precise::{Precise, RoundingMode};

fn present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

fn first<'v, I: Index>(value: &'v Value, keys: impl IntoIterator<Item = I>) -> Option<&'v Value> {
    keys.into_iter()
        .filter_map(|key| value.get(key))
        .find(|v| present(v))
}

fn as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn as_number(value: &Value) -> Option<Precise> {
    match value {
        Value::String(s) => Precise::parse(s.trim()).ok(),
        Value::Number(n) => Precise::parse(&n.to_string()).ok(),
        _ => None,
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    if let Some(i) = value.as_i64() {
        return Some(i);
    }
    let number = as_number(value)?.round_to_places(0, RoundingMode::Truncate);
    number.to_string().parse().ok()
}

fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// The raw value, if present and not `null` or `""`.
pub fn safe_value<'v, I: Index>(value: &'v Value, key: I) -> Option<&'v Value> {
    first(value, [key])
}

pub fn safe_value_2<'v, I: Index, J: Index>(value: &'v Value, key1: I, key2: J) -> Option<&'v Value> {
    safe_value(value, key1).or_else(|| safe_value(value, key2))
}

/// First present value among `keys`.
pub fn safe_value_n<'v, I: Index>(value: &'v Value, keys: impl IntoIterator<Item = I>) -> Option<&'v Value> {
    first(value, keys)
}

/// Strings as-is; numbers keep their exact JSON text; booleans as `true`/`false`.
pub fn safe_string<I: Index>(value: &Value, key: I) -> Option<String> {
    safe_value(value, key).and_then(as_string)
}

pub fn safe_string_2<I: Index, J: Index>(value: &Value, key1: I, key2: J) -> Option<String> {
    safe_string(value, key1).or_else(|| safe_string(value, key2))
}

pub fn safe_string_n<I: Index>(value: &Value, keys: impl IntoIterator<Item = I>) -> Option<String> {
    keys.into_iter().find_map(|key| safe_string(value, key))
}

pub fn safe_string_lower<I: Index>(value: &Value, key: I) -> Option<String> {
    safe_string(value, key).map(|s| s.to_lowercase())
}

pub fn safe_string_lower_2<I: Index, J: Index>(value: &Value, key1: I, key2: J) -> Option<String> {
    safe_string_2(value, key1, key2).map(|s| s.to_lowercase())
}

pub fn safe_string_upper<I: Index>(value: &Value, key: I) -> Option<String> {
    safe_string(value, key).map(|s| s.to_uppercase())
}

pub fn safe_string_upper_2<I: Index, J: Index>(value: &Value, key1: I, key2: J) -> Option<String> {
    safe_string_2(value, key1, key2).map(|s| s.to_uppercase())
}

/// A decimal from a string or JSON number, including scientific notation.
pub fn safe_number<I: Index>(value: &Value, key: I) -> Option<Precise> {
    safe_value(value, key).and_then(as_number)
}

pub fn safe_number_2<I: Index, J: Index>(value: &Value, key1: I, key2: J) -> Option<Precise> {
    safe_number(value, key1).or_else(|| safe_number(value, key2))
}

pub fn safe_number_n<I: Index>(value: &Value, keys: impl IntoIterator<Item = I>) -> Option<Precise> {
    keys.into_iter().find_map(|key| safe_number(value, key))
}

/// An integer; fractional input is truncated toward zero.
pub fn safe_integer<I: Index>(value: &Value, key: I) -> Option<i64> {
    safe_value(value, key).and_then(as_integer)
}

pub fn safe_integer_2<I: Index, J: Index>(value: &Value, key1: I, key2: J) -> Option<i64> {
    safe_integer(value, key1).or_else(|| safe_integer(value, key2))
}

pub fn safe_integer_n<I: Index>(value: &Value, keys: impl IntoIterator<Item = I>) -> Option<i64> {
    keys.into_iter().find_map(|key| safe_integer(value, key))
}

/// `value[key] * factor`, truncated to an integer.
pub fn safe_integer_product<I: Index>(value: &Value, key: I, factor: &Precise) -> Option<i64> {
    let product = safe_number(value, key)? * factor.clone();
    as_integer(&Value::String(product.to_string()))
}

/// A timestamp given in seconds (possibly fractional), as milliseconds.
pub fn safe_timestamp<I: Index>(value: &Value, key: I) -> Option<i64> {
    safe_integer_product(value, key, &Precise::from(1000))
}

pub fn safe_timestamp_2<I: Index, J: Index>(value: &Value, key1: I, key2: J) -> Option<i64> {
    safe_timestamp(value, key1).or_else(|| safe_timestamp(value, key2))
}

pub fn safe_timestamp_n<I: Index>(value: &Value, keys: impl IntoIterator<Item = I>) -> Option<i64> {
    keys.into_iter().find_map(|key| safe_timestamp(value, key))
}

/// A boolean, or the strings `"true"`/`"false"` in any case.
pub fn safe_bool<I: Index>(value: &Value, key: I) -> Option<bool> {
    safe_value(value, key).and_then(as_bool)
}

pub fn safe_bool_2<I: Index, J: Index>(value: &Value, key1: I, key2: J) -> Option<bool> {
    safe_bool(value, key1).or_else(|| safe_bool(value, key2))
}

pub fn safe_bool_n<I: Index>(value: &Value, keys: impl IntoIterator<Item = I>) -> Option<bool> {
    keys.into_iter().find_map(|key| safe_bool(value, key))
}

/// The value if it is an object.
pub fn safe_dict<'v, I: Index>(value: &'v Value, key: I) -> Option<&'v Map<String, Value>> {
    safe_value(value, key).and_then(Value::as_object)
}

pub fn safe_dict_2<'v, I: Index, J: Index>(
    value: &'v Value,
    key1: I,
    key2: J,
) -> Option<&'v Map<String, Value>> {
    safe_dict(value, key1).or_else(|| safe_dict(value, key2))
}

/// The value if it is an array.
pub fn safe_list<'v, I: Index>(value: &'v Value, key: I) -> Option<&'v Vec<Value>> {
    safe_value(value, key).and_then(Value::as_array)
}

pub fn safe_list_2<'v, I: Index, J: Index>(value: &'v Value, key1: I, key2: J) -> Option<&'v Vec<Value>> {
    safe_list(value, key1).or_else(|| safe_list(value, key2))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn sample() -> Value {
        serde_json::from_str(
            r#"{
                "symbol": "BTCUSDT",
                "empty": "",
                "nothing": null,
                "price": "27000.50",
                "qty": 0.00012345,
                "sci": "1.5e-7",
                "ts": 1700000000123,
                "seconds": "1700000000.5",
                "flag": "TRUE",
                "nested": {"a": 1},
                "levels": [["1", "2"], ["3", "4"]],
                "big": 123456789012345678901234567890
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_missing_null_and_empty_are_none() {
        let raw = sample();
        assert_eq!(safe_string(&raw, "missing"), None);
        assert_eq!(safe_string(&raw, "nothing"), None);
        assert_eq!(safe_string(&raw, "empty"), None);
        assert_eq!(safe_number(&raw, "symbol"), None);
        assert_eq!(safe_integer(&raw, "nested"), None);
        assert!(safe_dict(&raw, "levels").is_none());
        assert!(safe_list(&raw, "nested").is_none());
    }

    #[test]
    fn test_accessors_on_non_objects() {
        assert_eq!(safe_string(&Value::Null, "a"), None);
        assert_eq!(safe_string(&json!("text"), "a"), None);
        assert_eq!(safe_string(&json!(["x", "y"]), 1), Some("y".to_string()));
        assert_eq!(safe_string(&json!(["x"]), 5), None);
    }

    #[test]
    fn test_strings_and_numbers() {
        let raw = sample();
        assert_eq!(safe_string(&raw, "qty").as_deref(), Some("0.00012345"));
        assert_eq!(safe_string(&raw, "big").as_deref(), Some("123456789012345678901234567890"));
        assert_eq!(safe_string_lower(&raw, "symbol").as_deref(), Some("btcusdt"));
        assert_eq!(safe_number(&raw, "price").unwrap().to_string(), "27000.5");
        assert_eq!(safe_number(&raw, "sci").unwrap().to_string(), "0.00000015");
    }

    #[test]
    fn test_fallback_variants() {
        let raw = sample();
        assert_eq!(safe_string_2(&raw, "empty", "symbol").as_deref(), Some("BTCUSDT"));
        assert_eq!(
            safe_string_n(&raw, ["a", "nothing", "price"]).as_deref(),
            Some("27000.50")
        );
        assert_eq!(safe_number_2(&raw, "missing", "qty").unwrap().to_string(), "0.00012345");
        assert_eq!(safe_value_2(&raw, "nothing", "nested"), Some(&json!({"a": 1})));
        assert_eq!(safe_integer_n(&raw, ["x", "y"]), None);
    }

    #[test]
    fn test_integers_and_timestamps() {
        let raw = sample();
        assert_eq!(safe_integer(&raw, "ts"), Some(1_700_000_000_123));
        assert_eq!(safe_integer(&raw, "seconds"), Some(1_700_000_000));
        assert_eq!(safe_timestamp(&raw, "seconds"), Some(1_700_000_000_500));
        assert_eq!(
            safe_integer_product(&raw, "price", &Precise::parse("100").unwrap()),
            Some(2_700_050)
        );
        assert_eq!(safe_integer(&raw, "big"), None);
    }

    #[test]
    fn test_bool_and_containers() {
        let raw = sample();
        assert_eq!(safe_bool(&raw, "flag"), Some(true));
        assert_eq!(safe_bool(&raw, "price"), None);
        assert_eq!(safe_dict(&raw, "nested").unwrap()["a"], 1);
        assert_eq!(safe_list(&raw, "levels").unwrap().len(), 2);
        let level = &safe_list(&raw, "levels").unwrap()[1];
        assert_eq!(safe_number(level, 0).unwrap().to_string(), "3");
    }
}
