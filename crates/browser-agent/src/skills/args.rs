//! Coercion helpers for the weakly typed argument maps skills receive.
//!
//! Upstream tool-call payloads arrive as JSON with no fixed shape. Each
//! helper extracts one parameter by name: absent means "use the declared
//! default", present-but-wrong-kind is an `InvalidParameter` error naming
//! the parameter and the expected type. Numeric parameters accept both
//! integer and floating-point representations.

use serde_json::{Map, Value};

use crate::error::{AgentError, Result};

pub fn opt_str<'a>(args: &'a Map<String, Value>, name: &str) -> Result<Option<&'a str>> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(AgentError::invalid(name, "must be a string")),
    }
}

/// Required, non-empty string.
pub fn req_str<'a>(args: &'a Map<String, Value>, name: &str) -> Result<&'a str> {
    match opt_str(args, name)? {
        Some(s) if !s.is_empty() => Ok(s),
        _ => Err(AgentError::invalid(
            name,
            "is required and must be a non-empty string",
        )),
    }
}

/// Optional string constrained to an enumeration; empty counts as absent.
pub fn str_enum<'a>(
    args: &Map<String, Value>,
    name: &str,
    allowed: &[&'a str],
    default: &'a str,
) -> Result<&'a str> {
    match opt_str(args, name)? {
        None => Ok(default),
        Some("") => Ok(default),
        Some(s) => allowed
            .iter()
            .find(|candidate| **candidate == s)
            .copied()
            .ok_or_else(|| {
                AgentError::invalid(name, format!("must be one of: {}", allowed.join(", ")))
            }),
    }
}

/// Required string constrained to an enumeration.
pub fn req_enum<'a>(
    args: &Map<String, Value>,
    name: &str,
    allowed: &[&'a str],
) -> Result<&'a str> {
    let value = req_str(args, name)?;
    allowed
        .iter()
        .find(|candidate| **candidate == value)
        .copied()
        .ok_or_else(|| AgentError::invalid(name, format!("must be one of: {}", allowed.join(", "))))
}

pub fn opt_bool(args: &Map<String, Value>, name: &str, default: bool) -> Result<bool> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Bool(b)) => Ok(*b),
        Some(_) => Err(AgentError::invalid(name, "must be a boolean")),
    }
}

/// Positive integer with a default; floats are truncated, zero and
/// negative values fall back to the default.
pub fn positive_u64(args: &Map<String, Value>, name: &str, default: u64) -> Result<u64> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Number(n)) => {
            if let Some(v) = n.as_u64() {
                Ok(if v > 0 { v } else { default })
            } else if let Some(v) = n.as_i64() {
                Ok(if v > 0 { v as u64 } else { default })
            } else if let Some(v) = n.as_f64() {
                Ok(if v > 0.0 { v as u64 } else { default })
            } else {
                Err(AgentError::invalid(name, "must be a positive integer"))
            }
        }
        Some(_) => Err(AgentError::invalid(name, "must be a positive integer")),
    }
}

/// Integer that may be negative or zero; floats are truncated.
pub fn any_i64(args: &Map<String, Value>, name: &str, default: i64) -> Result<i64> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|v| v as i64))
            .ok_or_else(|| AgentError::invalid(name, "must be an integer")),
        Some(_) => Err(AgentError::invalid(name, "must be an integer")),
    }
}

pub fn opt_array<'a>(args: &'a Map<String, Value>, name: &str) -> Result<Option<&'a Vec<Value>>> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => Ok(Some(items)),
        Some(_) => Err(AgentError::invalid(name, "must be an array")),
    }
}

/// Required, non-empty array.
pub fn req_array<'a>(args: &'a Map<String, Value>, name: &str) -> Result<&'a Vec<Value>> {
    match opt_array(args, name)? {
        Some(items) if !items.is_empty() => Ok(items),
        _ => Err(AgentError::invalid(
            name,
            "is required and must be a non-empty array",
        )),
    }
}

/// Item of an array parameter, which must be an object.
pub fn item_object(name: &str, index: usize, item: &Value) -> Result<Map<String, Value>> {
    match item {
        Value::Object(map) => Ok(map.clone()),
        _ => Err(AgentError::invalid(
            format!("{name}[{index}]"),
            "must be an object",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn strings() {
        let map = args(json!({"url": "https://example.com", "n": 3}));
        assert_eq!(opt_str(&map, "url").unwrap(), Some("https://example.com"));
        assert_eq!(opt_str(&map, "missing").unwrap(), None);
        assert!(opt_str(&map, "n").is_err());
        assert!(req_str(&map, "missing").is_err());
    }

    #[test]
    fn empty_required_string_rejected() {
        let map = args(json!({"selector": ""}));
        assert!(req_str(&map, "selector").is_err());
    }

    #[test]
    fn enums_name_allowed_values() {
        let map = args(json!({"button": "diagonal"}));
        let err = str_enum(&map, "button", &["left", "right", "middle"], "left").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("button"));
        assert!(message.contains("left, right, middle"));

        let map = args(json!({}));
        assert_eq!(
            str_enum(&map, "button", &["left", "right", "middle"], "left").unwrap(),
            "left"
        );
    }

    #[test]
    fn numbers_accept_int_and_float() {
        let map = args(json!({"a": 5000, "b": 5000.0, "c": -3, "d": "x"}));
        assert_eq!(positive_u64(&map, "a", 1).unwrap(), 5000);
        assert_eq!(positive_u64(&map, "b", 1).unwrap(), 5000);
        assert_eq!(positive_u64(&map, "c", 1).unwrap(), 1);
        assert_eq!(positive_u64(&map, "missing", 7).unwrap(), 7);
        assert!(positive_u64(&map, "d", 1).is_err());
    }

    #[test]
    fn signed_integers() {
        let map = args(json!({"x": -250, "y": 10.9}));
        assert_eq!(any_i64(&map, "x", 0).unwrap(), -250);
        assert_eq!(any_i64(&map, "y", 0).unwrap(), 10);
    }

    #[test]
    fn booleans_strict() {
        let map = args(json!({"force": true, "other": "yes"}));
        assert!(opt_bool(&map, "force", false).unwrap());
        assert!(!opt_bool(&map, "missing", false).unwrap());
        assert!(opt_bool(&map, "other", false).is_err());
    }

    #[test]
    fn arrays() {
        let map = args(json!({"fields": [{"selector": "#a"}], "empty": []}));
        assert_eq!(req_array(&map, "fields").unwrap().len(), 1);
        assert!(req_array(&map, "empty").is_err());
        assert!(req_array(&map, "missing").is_err());
    }
}
