//! Lenient accessors over `serde_json::Value`.
//!
//! Scene documents are hand-edited and exported by several tool versions, so a
//! number may arrive as a string, a vector as `"1 0.5 0"`, and any property may
//! be wrapped as `{"value": ...}` (user-property bindings).

use anyhow::{Result, anyhow, bail};
use serde_json::{Map, Value};

/// Unwrap `{"value": x}` property bindings; anything else is returned as-is.
pub fn unwrap_value(v: &Value) -> &Value {
    match v {
        Value::Object(obj) => obj.get("value").unwrap_or(v),
        _ => v,
    }
}

pub fn as_string(v: &Value) -> Result<String> {
    match unwrap_value(v) {
        Value::Null => Ok(String::new()),
        Value::String(s) => Ok(s.clone()),
        other => bail!("value is not a string: {other}"),
    }
}

pub fn as_bool(v: &Value) -> Result<bool> {
    match unwrap_value(v) {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => Ok(n.as_f64().is_some_and(|x| x != 0.0)),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            other => bail!("cannot parse bool from string {other:?}"),
        },
        other => bail!("value is not a bool or string: {other}"),
    }
}

pub fn as_f64(v: &Value) -> Result<f64> {
    match unwrap_value(v) {
        Value::Number(n) => n.as_f64().ok_or_else(|| anyhow!("number out of range: {n}")),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => {
            let text = s.trim().trim_matches(',');
            if text.is_empty() {
                bail!("empty string for float value");
            }
            text.parse::<f64>()
                .map_err(|e| anyhow!("cannot parse float from string {text:?}: {e}"))
        }
        other => bail!("value is not a number or string: {other}"),
    }
}

pub fn as_f32(v: &Value) -> Result<f32> {
    Ok(as_f64(v)? as f32)
}

pub fn as_i32(v: &Value) -> Result<i32> {
    let x = as_f64(v)?;
    if !x.is_finite() {
        bail!("integer value is not finite: {x}");
    }
    Ok(x as i32)
}

/// Accepts `[1, 2, 3]`, `1.5` or `"1 2 3"`.
pub fn float_slice(v: &Value) -> Result<Vec<f32>> {
    match unwrap_value(v) {
        Value::Array(items) => items.iter().map(as_f32).collect(),
        Value::Number(_) | Value::Bool(_) => Ok(vec![as_f32(v)?]),
        Value::String(s) => {
            let text = s.trim();
            if text.is_empty() {
                bail!("empty string for float slice");
            }
            text.split_whitespace()
                .map(|part| {
                    part.parse::<f32>()
                        .map_err(|e| anyhow!("cannot parse float from string {part:?}: {e}"))
                })
                .collect()
        }
        other => bail!("value is not an array, number or string: {other}"),
    }
}

pub fn vec_n<const N: usize>(v: &Value) -> Result<[f32; N]> {
    let values = float_slice(v)?;
    values
        .try_into()
        .map_err(|values: Vec<f32>| anyhow!("expected {N} components, got {}", values.len()))
}

// ── Object field helpers ─────────────────────────────────────────────────

pub fn field<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    obj.get(key).filter(|v| !v.is_null())
}

pub fn parse_str(obj: &Map<String, Value>, key: &str) -> Option<String> {
    field(obj, key).and_then(|v| as_string(v).ok())
}

pub fn parse_bool(obj: &Map<String, Value>, key: &str) -> Option<bool> {
    field(obj, key).and_then(|v| as_bool(v).ok())
}

pub fn parse_f32(obj: &Map<String, Value>, key: &str) -> Option<f32> {
    field(obj, key).and_then(|v| as_f32(v).ok())
}

pub fn parse_i32(obj: &Map<String, Value>, key: &str) -> Option<i32> {
    field(obj, key).and_then(|v| as_i32(v).ok())
}

pub fn parse_vec<const N: usize>(obj: &Map<String, Value>, key: &str) -> Option<[f32; N]> {
    field(obj, key).and_then(|v| vec_n::<N>(v).ok())
}

pub fn as_object<'a>(v: &'a Value, what: &str) -> Result<&'a Map<String, Value>> {
    v.as_object()
        .ok_or_else(|| anyhow!("{what} is not a JSON object"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unwraps_user_property_bindings() {
        let v = json!({"user": "speed", "value": 2.5});
        assert_eq!(as_f32(&v).unwrap(), 2.5);
    }

    #[test]
    fn float_slice_accepts_space_separated_strings() {
        assert_eq!(float_slice(&json!("1 0.5 0")).unwrap(), vec![1.0, 0.5, 0.0]);
        assert_eq!(float_slice(&json!(3)).unwrap(), vec![3.0]);
        assert_eq!(float_slice(&json!([1, 2])).unwrap(), vec![1.0, 2.0]);
        assert!(float_slice(&json!("")).is_err());
    }

    #[test]
    fn vec_n_rejects_wrong_component_count() {
        assert_eq!(vec_n::<2>(&json!("4 5")).unwrap(), [4.0, 5.0]);
        assert!(vec_n::<3>(&json!("4 5")).is_err());
    }

    #[test]
    fn bool_accepts_strings_and_numbers() {
        assert!(as_bool(&json!("TRUE")).unwrap());
        assert!(!as_bool(&json!(0)).unwrap());
        assert!(as_bool(&json!("maybe")).is_err());
    }
}
