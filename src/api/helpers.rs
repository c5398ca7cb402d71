use serde::Serialize;
use serde_json::Value;

use crate::api::error::ApiError;
use crate::api::types::Request;

/// String param, treating blank strings as absent. Numbers are rendered as text.
pub fn get_str(req: &Request, key: &str) -> Option<String> {
    match req.params.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn get_required_str(req: &Request, key: &str) -> Result<String, ApiError> {
    get_str(req, key).ok_or_else(|| ApiError::BadParams(format!("missing {key}")))
}

/// String param that may be explicitly empty (used to clear a field).
pub fn get_present_str(req: &Request, key: &str) -> Option<String> {
    match req.params.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Null => Some(String::new()),
        _ => None,
    }
}

pub fn get_bool(req: &Request, key: &str) -> Option<bool> {
    match req.params.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) if s == "true" => Some(true),
        Value::String(s) if s == "false" => Some(false),
        _ => None,
    }
}

pub fn get_f64(req: &Request, key: &str) -> Option<f64> {
    match req.params.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn get_array(req: &Request, key: &str) -> Vec<Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default()
}

/// Lower-cased `query` param for case-insensitive search.
pub fn get_query(req: &Request) -> Option<String> {
    get_str(req, "query").map(|q| q.trim().to_lowercase())
}

/// `(page, pageSize)`, 1-based with the action's default size.
pub fn page_params(req: &Request, default_size: usize) -> (usize, usize) {
    let positive = |key: &str| {
        get_f64(req, key)
            .filter(|v| v.is_finite() && *v >= 1.0)
            .map(|v| v as usize)
    };
    (positive("page").unwrap_or(1), positive("pageSize").unwrap_or(default_size))
}

/// Record as JSON with `extra` fields merged on top.
pub fn enrich<T: Serialize>(record: &T, extra: Value) -> Result<Value, ApiError> {
    let mut value = serde_json::to_value(record).map_err(anyhow::Error::from)?;
    if let (Some(obj), Value::Object(more)) = (value.as_object_mut(), extra) {
        obj.extend(more);
    }
    Ok(value)
}

pub fn to_json<T: Serialize>(value: &T) -> Result<Value, ApiError> {
    Ok(serde_json::to_value(value).map_err(anyhow::Error::from)?)
}
