//! Argument extraction for tool calls.
//!
//! The model supplies arguments as loose JSON. These helpers apply defaults and
//! reject wrong types with [`AppError::InvalidInput`], which the agent loop
//! records as a failed invocation and feeds back to the model.

use crate::types::{AppError, Result};
use serde_json::Value;

pub fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str> {
    match args.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim()),
        Some(Value::String(_)) => Err(AppError::InvalidInput(format!("'{}' must not be empty", key))),
        Some(_) => Err(AppError::InvalidInput(format!("'{}' must be a string", key))),
        None => Err(AppError::InvalidInput(format!("Missing '{}' parameter", key))),
    }
}

/// Optional string; blank strings and `null` count as absent.
pub fn optional_str<'a>(args: &'a Value, key: &str) -> Result<Option<&'a str>> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.trim())),
        Some(_) => Err(AppError::InvalidInput(format!("'{}' must be a string", key))),
    }
}

pub fn optional_u64(args: &Value, key: &str) -> Result<Option<u64>> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
            .map(Some)
            .ok_or_else(|| {
                AppError::InvalidInput(format!("'{}' must be a non-negative integer", key))
            }),
    }
}

/// Integer with a default, clamped to `1..=max`.
pub fn limit_or(args: &Value, key: &str, default: u64, max: u64) -> Result<u64> {
    Ok(optional_u64(args, key)?.unwrap_or(default).clamp(1, max))
}

pub fn bool_or(args: &Value, key: &str, default: bool) -> Result<bool> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Bool(b)) => Ok(*b),
        Some(_) => Err(AppError::InvalidInput(format!("'{}' must be a boolean", key))),
    }
}

/// Optional array of values; a single scalar is accepted as a one-element list.
pub fn optional_list<'a>(args: &'a Value, key: &str) -> Vec<&'a Value> {
    match args.get(key) {
        Some(Value::Array(items)) => items.iter().collect(),
        None | Some(Value::Null) => Vec::new(),
        Some(other) => vec![other],
    }
}
