//! Helpers for keeping credentials out of diagnostics.

use serde_json::Value;

pub const REDACTED: &str = "[REDACTED]";

/// Keys whose values are never printed, compared case-insensitively.
pub const SENSITIVE_KEYS: &[&str] = &["root_pass", "password", "token", "authorization"];

pub fn is_sensitive_key(key: &str) -> bool {
    SENSITIVE_KEYS
        .iter()
        .any(|k| key.eq_ignore_ascii_case(k))
}

/// Returns a copy of `value` with every sensitive field replaced by [`REDACTED`],
/// at any depth.
pub fn redact_json(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| {
                    let v = if is_sensitive_key(k) {
                        Value::String(REDACTED.to_string())
                    } else {
                        redact_json(v)
                    };
                    (k.clone(), v)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact_json).collect()),
        other => other.clone(),
    }
}

/// Redacts a raw response body for logging. Bodies that are not JSON are passed through.
pub fn redact_body(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(v) => serde_json::to_string(&redact_json(&v)).unwrap_or_default(),
        Err(_) => body.to_string(),
    }
}

/// Truncate large payloads for log lines.
pub fn preview(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let cut: String = text.chars().take(limit).collect();
    format!("{}... (truncated)", cut)
}
