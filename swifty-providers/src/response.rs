//! Interpretation of provider response bodies.

use crate::ProviderError;
use serde_json::Value;
use swifty_common::redact::{redact_body, redact_json};
use swifty_common::InstanceAddress;
use tracing::debug;

/// Only these codes count as an accepted creation request.
pub const CREATE_SUCCESS_CODES: [u16; 3] = [200, 201, 202];

pub fn is_create_success(status: u16) -> bool {
    CREATE_SUCCESS_CODES.contains(&status)
}

/// Best-effort human readable message for a rejected request.
///
/// - `{"errors": ...}` -> `API Errors: <errors as JSON>`
/// - `{"message": ...}` -> `API Message: ...` when the value reads as a single string
/// - anything else, including bodies that are not JSON, -> the raw body
///
/// Sensitive fields are redacted in every branch; the result ends up in logs and error text.
pub fn extract_error_message(body: &str) -> String {
    let parsed = match serde_json::from_str::<Value>(body) {
        Ok(v) => v,
        Err(e) => {
            debug!("Could not parse error response as JSON: {}", e);
            return body.to_string();
        }
    };

    let Some(obj) = parsed.as_object() else {
        return redact_body(body);
    };

    if let Some(errors) = obj.get("errors") {
        return format!("API Errors: {}", redact_json(errors));
    }

    match obj.get("message").and_then(message_text) {
        Some(m) => format!("API Message: {}", m),
        None => redact_body(body),
    }
}

/// Scalar text of a `message` value. A one-element array reads as its element.
fn message_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(_) | Value::Bool(_) => Some(v.to_string()),
        Value::Array(items) if items.len() == 1 => message_text(&items[0]),
        _ => None,
    }
}

/// Instance id from a successful creation body: top-level `id`, else `instance.id`.
pub fn instance_id_from_create_response(body: &str) -> Result<String, ProviderError> {
    let v: Value = serde_json::from_str(body).map_err(|e| {
        ProviderError::MalformedResponse(format!("create response is not JSON: {}", e))
    })?;

    let id = [&v["id"], &v["instance"]["id"]]
        .into_iter()
        .find_map(|id| match id {
            Value::Number(n) => Some(n.to_string()),
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => None,
        })
        .ok_or_else(|| ProviderError::MalformedResponse("no instance id in create response".into()));
    id
}

/// `instance.main_ip` from a status body. The placeholder address is returned as-is.
pub fn main_ip_from_lookup_response(body: &str) -> Result<InstanceAddress, ProviderError> {
    let v: Value = serde_json::from_str(body).map_err(|e| {
        ProviderError::MalformedResponse(format!("instance response is not JSON: {}", e))
    })?;

    let raw = v["instance"]["main_ip"].as_str().ok_or_else(|| {
        ProviderError::MalformedResponse("missing instance.main_ip in instance response".into())
    })?;

    InstanceAddress::parse(raw).map_err(|e| ProviderError::MalformedResponse(e.to_string()))
}
