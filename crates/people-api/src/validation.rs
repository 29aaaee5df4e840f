//! Request validation done at the edge, before anything reaches the bus.

use crate::error::ApiError;
use people_service::{NewUser, UserId};
use serde_json::Value;

pub const INVALID_ID: &str = "User ID must be a number";

pub const INVALID_BODY: &str = "Request body must be a JSON object";

/// Human label for each required field, in checking order.
const FIELD_LABELS: [(&str, &str); 5] = [
    ("first_name", "first name"),
    ("last_name", "last name"),
    ("email", "email"),
    ("gender", "gender"),
    ("ip_address", "IP address"),
];

pub fn parse_id(raw: &str) -> Result<UserId, ApiError> {
    raw.trim()
        .parse()
        .map_err(|_| ApiError::bad_request(INVALID_ID))
}

/// Parse a request body. An empty body counts as `{}`.
pub fn parse_body(bytes: &[u8]) -> Result<Value, ApiError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Default::default()));
    }
    match serde_json::from_slice::<Value>(bytes) {
        Ok(body @ Value::Object(_)) => Ok(body),
        _ => Err(ApiError::bad_request(INVALID_BODY)),
    }
}

fn is_present(body: &Value, field: &str) -> bool {
    body.get(field)
        .and_then(Value::as_str)
        .is_some_and(|value| !value.is_empty())
}

/// Name the first missing field.
pub fn validate_create(body: &Value) -> Result<(), ApiError> {
    match FIELD_LABELS.iter().find(|(field, _)| !is_present(body, field)) {
        Some((_, label)) => Err(ApiError::bad_request(format!("Error, missing {label}"))),
        None => Ok(()),
    }
}

/// All fields are required; the message lists every one.
pub fn validate_replace(body: &Value) -> Result<(), ApiError> {
    if NewUser::FIELDS.iter().all(|field| is_present(body, field)) {
        return Ok(());
    }
    let fields = NewUser::FIELDS
        .iter()
        .map(|field| format!("'{field}'"))
        .collect::<Vec<_>>()
        .join(", ");
    Err(ApiError::bad_request(format!(
        "One or more of the following fields is missing: {fields}."
    )))
}
