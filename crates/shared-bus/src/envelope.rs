//! # Wire Envelopes
//!
//! Every message on the bus carries one JSON envelope:
//!
//! ```text
//! Request:  { token, eventName, data }
//! Success:  { token, eventName, data }
//! Failure:  { token, eventName, data: { message, errorCode } }
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Status-style error codes carried in failure envelopes.
pub mod codes {
    pub const BAD_REQUEST: u16 = 400;
    pub const NOT_FOUND: u16 = 404;
    pub const INTERNAL_ERROR: u16 = 500;
    pub const TIMEOUT: u16 = 504;

    /// Failure codes must be client or server errors.
    pub const FAILURE_RANGE: std::ops::RangeInclusive<u16> = 400..=599;

    /// `code` when it is a failure code, otherwise 500.
    pub fn failure_code(code: u16) -> u16 {
        if FAILURE_RANGE.contains(&code) {
            code
        } else {
            INTERNAL_ERROR
        }
    }
}

/// Request or reply envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub token: String,
    pub event_name: String,
    #[serde(default)]
    pub data: Value,
}

/// Why an incoming payload could not be used.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("envelope is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("envelope has no token")]
    MissingToken,

    #[error("envelope has no event name")]
    MissingEventName,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEnvelope {
    token: Option<String>,
    event_name: Option<String>,
    #[serde(default)]
    data: Value,
}

impl Envelope {
    pub fn new(token: impl Into<String>, event_name: impl Into<String>, data: Value) -> Self {
        Self {
            token: token.into(),
            event_name: event_name.into(),
            data,
        }
    }

    /// Failure reply whose data is `{message, errorCode}`.
    pub fn failure(
        token: impl Into<String>,
        event_name: impl Into<String>,
        failure: &Failure,
    ) -> Self {
        Self::new(token, event_name, failure.to_value())
    }

    /// Decode a payload, requiring a non-empty token and event name.
    pub fn decode(payload: &str) -> Result<Self, EnvelopeError> {
        let raw: RawEnvelope = serde_json::from_str(payload)?;

        let token = raw
            .token
            .filter(|t| !t.is_empty())
            .ok_or(EnvelopeError::MissingToken)?;
        let event_name = raw
            .event_name
            .filter(|e| !e.is_empty())
            .ok_or(EnvelopeError::MissingEventName)?;

        Ok(Self {
            token,
            event_name,
            data: raw.data,
        })
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Failure reported by a handler or synthesized by the bridge.
///
/// Deserialization never yields an absent code: a missing, null or
/// out-of-range `errorCode` becomes 500.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Failure {
    #[serde(default = "default_message", deserialize_with = "lenient_message")]
    pub message: String,
    #[serde(
        default = "default_error_code",
        deserialize_with = "lenient_error_code"
    )]
    pub error_code: u16,
}

fn default_message() -> String {
    "Unknown error".to_string()
}

fn default_error_code() -> u16 {
    codes::INTERNAL_ERROR
}

fn lenient_message<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::String(message)) => message,
        Some(Value::Null) | None => default_message(),
        Some(other) => other.to_string(),
    })
}

fn lenient_error_code<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw
        .and_then(|v| v.as_u64())
        .and_then(|code| u16::try_from(code).ok())
        .map_or_else(default_error_code, codes::failure_code))
}

impl Failure {
    /// Codes outside 400..=599 become 500.
    pub fn new(error_code: u16, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error_code: codes::failure_code(error_code),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(codes::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(codes::NOT_FOUND, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(codes::INTERNAL_ERROR, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(codes::TIMEOUT, message)
    }

    /// Interpret the `data` of a failure envelope.
    pub fn from_data(data: Value) -> Self {
        match data {
            Value::Object(_) => serde_json::from_value(data)
                .unwrap_or_else(|e| Failure::internal(format!("unreadable failure: {e}"))),
            Value::String(message) => Failure::internal(message),
            other => Failure::internal(other.to_string()),
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "message": self.message,
            "errorCode": self.error_code,
        })
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.error_code, self.message)
    }
}

impl std::error::Error for Failure {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_uses_camel_case() {
        let envelope = Envelope::new("t-1", "get-user", json!({"userId": 1}));
        let encoded = envelope.encode().unwrap();
        assert!(encoded.contains("\"eventName\":\"get-user\""));
        assert!(encoded.contains("\"token\":\"t-1\""));
    }

    #[test]
    fn test_decode_missing_token() {
        let result = Envelope::decode(r#"{"eventName":"get-user","data":{}}"#);
        assert!(matches!(result, Err(EnvelopeError::MissingToken)));

        let result = Envelope::decode(r#"{"token":"","eventName":"get-user"}"#);
        assert!(matches!(result, Err(EnvelopeError::MissingToken)));
    }

    #[test]
    fn test_decode_missing_event_name() {
        let result = Envelope::decode(r#"{"token":"abc"}"#);
        assert!(matches!(result, Err(EnvelopeError::MissingEventName)));
    }

    #[test]
    fn test_decode_invalid_json() {
        let result = Envelope::decode("not json");
        assert!(matches!(result, Err(EnvelopeError::Json(_))));
    }

    #[test]
    fn test_decode_defaults_data_to_null() {
        let envelope = Envelope::decode(r#"{"token":"abc","eventName":"ping"}"#).unwrap();
        assert_eq!(envelope.data, Value::Null);
    }

    #[test]
    fn test_failure_envelope_shape() {
        let failure = Failure::not_found("User not found");
        let envelope = Envelope::failure("t-9", "get-user", &failure);
        assert_eq!(
            envelope.data,
            json!({"message": "User not found", "errorCode": 404})
        );
    }

    #[test]
    fn test_missing_error_code_defaults_to_500() {
        let failure = Failure::from_data(json!({"message": "boom"}));
        assert_eq!(failure.error_code, codes::INTERNAL_ERROR);
        assert_eq!(failure.message, "boom");
    }

    #[test]
    fn test_null_or_bogus_error_code_defaults_to_500() {
        let failure = Failure::from_data(json!({"message": "x", "errorCode": null}));
        assert_eq!(failure.error_code, 500);

        let failure = Failure::from_data(json!({"message": "x", "errorCode": 42}));
        assert_eq!(failure.error_code, 500);

        let failure = Failure::from_data(json!({"message": "x", "errorCode": "404"}));
        assert_eq!(failure.error_code, 500);
    }

    #[test]
    fn test_non_error_codes_become_500() {
        for code in [100, 200, 204, 302, 399, 600] {
            let failure = Failure::from_data(json!({"message": "x", "errorCode": code}));
            assert_eq!(failure.error_code, 500, "code {code}");
        }
        assert_eq!(Failure::new(201, "created?").error_code, 500);

        let failure = Failure::from_data(json!({"message": "x", "errorCode": 409}));
        assert_eq!(failure.error_code, 409);
        assert_eq!(Failure::new(599, "edge").error_code, 599);
    }

    #[test]
    fn test_failure_from_non_object() {
        let failure = Failure::from_data(json!("plain text"));
        assert_eq!(failure, Failure::internal("plain text"));
    }

    #[test]
    fn test_failure_display() {
        assert_eq!(Failure::timeout("late").to_string(), "[504] late");
    }
}
