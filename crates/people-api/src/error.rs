//! HTTP error responses.
//!
//! Every error renders as `{"error": message}` with a status derived from
//! the bridge error code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use request_bridge::BridgeError;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{status}: {message}")]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }
}

impl From<BridgeError> for ApiError {
    fn from(err: BridgeError) -> Self {
        let status = StatusCode::from_u16(err.error_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            warn!(code = status.as_u16(), error = %err, "Request failed");
        } else {
            debug!(code = status.as_u16(), error = %err, "Request rejected");
        }

        Self::new(status, err.message())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}
