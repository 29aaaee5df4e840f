//! Bridge error types.
//!
//! Every error carries a status-style code so the HTTP edge can map it
//! without inspecting messages.

use crate::domain::token::RequestToken;
use shared_bus::{codes, Failure, TransportError};
use thiserror::Error;

/// Result alias for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

#[derive(Debug, Error)]
pub enum BridgeError {
    /// Publish or subscribe failed; surfaced immediately, never retried.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// No reply arrived before the deadline.
    #[error("request '{event_name}' timed out after {timeout_ms}ms")]
    Timeout { event_name: String, timeout_ms: u64 },

    /// The handler replied with a failure envelope.
    #[error("request failed: {0}")]
    Failed(Failure),

    /// A token was registered twice. Never expected with v7 tokens.
    #[error("duplicate request token: {0}")]
    DuplicateToken(RequestToken),

    #[error("handler already registered for '{0}'")]
    DuplicateHandler(String),

    #[error("invalid event name: '{0}'")]
    InvalidEventName(String),

    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),

    /// The pending entry was removed without being settled.
    #[error("request cancelled before settlement")]
    Cancelled,
}

impl BridgeError {
    /// Status-style code for this error.
    pub fn error_code(&self) -> u16 {
        match self {
            BridgeError::Timeout { .. } => codes::TIMEOUT,
            BridgeError::Failed(failure) => failure.error_code,
            BridgeError::InvalidEventName(_) => codes::BAD_REQUEST,
            BridgeError::Transport(_)
            | BridgeError::DuplicateToken(_)
            | BridgeError::DuplicateHandler(_)
            | BridgeError::Encode(_)
            | BridgeError::Cancelled => codes::INTERNAL_ERROR,
        }
    }

    /// Message suitable for returning to a caller.
    ///
    /// Handler failures pass through verbatim; everything else uses the
    /// error's display text.
    pub fn message(&self) -> String {
        match self {
            BridgeError::Failed(failure) => failure.message.clone(),
            other => other.to_string(),
        }
    }

    /// Flatten into the wire failure shape.
    pub fn to_failure(&self) -> Failure {
        Failure::new(self.error_code(), self.message())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, BridgeError::Timeout { .. })
    }
}

impl From<Failure> for BridgeError {
    fn from(failure: Failure) -> Self {
        BridgeError::Failed(failure)
    }
}
