//! Error types for the people service.

use crate::domain::user::UserId;
use shared_bus::Failure;
use thiserror::Error;

/// Key/value store failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable")]
    Unavailable,
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("User ID must be a number")]
    InvalidUserId,

    #[error("Invalid user payload: {0}")]
    InvalidPayload(String),

    #[error("User not found")]
    NotFound,

    #[error("User not found, cannot delete")]
    NotFoundForDelete,

    #[error("User with ID {0} not found")]
    NotFoundForUpdate(UserId),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Stored blob could not be parsed.
    #[error("stored users are corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

impl ServiceError {
    pub fn to_failure(&self) -> Failure {
        match self {
            ServiceError::InvalidUserId | ServiceError::InvalidPayload(_) => {
                Failure::bad_request(self.to_string())
            }
            ServiceError::NotFound
            | ServiceError::NotFoundForDelete
            | ServiceError::NotFoundForUpdate(_) => Failure::not_found(self.to_string()),
            ServiceError::Store(_) | ServiceError::Corrupt(_) => {
                Failure::internal(self.to_string())
            }
        }
    }
}

impl From<ServiceError> for Failure {
    fn from(err: ServiceError) -> Self {
        err.to_failure()
    }
}
