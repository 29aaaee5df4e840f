//! Domain types for the people service.

pub mod errors;
pub mod user;

pub use errors::{ServiceError, StoreError};
pub use user::{NewUser, User, UserId, UserPool};
