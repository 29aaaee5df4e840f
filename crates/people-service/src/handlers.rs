//! Bridge handlers for the people events.
//!
//! | Event         | Request data           | Success data      |
//! |---------------|------------------------|-------------------|
//! | `get-user`    | `{userId}`             | record            |
//! | `create-user` | record fields          | new record        |
//! | `delete-user` | `{userId}`             | `"User deleted"`  |
//! | `put-user`    | `{userId, userBody}`   | replaced record   |

use crate::domain::errors::ServiceError;
use crate::domain::user::{NewUser, UserId};
use crate::events;
use crate::repository::UserRepository;
use async_trait::async_trait;
use request_bridge::{BridgeResult, RequestHandler, WorkerRouter};
use serde_json::{json, Value};
use shared_bus::Failure;
use std::sync::Arc;
use tracing::debug;

/// Success data returned by `delete-user`.
pub const USER_DELETED: &str = "User deleted";

/// Accept a JSON number or a numeric string.
pub fn parse_user_id(value: Option<&Value>) -> Result<UserId, ServiceError> {
    match value {
        Some(Value::Number(n)) => n.as_u64().ok_or(ServiceError::InvalidUserId),
        Some(Value::String(s)) => s.trim().parse().map_err(|_| ServiceError::InvalidUserId),
        _ => Err(ServiceError::InvalidUserId),
    }
}

fn parse_new_user(value: Value) -> Result<NewUser, ServiceError> {
    serde_json::from_value(value).map_err(|e| ServiceError::InvalidPayload(e.to_string()))
}

pub struct GetUser {
    repo: Arc<UserRepository>,
}

#[async_trait]
impl RequestHandler for GetUser {
    async fn handle(&self, data: Value) -> Result<Value, Failure> {
        let id = parse_user_id(data.get("userId"))?;
        debug!(user_id = id, "get-user");
        let user = self.repo.find(id).await?;
        Ok(serde_json::to_value(user).map_err(ServiceError::from)?)
    }
}

pub struct CreateUser {
    repo: Arc<UserRepository>,
}

#[async_trait]
impl RequestHandler for CreateUser {
    async fn handle(&self, data: Value) -> Result<Value, Failure> {
        let new_user = parse_new_user(data)?;
        let user = self.repo.create(new_user).await?;
        Ok(serde_json::to_value(user).map_err(ServiceError::from)?)
    }
}

pub struct DeleteUser {
    repo: Arc<UserRepository>,
}

#[async_trait]
impl RequestHandler for DeleteUser {
    async fn handle(&self, data: Value) -> Result<Value, Failure> {
        let id = parse_user_id(data.get("userId"))?;
        debug!(user_id = id, "delete-user");
        self.repo.delete(id).await?;
        Ok(json!(USER_DELETED))
    }
}

pub struct PutUser {
    repo: Arc<UserRepository>,
}

#[async_trait]
impl RequestHandler for PutUser {
    async fn handle(&self, mut data: Value) -> Result<Value, Failure> {
        let id = parse_user_id(data.get("userId"))?;
        let body = data
            .get_mut("userBody")
            .map(Value::take)
            .ok_or_else(|| ServiceError::InvalidPayload("missing field `userBody`".into()))?;
        let new_user = parse_new_user(body)?;

        debug!(user_id = id, "put-user");
        let user = self.repo.replace(id, new_user).await?;
        Ok(serde_json::to_value(user).map_err(ServiceError::from)?)
    }
}

/// Register one handler per people event on `router`.
pub async fn register_handlers(
    router: &WorkerRouter,
    repo: Arc<UserRepository>,
) -> BridgeResult<()> {
    router
        .register_handler(events::GET_USER, GetUser { repo: repo.clone() })
        .await?;
    router
        .register_handler(events::CREATE_USER, CreateUser { repo: repo.clone() })
        .await?;
    router
        .register_handler(events::DELETE_USER, DeleteUser { repo: repo.clone() })
        .await?;
    router
        .register_handler(events::PUT_USER, PutUser { repo })
        .await?;
    Ok(())
}
