//! Route handlers. Each one validates, forwards one event over the bridge,
//! and renders the reply.

use crate::error::ApiError;
use crate::validation::{parse_body, parse_id, validate_create, validate_replace};
use crate::AppState;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::Json;
use people_service::events;
use request_bridge::RequestOptions;
use serde_json::{json, Value};

pub const NOT_FOUND: &str = "Not found";

type ApiResult = Result<Json<Value>, ApiError>;

async fn forward(state: &AppState, event_name: &str, data: Value) -> ApiResult {
    let reply = state
        .gateway
        .send_request(event_name, data, RequestOptions::expect_response())
        .await?;
    Ok(Json(reply))
}

pub async fn get_person(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    let id = parse_id(&id)?;
    forward(&state, events::GET_USER, json!({ "userId": id })).await
}

pub async fn create_person(State(state): State<AppState>, body: Bytes) -> ApiResult {
    let body = parse_body(&body)?;
    validate_create(&body)?;
    forward(&state, events::CREATE_USER, body).await
}

pub async fn delete_person(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    let id = parse_id(&id)?;
    forward(&state, events::DELETE_USER, json!({ "userId": id })).await
}

pub async fn put_person(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult {
    let id = parse_id(&id)?;
    let body = parse_body(&body)?;
    validate_replace(&body)?;
    forward(
        &state,
        events::PUT_USER,
        json!({ "userId": id, "userBody": body }),
    )
    .await
}

pub async fn not_found() -> ApiError {
    ApiError::not_found(NOT_FOUND)
}
