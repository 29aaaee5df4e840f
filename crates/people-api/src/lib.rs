//! # People API - HTTP Surface for the People Relay
//!
//! | Method | Path               | Event         |
//! |--------|--------------------|---------------|
//! | GET    | `/api/people/:id`  | `get-user`    |
//! | POST   | `/api/people`      | `create-user` |
//! | DELETE | `/api/people/:id`  | `delete-user` |
//! | PUT    | `/api/people/:id`  | `put-user`    |
//!
//! Anything else is `404 {"error": "Not found"}`. Replies pass through as
//! `200`; failures become `{"error": message}` with the status taken from
//! the error code (400 input, 404 missing, 500 internal, 504 timeout).

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod error;
pub mod routes;
pub mod validation;

pub use error::ApiError;

use axum::routing::{get, post};
use axum::Router;
use request_bridge::RequestGateway;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<RequestGateway>,
}

impl AppState {
    pub fn new(gateway: Arc<RequestGateway>) -> Self {
        Self { gateway }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/people",
            post(routes::create_person).fallback(routes::not_found),
        )
        .route(
            "/api/people/:id",
            get(routes::get_person)
                .delete(routes::delete_person)
                .put(routes::put_person)
                .fallback(routes::not_found),
        )
        .fallback(routes::not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the API until `shutdown` resolves.
pub async fn serve<F>(addr: SocketAddr, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "HTTP server listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
