//! # Request Bridge - Request/Reply Correlation over Publish/Subscribe
//!
//! Turns a fire-and-forget publish/subscribe transport into a call that
//! resolves exactly once, multiplexed over one shared connection.
//!
//! ```text
//! ┌─────────────────┐  ev:request:token   ┌─────────────────┐
//! │ RequestGateway  │ ──────────────────→ │  WorkerRouter   │
//! │                 │                     │  (ev:request:*) │
//! │ CorrelationTable│ ←────────────────── │                 │
//! └─────────────────┘  ev:success:token   └─────────────────┘
//!                      ev:failed:token
//! ```
//!
//! ## Settlement
//!
//! A pending request ends in exactly one of success, failure or timeout.
//! The reply listener, the per-call deadline and the background sweeper all
//! race through [`CorrelationTable::try_settle`]; the first caller removes
//! the entry and releases the reply subscriptions, everyone else is a no-op.
//!
//! ## Error codes
//!
//! | Code | Meaning |
//! |------|---------|
//! | 504  | No reply before the deadline |
//! | 500  | Handler panic, or failure without a code |
//! | 4xx  | Passed through from the handler |

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod domain;
pub mod gateway;
pub mod worker;

pub use domain::{
    BridgeConfig, BridgeError, BridgeResult, ConfigError, CorrelationTable, RequestToken,
    Settlement,
};
pub use gateway::{sweep_task, RequestGateway, RequestOptions};
pub use worker::{handler_fn, HandlerFn, RequestHandler, WorkerRouter, HANDLER_PANIC_MESSAGE};
