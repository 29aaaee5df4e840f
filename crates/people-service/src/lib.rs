//! # People Service - Worker Side of the People Relay
//!
//! Answers the `get-user`, `create-user`, `delete-user` and `put-user`
//! events over the request bridge. All records live in one JSON blob under
//! the `users` key of a [`KeyValueStore`].
//!
//! ```text
//! WorkerRouter ──→ GetUser / CreateUser / DeleteUser / PutUser
//!                          │
//!                   UserRepository (serialized writes)
//!                          │
//!                   KeyValueStore ("users" → {"users": [...]})
//! ```
//!
//! ## Failures
//!
//! | Code | When |
//! |------|------|
//! | 400  | Non-numeric id or incomplete record |
//! | 404  | No record with that id |
//! | 500  | Store unavailable or blob corrupt |

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod domain;
pub mod events;
pub mod handlers;
pub mod ports;
pub mod repository;
pub mod seed;

pub use adapters::InMemoryStore;
pub use domain::{NewUser, ServiceError, StoreError, User, UserId, UserPool};
pub use handlers::{parse_user_id, register_handlers, USER_DELETED};
pub use ports::KeyValueStore;
pub use repository::{BootstrapOutcome, UserRepository};
pub use seed::{fetch_seed_url, load_seed_file, parse_seed, SeedError};
