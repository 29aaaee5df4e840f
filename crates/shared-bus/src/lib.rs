//! # Shared Bus - Channel-Addressed Publish/Subscribe Transport
//!
//! The transport underneath the request/reply bridge. Messages are plain
//! `(channel, payload)` pairs; subscribers register either an exact channel
//! name or a glob pattern (`get-user:request:*`).
//!
//! ```text
//! ┌──────────────┐   publish(channel, payload)   ┌──────────────────┐
//! │   Gateway    │ ────────────────────────────→ │                  │
//! └──────────────┘                               │  BrokerTransport │
//!        ↑             subscribe(pattern)        │                  │
//!        └────────────────────────────────────── │  (one shared     │
//!                                                │   connection)    │
//! ┌──────────────┐   subscribe("ev:request:*")   │                  │
//! │   Worker     │ ←──────────────────────────── │                  │
//! └──────────────┘                               └──────────────────┘
//! ```
//!
//! ## Delivery
//!
//! - **At-most-once:** a message published while nobody listens is gone;
//!   a subscriber whose queue is full loses the message.
//! - **No persistence, no redelivery.**
//! - Subscriptions are released on `unsubscribe` or when the handle drops.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod channel;
pub mod envelope;
pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use channel::{
    failure_channel, request_channel, request_pattern, success_channel, validate_event_name,
    ChannelKind, ChannelName, ChannelPattern,
};
pub use envelope::{codes, Envelope, EnvelopeError, Failure};
pub use publisher::{BrokerTransport, InMemoryBroker, TransportError};
pub use subscriber::{BusMessage, ReleaseHook, Subscription, SubscriptionError, SubscriptionId};

/// Maximum messages buffered per subscription before new ones are dropped.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
