//! Ports for the people service.

pub mod outbound;

pub use outbound::KeyValueStore;
