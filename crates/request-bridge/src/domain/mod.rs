//! Domain types for the bridge: tokens, the correlation table, errors and
//! configuration.

pub mod config;
pub mod error;
pub mod pending;
pub mod token;

// Re-exports for convenience
pub use config::{BridgeConfig, ConfigError};
pub use error::{BridgeError, BridgeResult};
pub use pending::{CorrelationTable, Expired, Settled, Settlement, TableStats};
pub use token::RequestToken;
