//! Bridge configuration with validation.

use serde::{Deserialize, Serialize};
use shared_bus::DEFAULT_CHANNEL_CAPACITY;
use std::time::Duration;
use thiserror::Error;

/// Default time a caller waits for a reply.
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;

/// Default interval of the background timeout sweeper.
pub const DEFAULT_SWEEP_INTERVAL_MS: u64 = 1_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Timeout applied when a request does not carry its own
    pub default_timeout_ms: u64,
    /// How often the sweeper settles overdue requests
    pub sweep_interval_ms: u64,
    /// Per-subscription queue size on the in-process broker
    pub channel_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
            sweep_interval_ms: DEFAULT_SWEEP_INTERVAL_MS,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl BridgeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_timeout_ms == 0 {
            return Err(ConfigError::InvalidTimeout(
                "default_timeout_ms cannot be 0".into(),
            ));
        }
        if self.sweep_interval_ms == 0 {
            return Err(ConfigError::InvalidTimeout(
                "sweep_interval_ms cannot be 0".into(),
            ));
        }
        if self.channel_capacity == 0 {
            return Err(ConfigError::InvalidCapacity(
                "channel_capacity cannot be 0".into(),
            ));
        }
        Ok(())
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),

    #[error("invalid capacity: {0}")]
    InvalidCapacity(String),
}
