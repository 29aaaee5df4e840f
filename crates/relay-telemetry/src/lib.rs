//! # Relay Telemetry
//!
//! Structured logging for the people relay, on `tracing` and
//! `tracing-subscriber`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use relay_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let _guard = init_telemetry(TelemetryConfig::from_env())?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `OTEL_SERVICE_NAME` | `people-relay` | Service name in logs |
//! | `RELAY_LOG_LEVEL` | `info` | Log filter, falls back to `RUST_LOG` |
//! | `RELAY_JSON_LOGS` | `false` | JSON lines instead of pretty output |
//! | `RELAY_CONSOLE_OUTPUT` | `true` | Disable to silence stdout |

mod config;
mod tracing_setup;

pub use config::{TelemetryConfig, DEFAULT_SERVICE_NAME};
pub use tracing_setup::{build_filter, init_tracing};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Invalid log filter: {0}")]
    Filter(String),

    #[error("Global subscriber already set: {0}")]
    AlreadyInitialized(String),
}

/// Install the global subscriber for the process.
///
/// Returns a guard that logs shutdown when dropped; hold it for the life of
/// the application.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    tracing_setup::init_tracing(&config)?;
    Ok(TelemetryGuard {
        service_name: config.service_name,
    })
}

pub struct TelemetryGuard {
    service_name: String,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service_name, "Shutting down telemetry");
    }
}
