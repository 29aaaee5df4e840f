//! # People Relay Node
//!
//! Entry point: initialize logging, load configuration from the
//! environment, run until Ctrl+C.

use anyhow::Result;
use node_runtime::{load_config, NodeRuntime};
use relay_telemetry::{init_telemetry, TelemetryConfig};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let _telemetry = init_telemetry(TelemetryConfig::from_env())?;

    let config = load_config();
    let mut runtime = NodeRuntime::new(config)?;
    runtime.start().await?;

    info!("Relay is running. Press Ctrl+C to stop.");
    let served = tokio::select! {
        result = runtime.serve() => result,
        signal = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
            signal.map_err(Into::into)
        }
    };

    runtime.shutdown().await;

    if let Err(e) = &served {
        error!(error = %e, "Relay stopped with an error");
    }
    served
}
