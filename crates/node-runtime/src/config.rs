//! # Node Configuration
//!
//! Defaults overridden from `RELAY_*` environment variables. Values that
//! fail to parse are logged and ignored.

use request_bridge::BridgeConfig;
use serde::{Deserialize, Serialize};
use std::net::{AddrParseError, IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{info, warn};

/// Complete node configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// HTTP listener.
    pub http: HttpConfig,
    /// Request bridge timeouts and queue sizes.
    pub bridge: BridgeConfig,
    /// JSON file with the initial user records, written only to an empty store.
    pub seed_file: Option<PathBuf>,
    /// HTTP endpoint serving the initial records. Used when no seed file is set.
    pub seed_url: Option<String>,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl HttpConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, AddrParseError> {
        let ip = IpAddr::from_str(&self.host)?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Load configuration from the process environment.
pub fn load_config() -> NodeConfig {
    load_config_from(|key| std::env::var(key).ok())
}

/// Load configuration from an explicit variable source.
pub fn load_config_from<F>(lookup: F) -> NodeConfig
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = NodeConfig::default();

    if let Some(host) = lookup("RELAY_HTTP_HOST") {
        config.http.host = host;
    }
    if let Some(port) = parsed(&lookup, "RELAY_HTTP_PORT") {
        config.http.port = port;
    }
    if let Some(timeout_ms) = parsed(&lookup, "RELAY_TIMEOUT_MS") {
        config.bridge.default_timeout_ms = timeout_ms;
    }
    if let Some(capacity) = parsed(&lookup, "RELAY_CHANNEL_CAPACITY") {
        config.bridge.channel_capacity = capacity;
    }
    if let Some(path) = lookup("RELAY_SEED_FILE") {
        info!(path = %path, "Using seed file from environment");
        config.seed_file = Some(PathBuf::from(path));
    }
    if let Some(url) = lookup("RELAY_SEED_URL") {
        info!(url = %url, "Using seed URL from environment");
        config.seed_url = Some(url);
    }

    config
}

fn parsed<F, T>(lookup: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let raw = lookup(key)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key = key, value = %raw, "Ignoring unparsable environment value");
            None
        }
    }
}
