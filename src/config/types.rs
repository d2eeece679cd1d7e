//! Core configuration types and loading.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;

use super::limits::LimitsConfig;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Service identity and auxiliary listeners.
    pub server: ServerConfig,
    /// API listen configuration.
    pub listen: ListenConfig,
    /// Connection caps (global, per store) and stream buffering.
    #[serde(default)]
    pub limits: LimitsConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

/// Metrics port used when `server.metrics_port` is not set.
pub const DEFAULT_METRICS_PORT: u16 = 9090;

/// Service identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Instance name, reported in logs and on `/health`.
    pub name: String,
    /// Prometheus metrics HTTP port (default: 9090, 0 disables).
    pub metrics_port: Option<u16>,
}

impl ServerConfig {
    /// Effective metrics port. `metrics_port = 0` disables the endpoint (used by tests).
    pub fn effective_metrics_port(&self) -> Option<u16> {
        match self.metrics_port.unwrap_or(DEFAULT_METRICS_PORT) {
            0 => None,
            port => Some(port),
        }
    }
}

/// API listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ListenConfig {
    /// Address to bind to (e.g., "0.0.0.0:8080").
    pub address: SocketAddr,
}
