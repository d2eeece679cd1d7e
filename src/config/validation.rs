//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("server.name is required")]
    MissingServerName,
    #[error("limits.max_connections must be at least 1")]
    ZeroMaxConnections,
    #[error("limits.max_connections_per_store must be at least 1")]
    ZeroMaxConnectionsPerStore,
    #[error(
        "limits.max_connections_per_store ({per_store}) exceeds limits.max_connections ({global})"
    )]
    PerStoreExceedsGlobal { per_store: usize, global: usize },
    #[error("limits.channel_capacity must be at least 1")]
    ZeroChannelCapacity,
    #[error("server.metrics_port {0} collides with listen.address")]
    MetricsPortCollision(u16),
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.name.trim().is_empty() {
        errors.push(ValidationError::MissingServerName);
    }

    let limits = &config.limits;
    if limits.max_connections == 0 {
        errors.push(ValidationError::ZeroMaxConnections);
    }
    if limits.max_connections_per_store == 0 {
        errors.push(ValidationError::ZeroMaxConnectionsPerStore);
    }
    if limits.max_connections_per_store > limits.max_connections {
        errors.push(ValidationError::PerStoreExceedsGlobal {
            per_store: limits.max_connections_per_store,
            global: limits.max_connections,
        });
    }
    // try_send on a zero-capacity channel would panic at construction.
    if limits.channel_capacity == 0 {
        errors.push(ValidationError::ZeroChannelCapacity);
    }

    if let Some(port) = config.server.effective_metrics_port()
        && port == config.listen.address.port()
    {
        errors.push(ValidationError::MetricsPortCollision(port));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
