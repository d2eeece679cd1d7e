//! Connection limits configuration.

use serde::Deserialize;

/// Connection limits configuration.
///
/// Caps are checked on every stream registration. A rejected client gets a
/// 503 and is expected to retry later.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Maximum concurrent streams across all stores (default: 500).
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Maximum concurrent streams for a single store (default: 50).
    /// Several tabs of the same user each count.
    #[serde(default = "default_max_connections_per_store")]
    pub max_connections_per_store: usize,
    /// Frames buffered per stream before the client is considered gone (default: 64).
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            max_connections_per_store: default_max_connections_per_store(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

fn default_max_connections() -> usize {
    500
}

fn default_max_connections_per_store() -> usize {
    50
}

fn default_channel_capacity() -> usize {
    64
}
