//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Core config struct definitions (Config, ServerConfig, ListenConfig)
//! - [`limits`]: Connection caps and per-connection buffering (LimitsConfig)
//! - [`validation`]: Startup checks run before the server binds

mod limits;
mod types;
mod validation;

pub use limits::LimitsConfig;
pub use types::Config;
pub use validation::validate;
