//! Integration test common infrastructure.
//!
//! Provides utilities for spawning test servers, opening event streams,
//! and publishing events.

pub mod client;
pub mod server;

#[allow(unused_imports)]
pub use client::StreamClient;
#[allow(unused_imports)]
pub use server::TestServer;
