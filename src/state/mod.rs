//! State management module.
//!
//! Contains the connection registry and the connections and events it
//! carries.

mod connection;
pub mod event;
mod registry;

pub use connection::{ChannelSink, Connection, ConnectionId, ConnectionInfo, RegistrationToken};
pub use event::StoreEvent;
pub use registry::ConnectionRegistry;
