//! Push connections and their transport.
//!
//! A [`Connection`] is one open event stream held by a browser tab. The
//! registry owns it for its whole lifetime and only ever writes frames to it
//! through its [`EventSink`].

use crate::error::SinkError;
use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;

/// Unique identifier of a push connection.
///
/// Clients may pick their own (so later mutation requests can name
/// themselves for exclusion); otherwise the server generates a UUID v4.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// The identifier as sent to clients.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ConnectionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for ConnectionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Identifies one registration of a connection.
///
/// A client that reconnects with the same [`ConnectionId`] gets a new token,
/// so teardown of the old stream cannot remove the new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistrationToken(u64);

impl RegistrationToken {
    /// Token of a connection the registry has not accepted.
    pub(super) const UNASSIGNED: Self = Self(0);

    pub(super) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

/// Write half of a connection's transport.
///
/// `write` must not block: it is called with the registry lock held.
pub trait EventSink: Send + Sync {
    /// Write one already-framed event.
    fn write(&self, frame: &str) -> Result<(), SinkError>;
}

/// Sink feeding a streaming HTTP response body through a bounded channel.
///
/// A full buffer means the client stopped reading; it is reported as a
/// failure so the registry drops the connection instead of queueing forever.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<Bytes>,
}

impl ChannelSink {
    /// Create a sink and the receiver the response body drains.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn write(&self, frame: &str) -> Result<(), SinkError> {
        self.tx
            .try_send(Bytes::copy_from_slice(frame.as_bytes()))
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => SinkError::Full,
                mpsc::error::TrySendError::Closed(_) => SinkError::Closed,
            })
    }
}

/// One live push connection.
pub struct Connection {
    pub id: ConnectionId,
    pub store_id: String,
    pub user_id: String,
    pub user_name: Option<String>,
    pub connected_at: DateTime<Utc>,
    /// Assigned by the registry on acceptance.
    pub(super) token: RegistrationToken,
    sink: Box<dyn EventSink>,
}

impl Connection {
    pub fn new(
        id: ConnectionId,
        store_id: impl Into<String>,
        user_id: impl Into<String>,
        user_name: Option<String>,
        sink: impl EventSink + 'static,
    ) -> Self {
        Self {
            id,
            store_id: store_id.into(),
            user_id: user_id.into(),
            user_name,
            connected_at: Utc::now(),
            token: RegistrationToken::UNASSIGNED,
            sink: Box::new(sink),
        }
    }

    /// Write a frame to this connection's sink.
    #[inline]
    pub fn send(&self, frame: &str) -> Result<(), SinkError> {
        self.sink.write(frame)
    }

    /// Snapshot of this connection without its transport.
    pub fn info(&self) -> ConnectionInfo {
        ConnectionInfo {
            client_id: self.id.clone(),
            user_id: self.user_id.clone(),
            user_name: self.user_name.clone(),
            connected_at: self.connected_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("store_id", &self.store_id)
            .field("user_id", &self.user_id)
            .field("user_name", &self.user_name)
            .field("connected_at", &self.connected_at)
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}

/// Public view of a registered connection, as listed per store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    pub client_id: ConnectionId,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    pub connected_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique() {
        let a = ConnectionId::generate();
        let b = ConnectionId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn test_channel_sink_delivers_frames() {
        let (sink, mut rx) = ChannelSink::new(4);
        sink.write("data: {}\n\n").unwrap();
        assert_eq!(rx.try_recv().unwrap(), Bytes::from_static(b"data: {}\n\n"));
    }

    #[test]
    fn test_channel_sink_full_and_closed() {
        let (sink, rx) = ChannelSink::new(1);
        sink.write("one").unwrap();
        assert_eq!(sink.write("two"), Err(SinkError::Full));

        drop(rx);
        assert_eq!(sink.write("three"), Err(SinkError::Closed));
    }

    #[test]
    fn test_info_omits_transport() {
        let (sink, _rx) = ChannelSink::new(1);
        let conn = Connection::new("c1".into(), "s1", "u1", Some("Dana".into()), sink);
        let info = conn.info();
        assert_eq!(info.client_id.as_str(), "c1");
        assert_eq!(info.user_name.as_deref(), Some("Dana"));
        assert!(DateTime::parse_from_rfc3339(&info.connected_at).is_ok());

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["clientId"], "c1");
        assert_eq!(json["userId"], "u1");
    }
}
