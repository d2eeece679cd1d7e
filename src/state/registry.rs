//! Connection registry and per-store broadcaster.
//!
//! The `ConnectionRegistry` owns every live push connection. It enforces the
//! global and per-store caps on registration and fans events out to the
//! connections of one store, dropping any connection whose write fails.
//!
//! # Thread Safety
//!
//! Every operation holds one mutex for its whole duration. Sink writes never
//! block and there is no await point inside the lock, so a capacity check and
//! the insertion that follows it, or a broadcast and the removals it causes,
//! are never interleaved with another operation.

use crate::config::LimitsConfig;
use crate::error::{RegisterError, SinkError};
use crate::metrics;
use crate::state::event::{StoreEvent, encode_frame};
use crate::state::{Connection, ConnectionId, ConnectionInfo, RegistrationToken};
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error, info, warn};

/// Live push connections, kept in registration order.
pub struct ConnectionRegistry {
    connections: Mutex<Vec<Connection>>,
    /// Maximum connections across all stores.
    max_connections: usize,
    /// Maximum connections for a single store.
    max_per_store: usize,
    /// Next registration token. Zero is never handed out.
    next_token: AtomicU64,
}

impl ConnectionRegistry {
    /// Default global connection cap.
    pub const DEFAULT_MAX_CONNECTIONS: usize = 500;
    /// Default per-store connection cap.
    pub const DEFAULT_MAX_PER_STORE: usize = 50;

    /// Create a registry with the default caps.
    pub fn new() -> Self {
        Self::with_limits(Self::DEFAULT_MAX_CONNECTIONS, Self::DEFAULT_MAX_PER_STORE)
    }

    /// Create a registry with custom caps.
    pub fn with_limits(max_connections: usize, max_per_store: usize) -> Self {
        Self {
            connections: Mutex::new(Vec::new()),
            max_connections,
            max_per_store,
            next_token: AtomicU64::new(1),
        }
    }

    /// Create a registry from the `[limits]` configuration table.
    pub fn from_config(limits: &LimitsConfig) -> Self {
        Self::with_limits(limits.max_connections, limits.max_connections_per_store)
    }

    /// Register a connection. Returns `false` if it was not kept.
    pub fn register(&self, connection: Connection) -> bool {
        self.try_register(connection).is_ok()
    }

    /// Register a connection, reporting why it was refused.
    ///
    /// On success a `connected` event is written to the connection before it
    /// becomes visible to broadcasts, and the token identifying this
    /// registration is returned. If that write fails the connection is
    /// dropped and `Unreachable` is returned.
    ///
    /// An id stays taken until its current registration is removed, so a
    /// client reconnecting with the same id before its old stream is torn
    /// down gets `DuplicateId`.
    pub fn try_register(
        &self,
        mut connection: Connection,
    ) -> Result<RegistrationToken, RegisterError> {
        let mut connections = self.connections.lock();

        let admitted = self
            .check_admission(&connections, &connection)
            .and_then(|()| {
                let confirmation = StoreEvent::Connected {
                    client_id: connection.id.clone(),
                };
                let frame = encode_frame(&confirmation, Utc::now())
                    .map_err(|e| RegisterError::Encode(e.to_string()))?;
                connection.send(&frame).map_err(RegisterError::from)
            });

        if let Err(e) = admitted {
            drop(connections);
            metrics::record_rejected(e.reason());
            match &e {
                RegisterError::GlobalCapacity { .. } | RegisterError::StoreCapacity { .. } => {
                    warn!(
                        client = %connection.id,
                        store = %connection.store_id,
                        user = %connection.user_id,
                        reason = e.reason(),
                        "Connection refused: {}", e
                    );
                }
                RegisterError::Unreachable(_) => {
                    metrics::record_dead_connection();
                    warn!(
                        client = %connection.id,
                        store = %connection.store_id,
                        error = %e,
                        "Connection dropped before registration"
                    );
                }
                RegisterError::DuplicateId(_) => {
                    debug!(client = %connection.id, store = %connection.store_id, "Duplicate connection id");
                }
                RegisterError::Encode(_) => {
                    error!(client = %connection.id, error = %e, "Failed to encode confirmation");
                }
            }
            return Err(e);
        }

        let token = RegistrationToken::from_raw(self.next_token.fetch_add(1, Ordering::Relaxed));
        connection.token = token;
        let (client, store, user) = (
            connection.id.clone(),
            connection.store_id.clone(),
            connection.user_id.clone(),
        );
        connections.push(connection);
        let total = connections.len();
        drop(connections);

        metrics::record_accepted(total);
        info!(client = %client, store = %store, user = %user, total, "Connection registered");
        Ok(token)
    }

    fn check_admission(
        &self,
        connections: &[Connection],
        candidate: &Connection,
    ) -> Result<(), RegisterError> {
        if connections.len() >= self.max_connections {
            return Err(RegisterError::GlobalCapacity {
                limit: self.max_connections,
            });
        }
        let in_store = connections
            .iter()
            .filter(|c| c.store_id == candidate.store_id)
            .count();
        if in_store >= self.max_per_store {
            return Err(RegisterError::StoreCapacity {
                store_id: candidate.store_id.clone(),
                limit: self.max_per_store,
            });
        }
        if connections.iter().any(|c| c.id == candidate.id) {
            return Err(RegisterError::DuplicateId(candidate.id.to_string()));
        }
        Ok(())
    }

    /// Remove a connection. Unknown ids are a no-op.
    ///
    /// Returns whether a connection was removed.
    pub fn unregister(&self, id: &ConnectionId) -> bool {
        self.remove_first(|c| &c.id == id)
    }

    /// Remove a connection only while `token` is still its registration.
    ///
    /// Used by stream teardown: once the id has been dropped and registered
    /// again, the old stream's token no longer matches and nothing is removed.
    pub fn unregister_if(&self, id: &ConnectionId, token: RegistrationToken) -> bool {
        self.remove_first(|c| &c.id == id && c.token == token)
    }

    fn remove_first(&self, matches: impl Fn(&Connection) -> bool) -> bool {
        let mut connections = self.connections.lock();
        let Some(index) = connections.iter().position(matches) else {
            return false;
        };
        let removed = connections.remove(index);
        let total = connections.len();
        drop(connections);

        metrics::set_connections(total);
        debug!(client = %removed.id, store = %removed.store_id, total, "Connection unregistered");
        true
    }

    /// Push an event to every connection of `store_id` except `exclude`.
    ///
    /// Delivery is best effort: a connection whose write fails is removed and
    /// the remaining connections still receive the event. Returns how many
    /// connections the event was written to.
    pub fn broadcast(
        &self,
        store_id: &str,
        event: &StoreEvent,
        exclude: Option<&ConnectionId>,
    ) -> usize {
        let frame = match encode_frame(event, Utc::now()) {
            Ok(frame) => frame,
            Err(e) => {
                error!(store = %store_id, event = event.kind(), error = %e, "Failed to encode event");
                return 0;
            }
        };

        let mut delivered = 0usize;
        let mut dead: Vec<(ConnectionId, SinkError)> = Vec::new();

        let mut connections = self.connections.lock();
        connections.retain(|conn| {
            if conn.store_id != store_id || exclude == Some(&conn.id) {
                return true;
            }
            match conn.send(&frame) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(e) => {
                    dead.push((conn.id.clone(), e));
                    false
                }
            }
        });
        let total = connections.len();
        drop(connections);

        for (client, e) in &dead {
            warn!(client = %client, store = %store_id, error = %e, "Dropping dead connection");
        }
        if !dead.is_empty() {
            metrics::set_connections(total);
        }
        metrics::record_broadcast(event.kind(), delivered, dead.len());
        debug!(
            store = %store_id,
            event = event.kind(),
            delivered,
            dropped = dead.len(),
            "Event broadcast"
        );
        delivered
    }

    /// Number of connections registered for a store.
    pub fn count_for_store(&self, store_id: &str) -> usize {
        self.connections
            .lock()
            .iter()
            .filter(|c| c.store_id == store_id)
            .count()
    }

    /// Connections registered for a store, in registration order.
    pub fn connections_for_store(&self, store_id: &str) -> Vec<ConnectionInfo> {
        self.connections
            .lock()
            .iter()
            .filter(|c| c.store_id == store_id)
            .map(Connection::info)
            .collect()
    }

    /// Total number of registered connections.
    pub fn len(&self) -> usize {
        self.connections.lock().len()
    }

    /// Whether no connection is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
