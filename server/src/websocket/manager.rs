//! WebSocket connection manager.
//!
//! Tracks active WebSocket connections and the resources each one follows,
//! and pushes snapshots to them. Registered with the coordinator as an
//! observer of every resource.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use livesync_engine::CollectionSnapshot;
use tokio::sync::mpsc;

use super::ServerMessage;
use crate::sync::Observer;

/// Sender for WebSocket messages.
pub type MessageSender = mpsc::UnboundedSender<ServerMessage>;

/// A single WebSocket connection.
#[derive(Debug)]
pub struct Connection {
    /// Unique identifier for this connection
    pub id: String,
    /// Channel to send messages to this connection
    pub sender: MessageSender,
    pub connected_at: DateTime<Utc>,
}

/// Manages active WebSocket connections.
///
/// Thread-safe and can be shared across handlers via `Arc`.
#[derive(Debug, Default)]
pub struct ConnectionManager {
    /// All active connections, keyed by connection ID.
    connections: DashMap<String, Connection>,
    /// Connection IDs following each resource.
    by_resource: DashMap<String, Vec<String>>,
}

impl ConnectionManager {
    /// Create a new connection manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new connection manager wrapped in Arc for sharing.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Register a new connection.
    ///
    /// Returns the connection ID.
    pub fn register(&self, sender: MessageSender) -> String {
        let conn_id = uuid::Uuid::new_v4().to_string();

        self.connections.insert(
            conn_id.clone(),
            Connection {
                id: conn_id.clone(),
                sender,
                connected_at: Utc::now(),
            },
        );

        tracing::info!(conn_id = %conn_id, "WebSocket connection registered");

        conn_id
    }

    /// Unregister a connection and drop all of its subscriptions.
    pub fn unregister(&self, conn_id: &str) {
        if let Some((_, conn)) = self.connections.remove(conn_id) {
            self.by_resource.retain(|_, conn_ids| {
                conn_ids.retain(|id| id != conn_id);
                !conn_ids.is_empty()
            });

            let duration = Utc::now() - conn.connected_at;
            tracing::info!(
                conn_id = %conn_id,
                connected_secs = duration.num_seconds(),
                "WebSocket connection unregistered"
            );
        }
    }

    /// Follow a resource. Returns false for unknown connections.
    pub fn subscribe(&self, conn_id: &str, resource: &str) -> bool {
        if !self.connections.contains_key(conn_id) {
            return false;
        }

        let mut conn_ids = self.by_resource.entry(resource.to_string()).or_default();
        if !conn_ids.iter().any(|id| id == conn_id) {
            conn_ids.push(conn_id.to_string());
        }

        tracing::debug!(conn_id = %conn_id, resource = %resource, "connection subscribed");
        true
    }

    /// Stop following a resource.
    pub fn unsubscribe(&self, conn_id: &str, resource: &str) {
        if let Some(mut conn_ids) = self.by_resource.get_mut(resource) {
            conn_ids.retain(|id| id != conn_id);
            // Clean up empty entries
            if conn_ids.is_empty() {
                drop(conn_ids);
                self.by_resource.remove(resource);
            }
        }
    }

    /// Send a message to every connection following `resource`.
    ///
    /// Returns the number of connections that received the message.
    pub fn broadcast_resource(&self, resource: &str, message: ServerMessage) -> usize {
        let conn_ids = match self.by_resource.get(resource) {
            Some(ids) => ids.clone(),
            None => return 0,
        };

        let sent_count = conn_ids
            .iter()
            .filter(|id| self.send_to(id, message.clone()))
            .count();

        tracing::trace!(
            resource = %resource,
            recipients = sent_count,
            "Broadcast message to connections"
        );

        sent_count
    }

    /// Send a message to a specific connection.
    pub fn send_to(&self, conn_id: &str, message: ServerMessage) -> bool {
        if let Some(conn) = self.connections.get(conn_id) {
            conn.sender.send(message).is_ok()
        } else {
            false
        }
    }

    /// Get the number of active connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Get the number of connections following a resource.
    pub fn subscriber_count(&self, resource: &str) -> usize {
        self.by_resource
            .get(resource)
            .map(|ids| ids.len())
            .unwrap_or(0)
    }
}

impl Observer for ConnectionManager {
    fn on_update(&self, snapshot: &CollectionSnapshot) {
        self.broadcast_resource(
            &snapshot.resource,
            ServerMessage::snapshot(snapshot.clone()),
        );
    }
}
