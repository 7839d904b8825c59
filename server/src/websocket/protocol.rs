//! WebSocket message protocol definitions.
//!
//! All messages are JSON-encoded and use snake_case for field names.

use livesync_engine::{CollectionSnapshot, Record};
use serde::{Deserialize, Serialize};

use crate::handlers::MutationRequest;

/// Messages sent from client to server.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Start receiving snapshots of a resource.
    Subscribe {
        resource: String,
        /// Request ID for correlating responses
        #[serde(default)]
        request_id: Option<String>,
    },

    /// Stop receiving snapshots of a resource.
    Unsubscribe {
        resource: String,
        #[serde(default)]
        request_id: Option<String>,
    },

    /// Apply a mutation to a resource.
    Mutate {
        resource: String,
        mutation: MutationRequest,
        #[serde(default)]
        request_id: Option<String>,
    },

    /// Re-run the initial fetch of a resource.
    Refetch {
        resource: String,
        #[serde(default)]
        request_id: Option<String>,
    },

    /// Keep-alive ping.
    Ping,
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Current state of a subscribed resource.
    /// Pushed after every change and once on subscribe.
    Snapshot { snapshot: CollectionSnapshot },

    /// Acknowledges subscribe, unsubscribe and refetch requests.
    Ack {
        resource: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },

    /// Outcome of a mutation request.
    MutationResult {
        resource: String,
        ok: bool,
        /// The confirmed record on success
        #[serde(skip_serializing_if = "Option::is_none")]
        record: Option<Record>,
        /// Why the backend rejected the mutation
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },

    /// Response to ping.
    Pong,

    /// Error message.
    Error {
        /// Error description
        message: String,
        /// Request ID from the original request (if applicable)
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },
}

impl ServerMessage {
    /// Create an error message.
    pub fn error(message: impl Into<String>, request_id: Option<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
            request_id,
        }
    }

    /// Create a snapshot push.
    pub fn snapshot(snapshot: CollectionSnapshot) -> Self {
        ServerMessage::Snapshot { snapshot }
    }

    pub fn ack(resource: impl Into<String>, request_id: Option<String>) -> Self {
        ServerMessage::Ack {
            resource: resource.into(),
            request_id,
        }
    }
}
