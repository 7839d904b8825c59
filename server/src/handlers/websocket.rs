//! WebSocket handler for live dashboards.
//!
//! Handles WebSocket connections, dispatches client requests to the resource
//! handlers and relays snapshot pushes from the connection manager.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::sync::Coordinator;
use crate::websocket::{ClientMessage, ConnectionManager, ServerMessage};

use super::{get_snapshot, handle_mutation, handle_refetch};

/// Handle an established WebSocket connection.
///
/// This function:
/// 1. Registers the connection with the manager
/// 2. Spawns a task to forward outgoing messages
/// 3. Processes incoming messages in a loop
/// 4. Cleans up on disconnect
pub async fn handle_websocket_connection(
    socket: WebSocket,
    coordinator: Arc<Coordinator>,
    conn_manager: Arc<ConnectionManager>,
) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Create channel for sending messages to this connection
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    let conn_id = conn_manager.register(tx);

    tracing::info!(conn_id = %conn_id, "WebSocket client connected");

    // Spawn task to forward messages from channel to WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(text) => {
                    if let Err(e) = ws_sender.send(Message::Text(text.into())).await {
                        tracing::warn!("Failed to send WebSocket message: {}", e);
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!("Failed to serialize WebSocket message: {}", e);
                }
            }
        }
    });

    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(Message::Text(text)) => {
                let response = process_message(&text, &coordinator, &conn_manager, &conn_id).await;
                conn_manager.send_to(&conn_id, response);
            }
            Ok(Message::Binary(_)) => {
                tracing::warn!("Binary messages not supported");
            }
            Ok(Message::Ping(data)) => {
                tracing::trace!("Received ping: {} bytes", data.len());
            }
            Ok(Message::Pong(_)) => {
                tracing::trace!("Received pong");
            }
            Ok(Message::Close(_)) => {
                tracing::info!(conn_id = %conn_id, "WebSocket close frame received");
                break;
            }
            Err(e) => {
                tracing::warn!(conn_id = %conn_id, "WebSocket error: {}", e);
                break;
            }
        }
    }

    conn_manager.unregister(&conn_id);
    send_task.abort();

    tracing::info!(
        conn_id = %conn_id,
        active_connections = conn_manager.connection_count(),
        "WebSocket client disconnected"
    );
}

/// Process a client message and return the direct response.
///
/// Snapshot pushes for subscribed resources travel separately, through the
/// connection manager.
pub async fn process_message(
    text: &str,
    coordinator: &Coordinator,
    conn_manager: &ConnectionManager,
    conn_id: &str,
) -> ServerMessage {
    let client_msg: ClientMessage = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            return ServerMessage::error(format!("Invalid message format: {}", e), None);
        }
    };

    match client_msg {
        ClientMessage::Subscribe {
            resource,
            request_id,
        } => {
            // Subscribe before reading the current state so no change falls
            // in between; clients keep the snapshot with the highest revision.
            conn_manager.subscribe(conn_id, &resource);
            match get_snapshot(coordinator, &resource) {
                Ok(snapshot) => {
                    conn_manager.send_to(conn_id, ServerMessage::snapshot(snapshot));
                    ServerMessage::ack(resource, request_id)
                }
                Err(e) => {
                    conn_manager.unsubscribe(conn_id, &resource);
                    ServerMessage::error(e.to_string(), request_id)
                }
            }
        }

        ClientMessage::Unsubscribe {
            resource,
            request_id,
        } => {
            conn_manager.unsubscribe(conn_id, &resource);
            ServerMessage::ack(resource, request_id)
        }

        ClientMessage::Mutate {
            resource,
            mutation,
            request_id,
        } => match handle_mutation(coordinator, &resource, mutation).await {
            Ok(response) => ServerMessage::MutationResult {
                resource,
                ok: true,
                record: Some(response.record),
                error: None,
                request_id,
            },
            Err(e) => ServerMessage::MutationResult {
                resource,
                ok: false,
                record: None,
                error: Some(e.to_string()),
                request_id,
            },
        },

        ClientMessage::Refetch {
            resource,
            request_id,
        } => match handle_refetch(coordinator, &resource) {
            Ok(()) => ServerMessage::ack(resource, request_id),
            Err(e) => ServerMessage::error(e.to_string(), request_id),
        },

        ClientMessage::Ping => ServerMessage::Pong,
    }
}
