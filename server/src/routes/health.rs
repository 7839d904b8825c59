//! Health check endpoint.

use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::AppState;

/// Health check response.
#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Resources being synchronized
    pub resources: usize,
    /// Resources whose change feed dropped
    pub stale: usize,
    /// Open WebSocket connections
    pub connections: usize,
    pub time: DateTime<Utc>,
}

/// Create health routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/", get(root))
}

/// Health check handler.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let snapshots = state.coordinator.snapshots();
    let stale = snapshots.iter().filter(|s| s.stale).count();

    Json(HealthResponse {
        status: if stale == 0 { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        resources: snapshots.len(),
        stale,
        connections: state.conn_manager.connection_count(),
        time: Utc::now(),
    })
}

/// Root handler.
async fn root() -> &'static str {
    "Livesync Server"
}
