//! Livesync Server - keeps live collections of Postgres tables in sync.
//!
//! Each configured resource is synchronized by its own task: an initial
//! fetch, a LISTEN/NOTIFY change feed and optimistic mutations are
//! reconciled with the livesync-engine rules, and every resulting snapshot
//! is pushed to WebSocket clients and exposed over HTTP.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod sync;
pub mod websocket;

use crate::config::Config;
use crate::sync::Coordinator;
use crate::websocket::ConnectionManager;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub coordinator: Arc<Coordinator>,
    pub conn_manager: Arc<ConnectionManager>,
}

/// Build the application router with its middleware.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(routes::create_routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
