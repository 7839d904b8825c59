//! HTTP route definitions.

mod health;
mod resources;
mod ws;

use crate::AppState;
use axum::Router;

pub use health::HealthResponse;

/// Create all application routes.
pub fn create_routes() -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .merge(resources::routes())
        .merge(ws::routes())
}
