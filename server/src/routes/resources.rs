//! Resource endpoint routes.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use livesync_engine::CollectionSnapshot;

use crate::auth::AuthUser;
use crate::error::Result;
use crate::handlers::{
    get_snapshot, handle_mutation, handle_refetch, handle_restart, list_resources,
    MutationRequest, MutationResponse, ResourceSummary,
};
use crate::AppState;

/// Create resource routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/resources", get(list_handler))
        .route("/resources/{name}", get(snapshot_handler))
        .route("/resources/{name}/mutations", post(mutation_handler))
        .route("/resources/{name}/refetch", post(refetch_handler))
        .route("/resources/{name}/restart", post(restart_handler))
}

/// GET /resources - List synchronized resources.
async fn list_handler(State(state): State<AppState>) -> Json<Vec<ResourceSummary>> {
    Json(list_resources(&state.coordinator))
}

/// GET /resources/{name} - Current snapshot of a resource.
async fn snapshot_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<CollectionSnapshot>> {
    Ok(Json(get_snapshot(&state.coordinator, &name)?))
}

/// POST /resources/{name}/mutations - Apply a mutation.
async fn mutation_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(name): Path<String>,
    Json(request): Json<MutationRequest>,
) -> Result<Json<MutationResponse>> {
    tracing::debug!(resource = %name, anonymous = auth.is_anonymous(), "mutation request");
    let response = handle_mutation(&state.coordinator, &name, request).await?;
    Ok(Json(response))
}

/// POST /resources/{name}/refetch - Re-run the initial fetch.
async fn refetch_handler(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(name): Path<String>,
) -> Result<StatusCode> {
    handle_refetch(&state.coordinator, &name)?;
    Ok(StatusCode::ACCEPTED)
}

/// POST /resources/{name}/restart - Restart a resource, resubscribing its feed.
async fn restart_handler(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(name): Path<String>,
) -> Result<StatusCode> {
    handle_restart(&state.coordinator, &name).await?;
    Ok(StatusCode::ACCEPTED)
}
