//! Resource request handlers.
//!
//! Shared by the HTTP routes and the WebSocket protocol.

use livesync_engine::{CollectionSnapshot, FieldMap, Mutation, Record, RecordId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::sync::Coordinator;

/// A mutation as sent by clients.
///
/// Rows are plain JSON objects, as the backend stores them; ids may be
/// numbers or strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MutationRequest {
    Create { row: Value },
    Update { row: Value },
    Patch { id: Value, fields: FieldMap },
    Delete { id: Value },
}

impl MutationRequest {
    /// Turn the request into an engine mutation.
    pub fn into_mutation(self, id_field: &str) -> Result<Mutation> {
        Ok(match self {
            MutationRequest::Create { row } => Mutation::create(Record::from_row(&row, id_field)?),
            MutationRequest::Update { row } => Mutation::update(Record::from_row(&row, id_field)?),
            MutationRequest::Patch { id, fields } => {
                Mutation::patch(record_id(id, id_field)?, fields)
            }
            MutationRequest::Delete { id } => Mutation::delete(record_id(id, id_field)?),
        })
    }
}

fn record_id(id: Value, id_field: &str) -> Result<RecordId> {
    let mut row = FieldMap::new();
    row.insert(id_field.to_string(), id);
    Ok(Record::from_row(&Value::Object(row), id_field)?.id)
}

/// Response to an accepted mutation.
#[derive(Debug, Serialize, Deserialize)]
pub struct MutationResponse {
    pub resource: String,
    pub record: Record,
}

/// Summary of one resource for listings.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSummary {
    pub name: String,
    pub table: String,
    pub records: usize,
    pub is_loading: bool,
    pub stale: bool,
    pub pending: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// List every running resource.
pub fn list_resources(coordinator: &Coordinator) -> Vec<ResourceSummary> {
    coordinator
        .resources()
        .into_iter()
        .filter_map(|name| coordinator.handle(&name).ok())
        .map(|sync| {
            let snapshot = sync.snapshot();
            ResourceSummary {
                name: sync.resource().to_string(),
                table: sync.config().table.clone(),
                records: snapshot.records.len(),
                is_loading: snapshot.is_loading,
                stale: snapshot.stale,
                pending: snapshot.pending,
                last_error: snapshot.last_error.as_ref().map(|f| f.message.clone()),
            }
        })
        .collect()
}

/// Latest snapshot of one resource.
pub fn get_snapshot(coordinator: &Coordinator, resource: &str) -> Result<CollectionSnapshot> {
    let sync = coordinator.handle(resource)?;
    Ok(sync.snapshot().as_ref().clone())
}

/// Apply a client mutation through the resource's synchronizer.
pub async fn handle_mutation(
    coordinator: &Coordinator,
    resource: &str,
    request: MutationRequest,
) -> Result<MutationResponse> {
    let sync = coordinator.handle(resource)?;
    let mutation = request.into_mutation(&sync.config().id_field)?;

    tracing::debug!(
        resource = %resource,
        record_id = %mutation.record_id(),
        kind = mutation.kind(),
        "Processing mutation"
    );

    let record = sync.apply_mutation(mutation).await?;

    Ok(MutationResponse {
        resource: resource.to_string(),
        record,
    })
}

/// Re-run a resource's initial fetch.
pub fn handle_refetch(coordinator: &Coordinator, resource: &str) -> Result<()> {
    coordinator.handle(resource)?.refetch()?;
    Ok(())
}

/// Restart a resource, resubscribing its change feed.
pub async fn handle_restart(coordinator: &Coordinator, resource: &str) -> Result<()> {
    coordinator.restart(resource).await?;
    Ok(())
}
