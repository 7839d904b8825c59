//! Local mutation intents.
//!
//! Changes issued by the current actor are expressed as mutations, not direct
//! edits. They are shown optimistically and either confirmed or rolled back
//! once the backend answers.

use crate::{FieldMap, Record, RecordId, ResourceName};
use serde::{Deserialize, Serialize};

/// A requested change to one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Mutation {
    /// Create a new record
    Create { record: Record },
    /// Replace an existing record wholesale
    Update { record: Record },
    /// Overlay some fields on an existing record
    Patch { id: RecordId, fields: FieldMap },
    /// Remove a record
    Delete { id: RecordId },
}

impl Mutation {
    /// Create mutation for `record`.
    pub fn create(record: Record) -> Self {
        Mutation::Create { record }
    }

    /// Update mutation for `record`.
    pub fn update(record: Record) -> Self {
        Mutation::Update { record }
    }

    /// Patch mutation for the record with `id`.
    pub fn patch(id: impl Into<RecordId>, fields: FieldMap) -> Self {
        Mutation::Patch {
            id: id.into(),
            fields,
        }
    }

    /// Delete mutation for the record with `id`.
    pub fn delete(id: impl Into<RecordId>) -> Self {
        Mutation::Delete { id: id.into() }
    }

    /// Get the record ID this mutation targets.
    pub fn record_id(&self) -> &RecordId {
        match self {
            Mutation::Create { record } | Mutation::Update { record } => &record.id,
            Mutation::Patch { id, .. } | Mutation::Delete { id } => id,
        }
    }

    /// Short name of the mutation kind, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Mutation::Create { .. } => "create",
            Mutation::Update { .. } => "update",
            Mutation::Patch { .. } => "patch",
            Mutation::Delete { .. } => "delete",
        }
    }
}

/// A mutation addressed to a resource, awaiting remote confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationIntent {
    /// Target resource
    pub resource: ResourceName,
    /// The requested change
    pub mutation: Mutation,
}

impl MutationIntent {
    /// Create a new intent.
    pub fn new(resource: impl Into<ResourceName>, mutation: Mutation) -> Self {
        Self {
            resource: resource.into(),
            mutation,
        }
    }

    /// Get the record ID this intent targets.
    pub fn record_id(&self) -> &RecordId {
        self.mutation.record_id()
    }
}
