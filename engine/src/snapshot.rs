//! Snapshot types handed to observers.
//!
//! A snapshot is a read-only copy of one resource's state at a point in
//! time. Observers never see the live collection, only snapshots of it.

use crate::{Collection, Record, ResourceName, Revision};
use serde::{Deserialize, Serialize};

/// Which input source produced a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// The initial bulk read failed
    Fetch,
    /// A local mutation was rejected by the backend
    Mutation,
    /// The change feed closed unexpectedly
    Feed,
}

/// The last failure seen by a collection, in user-displayable form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl SyncFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Observer-visible state of one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSnapshot {
    /// Resource this snapshot belongs to
    pub resource: ResourceName,
    /// Records as currently shown, optimistic changes included
    pub records: Vec<Record>,
    /// True until the initial fetch resolves; distinct from "confirmed empty"
    pub is_loading: bool,
    /// True once the change feed dropped; data may be out of date
    pub stale: bool,
    /// Most recent failure, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<SyncFailure>,
    /// Number of mutations still awaiting confirmation
    pub pending: usize,
    /// Incremented on every state transition
    pub revision: Revision,
}

impl CollectionSnapshot {
    /// Snapshot of a resource that has not loaded anything yet.
    pub fn loading(resource: impl Into<ResourceName>) -> Self {
        Self {
            resource: resource.into(),
            records: Vec::new(),
            is_loading: true,
            stale: false,
            last_error: None,
            pending: 0,
            revision: 0,
        }
    }

    /// Records as a collection, for lookups.
    pub fn collection(&self) -> Collection {
        Collection::from_records(self.records.iter().cloned())
    }

    /// Get a record by ID.
    pub fn get(&self, id: &str) -> Option<&Record> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Loaded with no records and no failure.
    pub fn is_confirmed_empty(&self) -> bool {
        !self.is_loading && self.records.is_empty() && self.last_error.is_none()
    }

    /// Whether the last failure came from the initial fetch.
    pub fn fetch_failed(&self) -> bool {
        matches!(
            self.last_error,
            Some(SyncFailure {
                kind: FailureKind::Fetch,
                ..
            })
        )
    }
}
