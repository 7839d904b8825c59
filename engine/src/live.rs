//! LiveCollection - the state owned by one synchronizer.
//!
//! A live collection keeps the confirmed state (initial fetch plus remote
//! change events) apart from the optimistic mutations issued locally. The
//! view shown to observers is the confirmed state with every pending
//! mutation applied on top, in issue order.
//!
//! Keeping the two apart gives the properties the synchronizer needs:
//! - rolling back a rejected mutation restores exactly what was shown before,
//!   plus any remote events that arrived meanwhile
//! - a remote event for an id drops the pending mutations for that id, so
//!   confirmed state always supersedes optimistic state
//! - events that arrive before the initial fetch are replayed over its result

use crate::{
    ChangeEvent, Collection, CollectionSnapshot, FailureKind, MergeStrategy, Mutation, Reconciler,
    Record, ResourceName, Revision, SyncFailure,
};
use serde::{Deserialize, Serialize};

/// Identifies one optimistic mutation until it is confirmed or rolled back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IntentTicket(pub u64);

impl std::fmt::Display for IntentTicket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A mutation shown optimistically, waiting for the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingIntent {
    pub ticket: IntentTicket,
    pub mutation: Mutation,
}

/// Load state of the initial fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadStatus {
    /// Fetch in flight
    Loading,
    /// Fetch resolved
    Ready,
    /// Fetch failed; waiting for the owner to retry
    Failed,
}

/// Confirmed state, optimistic overlays, and load bookkeeping for one resource.
#[derive(Debug, Clone)]
pub struct LiveCollection {
    resource: ResourceName,
    reconciler: Reconciler,
    /// Fetch result plus remote change events
    confirmed: Collection,
    /// Optimistic mutations in issue order
    pending: Vec<PendingIntent>,
    /// Remote events seen while the fetch is in flight
    buffer: Vec<ChangeEvent>,
    status: LoadStatus,
    stale: bool,
    last_error: Option<SyncFailure>,
    next_ticket: u64,
    revision: Revision,
}

impl LiveCollection {
    /// Create an empty collection in the loading state.
    pub fn new(resource: impl Into<ResourceName>, strategy: MergeStrategy) -> Self {
        Self {
            resource: resource.into(),
            reconciler: Reconciler::new(strategy),
            confirmed: Collection::new(),
            pending: Vec::new(),
            buffer: Vec::new(),
            status: LoadStatus::Loading,
            stale: false,
            last_error: None,
            next_ticket: 0,
            revision: 0,
        }
    }

    /// Start counting revisions at `revision` instead of zero.
    ///
    /// Used when a resource is restarted, so its snapshots keep ordering
    /// after everything the previous run published.
    pub fn starting_at(mut self, revision: Revision) -> Self {
        self.revision = revision;
        self
    }

    /// Get the resource name.
    pub fn resource(&self) -> &ResourceName {
        &self.resource
    }

    /// Get the load status.
    pub fn status(&self) -> LoadStatus {
        self.status
    }

    /// Whether the change feed dropped.
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Most recent failure.
    pub fn last_error(&self) -> Option<&SyncFailure> {
        self.last_error.as_ref()
    }

    /// Current revision.
    pub fn revision(&self) -> Revision {
        self.revision
    }

    /// Confirmed state, without optimistic overlays.
    pub fn confirmed(&self) -> &Collection {
        &self.confirmed
    }

    /// Mutations still awaiting confirmation.
    pub fn pending(&self) -> &[PendingIntent] {
        &self.pending
    }

    /// Events buffered for replay over the fetch result.
    pub fn buffered(&self) -> &[ChangeEvent] {
        &self.buffer
    }

    /// Apply a remote change event.
    ///
    /// The event is visible immediately. While the fetch is in flight it is
    /// also kept for replay. Pending mutations for the same id are dropped.
    pub fn apply_remote(&mut self, event: ChangeEvent) {
        let id = event.record_id().clone();
        self.reconciler
            .apply_change_in_place(&mut self.confirmed, &event);
        self.pending.retain(|p| p.mutation.record_id() != &id);
        if self.status == LoadStatus::Loading {
            self.buffer.push(event);
        }
        self.bump();
    }

    /// The initial fetch resolved.
    ///
    /// Buffered events are replayed over the fetched records, so state pushed
    /// during the fetch wins over a possibly older fetch result.
    pub fn load(&mut self, records: Vec<Record>) {
        let fetched = Collection::from_records(records);
        let buffered = std::mem::take(&mut self.buffer);
        self.confirmed = self.reconciler.fold(&fetched, &buffered);
        self.status = LoadStatus::Ready;
        if matches!(&self.last_error, Some(f) if f.kind == FailureKind::Fetch) {
            self.last_error = None;
        }
        self.bump();
    }

    /// The initial fetch failed. Data already shown is kept.
    pub fn fail_load(&mut self, message: impl Into<String>) {
        self.buffer.clear();
        self.status = LoadStatus::Failed;
        self.last_error = Some(SyncFailure::new(FailureKind::Fetch, message));
        self.bump();
    }

    /// A new fetch was started.
    pub fn begin_reload(&mut self) {
        self.buffer.clear();
        self.status = LoadStatus::Loading;
        self.bump();
    }

    /// Show a mutation optimistically.
    pub fn apply_local(&mut self, mutation: Mutation) -> IntentTicket {
        self.next_ticket += 1;
        let ticket = IntentTicket(self.next_ticket);
        self.pending.push(PendingIntent { ticket, mutation });
        self.bump();
        ticket
    }

    /// The backend confirmed a mutation and returned the resulting record.
    ///
    /// If a remote event for the same id already superseded the mutation,
    /// the remote state stands and this is a no-op. Returns whether the
    /// ticket was still pending.
    pub fn acknowledge(&mut self, ticket: IntentTicket, confirmed: Record) -> bool {
        let Some(intent) = self.take_pending(ticket) else {
            return false;
        };
        let event = match intent.mutation {
            Mutation::Delete { id } => ChangeEvent::Deleted(id),
            _ => ChangeEvent::Updated(confirmed),
        };
        self.reconciler
            .apply_change_in_place(&mut self.confirmed, &event);
        self.bump();
        true
    }

    /// The backend rejected a mutation; drop its optimistic overlay.
    ///
    /// Returns whether the ticket was still pending.
    pub fn rollback(&mut self, ticket: IntentTicket, message: impl Into<String>) -> bool {
        let removed = self.take_pending(ticket).is_some();
        self.last_error = Some(SyncFailure::new(FailureKind::Mutation, message));
        self.bump();
        removed
    }

    /// The change feed stopped. Data is kept but flagged as possibly stale.
    pub fn mark_stale(&mut self, message: impl Into<String>) {
        self.stale = true;
        self.last_error = Some(SyncFailure::new(FailureKind::Feed, message));
        self.bump();
    }

    /// The records as shown: confirmed state with pending mutations on top.
    pub fn view(&self) -> Collection {
        let mut view = self.confirmed.clone();
        for intent in &self.pending {
            self.reconciler
                .apply_mutation_in_place(&mut view, &intent.mutation);
        }
        view
    }

    /// Observer snapshot of the current state.
    pub fn snapshot(&self) -> CollectionSnapshot {
        CollectionSnapshot {
            resource: self.resource.clone(),
            records: self.view().into(),
            is_loading: self.status == LoadStatus::Loading,
            stale: self.stale,
            last_error: self.last_error.clone(),
            pending: self.pending.len(),
            revision: self.revision,
        }
    }

    fn take_pending(&mut self, ticket: IntentTicket) -> Option<PendingIntent> {
        let pos = self.pending.iter().position(|p| p.ticket == ticket)?;
        Some(self.pending.remove(pos))
    }

    fn bump(&mut self) {
        self.revision += 1;
    }
}
