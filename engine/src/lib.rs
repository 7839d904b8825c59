//! # Livesync Engine
//!
//! A deterministic reconciliation core for live, push-updated collections.
//!
//! This crate keeps an in-memory ordered collection of records consistent
//! under three inputs: an initial bulk fetch, a server-pushed change stream,
//! and local optimistic mutations that are still waiting for confirmation.
//!
//! ## Design Principles
//!
//! - **No IO**: Engine has no knowledge of sockets, databases, or runtimes
//! - **Pure folds**: Every change produces a new collection, never a torn one
//! - **Testable**: Pure logic, no mocks needed
//! - **Portable**: Runs anywhere Rust runs (native, WASM, embedded)
//!
//! ## Core Concepts
//!
//! ### Records
//!
//! A [`Record`] is an immutable snapshot of one backend row: an opaque id and
//! a map of fields. Updates replace a record wholesale.
//!
//! ### Change Events
//!
//! Remote changes arrive as [`ChangeEvent`]s:
//! - [`ChangeEvent::Inserted`] - A record appeared
//! - [`ChangeEvent::Updated`] - A record was replaced
//! - [`ChangeEvent::Deleted`] - A record was removed
//!
//! Raw feed payloads ([`WireChange`]) are decoded with [`ChangeEvent::decode`];
//! payloads without a usable id are rejected before they reach a collection.
//!
//! ### Mutations
//!
//! Local actions are expressed as [`Mutation`]s wrapped in a
//! [`MutationIntent`]. They are shown optimistically until the backend
//! confirms or rejects them.
//!
//! ### Reconciliation
//!
//! The [`Reconciler`] folds events and mutations into a [`Collection`].
//! [`LiveCollection`] layers pending optimistic mutations over the confirmed
//! state so that a rejected mutation rolls back exactly, and a confirmed
//! remote event always supersedes an optimistic value for the same id.
//!
//! ## Quick Start
//!
//! ```rust
//! use livesync_engine::{ChangeEvent, LiveCollection, MergeStrategy, Mutation, Record};
//! use serde_json::json;
//!
//! let mut live = LiveCollection::new("deposits", MergeStrategy::default());
//!
//! // 1. Initial fetch resolves
//! let pending = Record::from_row(&json!({"id": 1, "status": "pending"}), "id").unwrap();
//! live.load(vec![pending.clone()]);
//!
//! // 2. Admin approves it optimistically
//! let ticket = live.apply_local(Mutation::update(pending.with_field("status", json!("approved"))));
//! assert_eq!(live.view().get("1").unwrap().get("status"), Some(&json!("approved")));
//!
//! // 3. The backend rejects it: the view reverts
//! live.rollback(ticket, "insufficient balance");
//! assert_eq!(live.view().get("1").unwrap().get("status"), Some(&json!("pending")));
//!
//! // 4. A pushed event is applied on top
//! live.apply_remote(ChangeEvent::Deleted("1".to_string()));
//! assert!(live.view().is_empty());
//! ```

pub mod collection;
pub mod error;
pub mod event;
pub mod live;
pub mod mutation;
pub mod reconcile;
pub mod record;
pub mod snapshot;

// Re-export main types at crate root
pub use collection::Collection;
pub use error::Error;
pub use event::{ChangeEvent, WireChange, WireEventType};
pub use live::{IntentTicket, LiveCollection, LoadStatus, PendingIntent};
pub use mutation::{Mutation, MutationIntent};
pub use reconcile::{MergeStrategy, Reconciler};
pub use record::Record;
pub use snapshot::{CollectionSnapshot, FailureKind, SyncFailure};

/// Type aliases for clarity
pub type RecordId = String;
pub type ResourceName = String;
pub type FieldMap = serde_json::Map<String, serde_json::Value>;
pub type Revision = u64;

/// Field holding the record id when a resource does not configure one.
pub const DEFAULT_ID_FIELD: &str = "id";
