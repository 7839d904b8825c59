//! Reconciliation of change events and local mutations into collections.
//!
//! The reconciler is a pure fold: it takes a collection and one input and
//! returns a new collection. Inputs are applied in arrival order; there is no
//! logical clock, so the last input applied wins.
//!
//! # Rules
//!
//! 1. `Inserted` / `Create`: replace the record if its id is present, else append
//! 2. `Updated` / `Update`: replace in place if present, else append
//! 3. `Patch`: overlay fields on the present record, else no-op
//! 4. `Deleted` / `Delete`: remove if present, else no-op

use crate::{ChangeEvent, Collection, Mutation, Record};
use serde::{Deserialize, Serialize};

/// How an `Inserted` event for an id that is already present is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Whatever is applied last wins, late inserts included (default)
    #[default]
    LastApplied,
    /// A late insert never overwrites a record that is already present
    InsertIfAbsent,
}

impl std::str::FromStr for MergeStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "last_applied" => Ok(MergeStrategy::LastApplied),
            "insert_if_absent" => Ok(MergeStrategy::InsertIfAbsent),
            other => Err(format!("unknown merge strategy: {other}")),
        }
    }
}

/// The reconciler folds events and mutations into collections.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reconciler {
    strategy: MergeStrategy,
}

impl Reconciler {
    /// Create a new reconciler.
    pub fn new(strategy: MergeStrategy) -> Self {
        Self { strategy }
    }

    /// The strategy in use.
    pub fn strategy(&self) -> MergeStrategy {
        self.strategy
    }

    /// Fold one remote change event into a collection.
    pub fn apply_change(&self, collection: &Collection, event: &ChangeEvent) -> Collection {
        let mut next = collection.clone();
        self.apply_change_in_place(&mut next, event);
        next
    }

    /// Fold one local mutation into a collection.
    ///
    /// Used to render the optimistic state before the backend answers.
    pub fn apply_local_mutation(&self, collection: &Collection, mutation: &Mutation) -> Collection {
        let mut next = collection.clone();
        self.apply_mutation_in_place(&mut next, mutation);
        next
    }

    /// Fold a sequence of events, in order.
    pub fn fold<'e>(
        &self,
        collection: &Collection,
        events: impl IntoIterator<Item = &'e ChangeEvent>,
    ) -> Collection {
        let mut next = collection.clone();
        for event in events {
            self.apply_change_in_place(&mut next, event);
        }
        next
    }

    /// Apply an event to a collection the caller already owns.
    ///
    /// Callers must hold the only reference; observers only ever get copies.
    pub(crate) fn apply_change_in_place(&self, collection: &mut Collection, event: &ChangeEvent) {
        match event {
            ChangeEvent::Inserted(record) => self.insert(collection, record),
            ChangeEvent::Updated(record) => collection.upsert(record.clone()),
            ChangeEvent::Deleted(id) => {
                collection.remove(id);
            }
        }
    }

    pub(crate) fn apply_mutation_in_place(&self, collection: &mut Collection, mutation: &Mutation) {
        match mutation {
            Mutation::Create { record } => self.insert(collection, record),
            Mutation::Update { record } => collection.upsert(record.clone()),
            Mutation::Patch { id, fields } => {
                if let Some(current) = collection.get(id) {
                    let patched = current.merged(fields);
                    collection.upsert(patched);
                }
            }
            Mutation::Delete { id } => {
                collection.remove(id);
            }
        }
    }

    fn insert(&self, collection: &mut Collection, record: &Record) {
        if self.strategy == MergeStrategy::InsertIfAbsent && collection.contains(&record.id) {
            return;
        }
        collection.upsert(record.clone());
    }
}
