//! Ordered, id-keyed collections of records.

use crate::{Record, RecordId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An ordered collection of records for one resource.
///
/// Order is insertion order: new records are appended, replaced records keep
/// their position, removed records leave no gap. No two records share an id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Record>", into = "Vec<Record>")]
pub struct Collection {
    records: Vec<Record>,
    index: HashMap<RecordId, usize>,
}

impl Collection {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Build a collection from fetched records.
    ///
    /// A later record with an id seen earlier replaces it in place.
    pub fn from_records(records: impl IntoIterator<Item = Record>) -> Self {
        let mut collection = Self::new();
        for record in records {
            collection.upsert(record);
        }
        collection
    }

    /// Get a record by ID.
    pub fn get(&self, id: &str) -> Option<&Record> {
        self.index.get(id).map(|&pos| &self.records[pos])
    }

    /// Check if a record exists.
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Position of a record in the collection order.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Iterate records in order.
    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    /// Record ids in order.
    pub fn ids(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.id.as_str()).collect()
    }

    /// Records as a slice, in order.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Count of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the collection has no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Replace the record with the same id in place, or append it.
    pub(crate) fn upsert(&mut self, record: Record) {
        match self.index.get(&record.id) {
            Some(&pos) => self.records[pos] = record,
            None => {
                self.index.insert(record.id.clone(), self.records.len());
                self.records.push(record);
            }
        }
    }

    /// Remove a record by id. Returns whether it was present.
    pub(crate) fn remove(&mut self, id: &str) -> bool {
        let Some(pos) = self.index.remove(id) else {
            return false;
        };
        self.records.remove(pos);
        for record in &self.records[pos..] {
            if let Some(slot) = self.index.get_mut(&record.id) {
                *slot -= 1;
            }
        }
        true
    }
}

impl PartialEq for Collection {
    fn eq(&self, other: &Self) -> bool {
        // The index is derived from `records`.
        self.records == other.records
    }
}

impl From<Vec<Record>> for Collection {
    fn from(records: Vec<Record>) -> Self {
        Self::from_records(records)
    }
}

impl From<Collection> for Vec<Record> {
    fn from(collection: Collection) -> Self {
        collection.records
    }
}

impl<'a> IntoIterator for &'a Collection {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
