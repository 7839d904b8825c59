//! Change events pushed by the backend.
//!
//! A change event carries the new state of one record, or the id of a removed
//! record. It is never a diff.

use crate::{error::Result, record::normalize_id, Error, FieldMap, Record, RecordId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One remote mutation of a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum ChangeEvent {
    Inserted(Record),
    Updated(Record),
    Deleted(RecordId),
}

impl ChangeEvent {
    /// Get the record ID this event targets.
    pub fn record_id(&self) -> &RecordId {
        match self {
            ChangeEvent::Inserted(record) | ChangeEvent::Updated(record) => &record.id,
            ChangeEvent::Deleted(id) => id,
        }
    }

    /// Decode a raw feed payload.
    ///
    /// Inserts and updates take the record from `new`, deletes take the id
    /// from `old`. A payload without a usable id is rejected so it can never
    /// reach a collection.
    pub fn decode(wire: &WireChange, id_field: &str) -> Result<Self> {
        let malformed = |reason: String| Error::MalformedEvent(reason);

        match wire.event_type {
            WireEventType::Insert | WireEventType::Update => {
                let row = Value::Object(wire.new.clone());
                let record = Record::from_row(&row, id_field)
                    .map_err(|e| malformed(format!("{} on {}: {e}", wire.event_type, wire.table)))?;
                Ok(if wire.event_type == WireEventType::Insert {
                    ChangeEvent::Inserted(record)
                } else {
                    ChangeEvent::Updated(record)
                })
            }
            WireEventType::Delete => {
                let id = wire
                    .old
                    .get(id_field)
                    .and_then(normalize_id)
                    .ok_or_else(|| {
                        malformed(format!(
                            "DELETE on {} without '{id_field}' in old row",
                            wire.table
                        ))
                    })?;
                Ok(ChangeEvent::Deleted(id))
            }
        }
    }
}

/// Event type of a raw feed payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WireEventType {
    Insert,
    Update,
    Delete,
}

impl std::fmt::Display for WireEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            WireEventType::Insert => "INSERT",
            WireEventType::Update => "UPDATE",
            WireEventType::Delete => "DELETE",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for WireEventType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "INSERT" => Ok(WireEventType::Insert),
            "UPDATE" => Ok(WireEventType::Update),
            "DELETE" => Ok(WireEventType::Delete),
            _ => Err(Error::UnknownEventType(s.to_string())),
        }
    }
}

/// A raw row-change payload as delivered by the backend's realtime feed.
///
/// ```json
/// {"table": "deposits", "eventType": "UPDATE",
///  "new": {"id": 1, "status": "approved"}, "old": {"id": 1}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireChange {
    /// Table the change happened on
    #[serde(default)]
    pub table: String,
    /// Kind of change
    #[serde(rename = "eventType")]
    pub event_type: WireEventType,
    /// Commit time reported by the backend, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_timestamp: Option<String>,
    /// Row after the change (empty for deletes)
    #[serde(default, deserialize_with = "object_or_empty")]
    pub new: FieldMap,
    /// Row before the change (at least the id for deletes)
    #[serde(default, deserialize_with = "object_or_empty")]
    pub old: FieldMap,
    /// The backend dropped the row data to fit its payload limit; only the
    /// id survives
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub truncated: bool,
}

impl WireChange {
    /// Build an INSERT payload.
    pub fn insert(table: impl Into<String>, new: Value) -> Self {
        Self::new(table, WireEventType::Insert, new, Value::Null)
    }

    /// Build an UPDATE payload.
    pub fn update(table: impl Into<String>, new: Value) -> Self {
        Self::new(table, WireEventType::Update, new, Value::Null)
    }

    /// Build a DELETE payload.
    pub fn delete(table: impl Into<String>, old: Value) -> Self {
        Self::new(table, WireEventType::Delete, Value::Null, old)
    }

    fn new(table: impl Into<String>, event_type: WireEventType, new: Value, old: Value) -> Self {
        Self {
            table: table.into(),
            event_type,
            commit_timestamp: None,
            new: into_object(new),
            old: into_object(old),
            truncated: false,
        }
    }

    /// Mark the payload as cut down to the record id.
    pub fn truncated(mut self) -> Self {
        self.truncated = true;
        self
    }

    /// Whether the payload carries enough to be applied as is.
    ///
    /// A truncated delete still names the id to remove; a truncated insert
    /// or update has lost the row and has to be read back from the backend.
    pub fn is_applicable(&self) -> bool {
        !self.truncated || self.event_type == WireEventType::Delete
    }
}

fn into_object(value: Value) -> FieldMap {
    match value {
        Value::Object(map) => map,
        _ => FieldMap::new(),
    }
}

// Triggers send `null` for the missing side of a row change.
fn object_or_empty<'de, D>(deserializer: D) -> std::result::Result<FieldMap, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.map(into_object).unwrap_or_default())
}
