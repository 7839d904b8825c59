//! Record types for storing data.

use crate::{error::Result, Error, FieldMap, RecordId, DEFAULT_ID_FIELD};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A record in a collection.
///
/// Records are immutable value snapshots: every change produces a new
/// record, so an observer holding one never sees a half-applied update.
/// The id is kept apart from the remaining fields and serializes as `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Unique identifier, stable for the record's lifetime
    pub id: RecordId,
    /// All other fields of the row
    #[serde(flatten)]
    pub fields: FieldMap,
}

impl Record {
    /// Create a new record.
    pub fn new(id: impl Into<RecordId>, mut fields: FieldMap) -> Self {
        fields.remove(DEFAULT_ID_FIELD);
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Build a record from a backend row, taking the id from `id_field`.
    ///
    /// Numeric ids are normalized to their decimal string so `1` and `"1"`
    /// address the same record.
    pub fn from_row(row: &Value, id_field: &str) -> Result<Self> {
        let object = row.as_object().ok_or(Error::NotAnObject)?;
        let raw_id = object
            .get(id_field)
            .ok_or_else(|| Error::MissingId(id_field.to_string()))?;
        let id = normalize_id(raw_id).ok_or_else(|| Error::InvalidId {
            field: id_field.to_string(),
            value: raw_id.to_string(),
        })?;

        let mut fields = object.clone();
        fields.remove(id_field);
        Ok(Self::new(id, fields))
    }

    /// Render the record back into a backend row.
    pub fn to_row(&self, id_field: &str) -> Value {
        let mut row = self.fields.clone();
        row.insert(id_field.to_string(), Value::String(self.id.clone()));
        Value::Object(row)
    }

    /// Get a field value.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Return a copy of this record with one field replaced.
    pub fn with_field(&self, field: impl Into<String>, value: Value) -> Self {
        let mut fields = self.fields.clone();
        fields.insert(field.into(), value);
        Self::new(self.id.clone(), fields)
    }

    /// Return a copy of this record with `patch` overlaid on its fields.
    ///
    /// The id never changes, even if the patch carries one.
    pub fn merged(&self, patch: &FieldMap) -> Self {
        let mut fields = self.fields.clone();
        for (key, value) in patch {
            fields.insert(key.clone(), value.clone());
        }
        Self::new(self.id.clone(), fields)
    }
}

/// Turn a JSON id into a record id. Only non-empty strings and numbers qualify.
///
/// Whole floats render like the integer they hold, so `1.0` and `1` name the
/// same record.
pub(crate) fn normalize_id(value: &Value) -> Option<RecordId> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() <= MAX_EXACT_FLOAT => {
                (f as i64).to_string()
            }
            _ => n.to_string(),
        }),
        _ => None,
    }
}

// Largest magnitude below which every whole f64 is exact
const MAX_EXACT_FLOAT: f64 = 9_007_199_254_740_992.0;
