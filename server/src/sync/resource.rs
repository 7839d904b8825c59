//! Per-resource configuration.

use livesync_engine::{MergeStrategy, ResourceName, DEFAULT_ID_FIELD};
use serde::{Deserialize, Serialize};

/// How one resource is synchronized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceConfig {
    /// Name clients use to address the resource
    pub name: ResourceName,
    /// Backing table; change events are routed by this name
    pub table: String,
    /// Field holding the record id
    #[serde(default = "default_id_field")]
    pub id_field: String,
    /// Column the initial fetch is ordered by, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<String>,
    #[serde(default)]
    pub strategy: MergeStrategy,
}

fn default_id_field() -> String {
    DEFAULT_ID_FIELD.to_string()
}

impl ResourceConfig {
    /// A resource backed by the table of the same name.
    pub fn new(name: impl Into<ResourceName>) -> Self {
        let name = name.into();
        Self {
            table: name.clone(),
            name,
            id_field: default_id_field(),
            order_by: None,
            strategy: MergeStrategy::default(),
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn with_id_field(mut self, id_field: impl Into<String>) -> Self {
        self.id_field = id_field.into();
        self
    }

    pub fn with_order_by(mut self, column: impl Into<String>) -> Self {
        self.order_by = Some(column.into());
        self
    }

    pub fn with_strategy(mut self, strategy: MergeStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Parse a `name` or `name:table` entry.
    pub fn parse(entry: &str) -> Result<Self, String> {
        let entry = entry.trim();
        let (name, table) = match entry.split_once(':') {
            Some((name, table)) => (name.trim(), Some(table.trim())),
            None => (entry, None),
        };

        if name.is_empty() || table.is_some_and(str::is_empty) {
            return Err(format!("invalid resource entry: '{entry}'"));
        }

        let config = Self::new(name);
        Ok(match table {
            Some(table) => config.with_table(table),
            None => config,
        })
    }
}
