//! Postgres-backed initial fetch and mutations.
//!
//! Rows travel as JSON in both directions: reads use `row_to_json`, writes
//! go through `jsonb_populate_record` so column types are coerced by
//! Postgres. Table and column names cannot be bound as parameters, so every
//! identifier is validated and quoted before it is spliced into SQL.

use async_trait::async_trait;
use livesync_engine::{FieldMap, Mutation, MutationIntent, Record};
use serde_json::Value;
use sqlx::PgPool;

use crate::sync::{FetchError, InitialFetch, MutationError, RemoteMutation, ResourceConfig};

/// Reads and writes resource tables.
#[derive(Debug, Clone)]
pub struct PgSource {
    pool: PgPool,
}

impl PgSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert(
        &self,
        table: &str,
        row: &Value,
        fields: &FieldMap,
        id_field: &str,
    ) -> Result<Option<Value>, MutationError> {
        let mut columns = vec![quote_ident(id_field).map_err(MutationError::new)?];
        columns.extend(column_list(fields)?);
        let columns = columns.join(", ");

        let sql = format!(
            "INSERT INTO {table} AS t ({columns}) \
             SELECT {columns} FROM jsonb_populate_record(NULL::{table}, $1) \
             RETURNING row_to_json(t)::jsonb"
        );

        sqlx::query_scalar::<_, Value>(&sql)
            .bind(row)
            .fetch_optional(&self.pool)
            .await
            .map_err(mutation_error)
    }

    async fn update(
        &self,
        table: &str,
        id_field: &str,
        id: &str,
        fields: &FieldMap,
    ) -> Result<Option<Value>, MutationError> {
        let columns = column_list(fields)?;
        if columns.is_empty() {
            return Err(MutationError::new("update has no fields to set"));
        }
        let columns = columns.join(", ");
        let id_column = quote_ident(id_field).map_err(MutationError::new)?;

        let sql = format!(
            "UPDATE {table} AS t SET ({columns}) = \
             (SELECT {columns} FROM jsonb_populate_record(NULL::{table}, $1)) \
             WHERE t.{id_column}::text = $2 \
             RETURNING row_to_json(t)::jsonb"
        );

        sqlx::query_scalar::<_, Value>(&sql)
            .bind(Value::Object(fields.clone()))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(mutation_error)
    }

    async fn delete(
        &self,
        table: &str,
        id_field: &str,
        id: &str,
    ) -> Result<Option<Value>, MutationError> {
        let id_column = quote_ident(id_field).map_err(MutationError::new)?;
        let sql = format!(
            "DELETE FROM {table} AS t WHERE t.{id_column}::text = $1 \
             RETURNING row_to_json(t)::jsonb"
        );

        sqlx::query_scalar::<_, Value>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(mutation_error)
    }
}

#[async_trait]
impl InitialFetch for PgSource {
    async fn fetch(&self, resource: &ResourceConfig) -> Result<Vec<Record>, FetchError> {
        let table = quote_ident(&resource.table).map_err(FetchError::new)?;
        let order = match &resource.order_by {
            Some(order_by) => format!(" ORDER BY {}", order_clause(order_by).map_err(FetchError::new)?),
            None => String::new(),
        };

        let sql = format!("SELECT row_to_json(t)::jsonb FROM {table} AS t{order}");
        let rows = sqlx::query_scalar::<_, Value>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| FetchError::new(db_message(&e)))?;

        tracing::debug!(resource = %resource.name, rows = rows.len(), "fetched rows");

        rows.iter()
            .map(|row| Record::from_row(row, &resource.id_field))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| FetchError::new(e.to_string()))
    }
}

#[async_trait]
impl RemoteMutation for PgSource {
    async fn mutate(
        &self,
        resource: &ResourceConfig,
        intent: &MutationIntent,
    ) -> Result<Record, MutationError> {
        let table = quote_ident(&resource.table).map_err(MutationError::new)?;
        let id_field = resource.id_field.as_str();

        let returned = match &intent.mutation {
            Mutation::Create { record } => {
                self.insert(&table, &record.to_row(id_field), &record.fields, id_field)
                    .await?
            }
            Mutation::Update { record } => {
                self.update(&table, id_field, &record.id, &record.fields)
                    .await?
            }
            Mutation::Patch { id, fields } => self.update(&table, id_field, id, fields).await?,
            Mutation::Delete { id } => self.delete(&table, id_field, id).await?,
        };

        let row = returned.ok_or_else(|| {
            MutationError::new(format!(
                "record {} not found in {}",
                intent.record_id(),
                resource.table
            ))
        })?;

        Record::from_row(&row, id_field).map_err(|e| MutationError::new(e.to_string()))
    }
}

/// Quote a possibly schema-qualified identifier, rejecting anything that is
/// not a plain Postgres name.
pub(crate) fn quote_ident(name: &str) -> Result<String, String> {
    let parts: Vec<&str> = name.split('.').collect();
    if parts.len() > 2 || !parts.iter().all(|part| is_plain_ident(part)) {
        return Err(format!("invalid identifier: '{name}'"));
    }

    Ok(parts
        .iter()
        .map(|part| format!("\"{part}\""))
        .collect::<Vec<_>>()
        .join("."))
}

fn is_plain_ident(part: &str) -> bool {
    let mut chars = part.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && part.len() <= 63
}

/// `column` or `column asc|desc`.
fn order_clause(order_by: &str) -> Result<String, String> {
    let mut words = order_by.split_whitespace();
    let column = words
        .next()
        .ok_or_else(|| "empty order column".to_string())?;
    let column = format!("t.{}", quote_ident(column)?);

    match (words.next().map(str::to_ascii_lowercase).as_deref(), words.next()) {
        (None, None) => Ok(column),
        (Some("asc"), None) => Ok(format!("{column} ASC")),
        (Some("desc"), None) => Ok(format!("{column} DESC")),
        _ => Err(format!("invalid order: '{order_by}'")),
    }
}

fn column_list(fields: &FieldMap) -> Result<Vec<String>, MutationError> {
    fields
        .keys()
        .map(|key| quote_ident(key).map_err(MutationError::new))
        .collect()
}

fn mutation_error(e: sqlx::Error) -> MutationError {
    tracing::warn!(error = %e, "mutation query failed");
    MutationError::new(db_message(&e))
}

/// The database's own message where there is one, so constraint and
/// trigger errors reach the user verbatim.
fn db_message(e: &sqlx::Error) -> String {
    match e {
        sqlx::Error::Database(db) => db.message().to_string(),
        other => other.to_string(),
    }
}
