//! Database connection pool management.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::sync::ResourceConfig;

/// Type alias for the database pool.
pub type Pool = PgPool;

/// Create a new database connection pool.
pub async fn create_pool(database_url: &str) -> Result<Pool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
}

/// Run database migrations.
pub async fn run_migrations(pool: &Pool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// Install the change notification trigger on every resource table.
///
/// Safe to run on every start; an existing trigger is replaced.
pub async fn track_tables(
    pool: &Pool,
    resources: &[ResourceConfig],
    channel: &str,
) -> Result<(), sqlx::Error> {
    for resource in resources {
        sqlx::query("SELECT livesync_track($1::regclass, $2, $3)")
            .bind(&resource.table)
            .bind(channel)
            .bind(&resource.id_field)
            .execute(pool)
            .await?;

        tracing::debug!(table = %resource.table, channel = %channel, "change trigger installed");
    }
    Ok(())
}
