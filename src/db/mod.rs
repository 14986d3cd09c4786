//! Postgres pool and schema setup

use sqlx::migrate::Migrator;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

use crate::config::Config;

/// Marketplace schema, embedded from `migrations/` at compile time
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Postgres unreachable: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("Schema migration failed: {0}")]
    Migrate(#[source] sqlx::migrate::MigrateError),

    #[error("Postgres ping failed: {0}")]
    Ping(#[source] sqlx::Error),
}

pub async fn create_pool(config: &Config) -> Result<PgPool, DbError> {
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(600))
        .connect(&config.database_url)
        .await
        .map_err(DbError::Connect)?;

    tracing::info!(
        database = %config.database_url_masked(),
        max_connections = config.db_max_connections,
        "Postgres pool ready"
    );

    Ok(pool)
}

/// Bring the schema up to date before the server accepts traffic
pub async fn run_migrations(pool: &PgPool) -> Result<(), DbError> {
    MIGRATOR.run(pool).await.map_err(DbError::Migrate)?;

    tracing::info!(
        migrations = MIGRATOR.iter().count(),
        "Marketplace schema up to date"
    );

    Ok(())
}

pub async fn check_health(pool: &PgPool) -> Result<(), DbError> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map_err(DbError::Ping)?;
    Ok(())
}
