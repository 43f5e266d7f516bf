//! Database connection and pool management
//!
//! This module handles PostgreSQL connection pooling and migrations.

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

use crate::config::Config;

/// Database connection error
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("DATABASE_URL is not set")]
    NotConfigured,

    #[error("Failed to connect to database: {0}")]
    ConnectionError(String),

    #[error("Failed to run migrations: {0}")]
    MigrationError(String),
}

/// Create a database connection pool
pub async fn create_pool(config: &Config) -> Result<PgPool, DbError> {
    let database_url = config.database_url.as_deref().ok_or(DbError::NotConfigured)?;
    let masked = config.database_url_masked().unwrap_or_default();
    tracing::info!("Connecting to database at {}", masked);

    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_millis(config.auth_store_timeout_ms))
        .idle_timeout(Duration::from_secs(600))
        .connect(database_url)
        .await
        .map_err(|e| DbError::ConnectionError(e.to_string()))?;

    tracing::info!("Database connection pool created successfully");

    Ok(pool)
}

/// Run database migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), DbError> {
    tracing::info!("Running database migrations...");

    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| DbError::MigrationError(e.to_string()))?;

    tracing::info!("Database migrations completed successfully");

    Ok(())
}
