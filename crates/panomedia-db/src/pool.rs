//! Database connection and migrations

use anyhow::{Context, Result};
use panomedia_core::Config;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::path::Path;
use std::time::Duration;

use crate::repository::Stores;

/// Connect to Postgres and apply pending migrations from the workspace `migrations/`.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool> {
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(database_url)
        .await
        .context("Failed to connect to database")?;

    tracing::info!(max_connections, "Database connected successfully");

    let migrations_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../migrations");
    let migrator = sqlx::migrate::Migrator::new(migrations_dir)
        .await
        .context("Failed to load migrations")?;
    migrator
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    Ok(pool)
}

impl Stores {
    /// Postgres stores when `DATABASE_URL` is set, in-process stores otherwise.
    pub async fn from_config(config: &Config) -> Result<Self> {
        match config.database_url.as_deref() {
            Some(url) => Ok(Self::postgres(connect(url, config.db_max_connections).await?)),
            None => {
                tracing::warn!("DATABASE_URL not set, records are kept in memory");
                Ok(Self::memory())
            }
        }
    }
}
