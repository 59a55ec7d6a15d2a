use std::time::Duration;

use anyhow::Result;
use futures::FutureExt;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use crate::config::DatabaseConfig;
use crate::utils::with_retry;

/// Connect the shared pool, retrying with backoff while the database comes up.
pub async fn create_pool(config: &DatabaseConfig, url: &str) -> Result<PgPool> {
    let options = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(10));

    let pool = with_retry(
        || {
            let options = options.clone();
            let url = url.to_string();
            async move { options.connect(&url).await }.boxed()
        },
        config.connect_retries.max(1),
    )
    .await?;

    health_check(&pool).await?;
    info!(
        max_connections = config.max_connections,
        "Database pool established"
    );

    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to run migrations: {}", e))?;
    info!("Database migrations completed");
    Ok(())
}

pub async fn health_check(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").fetch_one(pool).await?;
    Ok(())
}
