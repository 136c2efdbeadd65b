use anyhow::{Context, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::info;

const MAX_CONNECTIONS: u32 = 10;

/// Creates a connection pool to the Postgres database
pub async fn get_db_pool(database_url: &str) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url)
        .await
        .context("Failed to connect to Postgres")
}

/// Applies pending migrations from `./migrations`.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("Failed to run database migrations")?;

    info!("Database migrations applied");
    Ok(())
}

/// Pool plus schema, ready for the store.
pub async fn connect_and_migrate(database_url: &str) -> Result<PgPool> {
    let pool = get_db_pool(database_url).await?;
    run_migrations(&pool).await?;
    Ok(pool)
}
