//! Database migrations.
//!
//! SQL migrations live in `crates/storefront/migrations/`. The session table
//! belongs to `tower-sessions-sqlx-store` and is created by its own migration.

use sqlx::PgPool;
use tower_sessions_sqlx_store::PostgresStore;

use super::CommandError;

/// Run the storefront migrations, then the session-store migration.
pub async fn run(pool: &PgPool) -> Result<(), CommandError> {
    tracing::info!("Running storefront migrations...");
    sqlx::migrate!("../storefront/migrations").run(pool).await?;

    tracing::info!("Running session store migration...");
    PostgresStore::new(pool.clone()).migrate().await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
