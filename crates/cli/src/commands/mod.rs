//! CLI subcommands.

pub mod migrate;
pub mod seed;

use secrecy::SecretString;
use sqlx::PgPool;
use thiserror::Error;

use delicious_storefront::db::create_pool;
use delicious_storefront::services::stores::StoreError;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration failed.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Seed file could not be read.
    #[error("Could not read seed file: {0}")]
    Io(#[from] std::io::Error),

    /// Seed file is not valid JSON.
    #[error("Invalid seed file: {0}")]
    Json(#[from] serde_json::Error),

    /// A seeded store was rejected.
    #[error("Store {name:?} rejected: {source}")]
    Store {
        name: String,
        #[source]
        source: StoreError,
    },
}

/// Connect to the database named by `DATABASE_URL`.
pub async fn connect() -> Result<PgPool, CommandError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("DATABASE_URL")
        .map(SecretString::from)
        .map_err(|_| CommandError::MissingEnvVar("DATABASE_URL"))?;

    tracing::info!("Connecting to database...");
    Ok(create_pool(&database_url).await?)
}
