//! Delicious CLI - database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database and session-store migrations
//! delicious-cli migrate
//!
//! # Load sample stores
//! delicious-cli seed crates/cli/data/stores.json
//! ```
//!
//! Both commands read `DATABASE_URL` (a `.env` file is honored).

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "delicious-cli")]
#[command(author, version, about = "Delicious CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations, including the session table
    Migrate,
    /// Load stores from a JSON file
    Seed {
        /// Path to a JSON array of stores
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CommandError> {
    let pool = commands::connect().await?;

    match cli.command {
        Commands::Migrate => commands::migrate::run(&pool).await?,
        Commands::Seed { file } => {
            let count = commands::seed::stores(&pool, &file).await?;
            tracing::info!("Seeded {count} stores");
        }
    }
    Ok(())
}
