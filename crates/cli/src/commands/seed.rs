//! Seed the database with stores from a JSON file.
//!
//! The file holds an array of stores:
//!
//! ```json
//! [
//!   {
//!     "name": "Wee Cafe",
//!     "description": "Tiny and friendly",
//!     "tags": ["Wifi", "Vegetarian"],
//!     "location": { "address": "1 Main St", "coordinates": [-79.38, 43.65] }
//!   }
//! ]
//! ```
//!
//! Stores are created through the same service as the web form, so names are
//! validated and slugs disambiguated. Seeded stores have no author.

use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use sqlx::PgPool;

use delicious_storefront::db::PgStoreRepository;
use delicious_storefront::services::stores::{LocationInput, StoreInput, StoreService};

use super::CommandError;

#[derive(Debug, Deserialize)]
struct SeedLocation {
    #[serde(default)]
    address: Option<String>,
    coordinates: [f64; 2],
}

#[derive(Debug, Deserialize)]
struct SeedStore {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    location: Option<SeedLocation>,
    #[serde(default)]
    photo: Option<String>,
}

impl From<SeedStore> for StoreInput {
    fn from(seed: SeedStore) -> Self {
        Self {
            name: Some(seed.name),
            description: seed.description,
            tags: Some(seed.tags),
            location: seed.location.map(|l| LocationInput {
                coordinates: l.coordinates,
                address: l.address,
            }),
            photo: seed.photo,
        }
    }
}

fn parse(json: &str) -> Result<Vec<SeedStore>, serde_json::Error> {
    serde_json::from_str(json)
}

/// Create every store in `file`, returning how many were created.
pub async fn stores(pool: &PgPool, file: &Path) -> Result<usize, CommandError> {
    let json = tokio::fs::read_to_string(file).await?;
    let seeds = parse(&json)?;

    let service = StoreService::new(Arc::new(PgStoreRepository::new(pool.clone())));

    let mut created = 0;
    for seed in seeds {
        let name = seed.name.clone();
        let store = service
            .create(seed.into(), None)
            .await
            .map_err(|source| CommandError::Store { name, source })?;
        tracing::info!(slug = %store.slug, "Created store {}", store.name);
        created += 1;
    }

    Ok(created)
}
