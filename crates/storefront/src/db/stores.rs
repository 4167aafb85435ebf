//! Store repository.
//!
//! A store's point location is flattened into four nullable columns
//! (`location_type`, `location_lng`, `location_lat`, `location_address`) and
//! reassembled into [`Location`] on read.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use delicious_core::{Slug, StoreId, UserId};

use super::RepositoryError;
use crate::models::store::{Coordinates, GeoKind, Location, NewStore, Store, StoreUpdate, TagCount};

/// Persistence operations on stores.
#[async_trait]
pub trait StoreRepository: Send + Sync {
    /// All stores, oldest first.
    async fn list(&self) -> Result<Vec<Store>, RepositoryError>;

    /// Get a store by its ID.
    async fn get_by_id(&self, id: StoreId) -> Result<Option<Store>, RepositoryError>;

    /// Get a store by exact slug.
    async fn get_by_slug(&self, slug: &Slug) -> Result<Option<Store>, RepositoryError>;

    /// Slugs equal to `base` or of the form `base-N`, optionally ignoring one store.
    async fn slugs_with_base(
        &self,
        base: &Slug,
        exclude: Option<StoreId>,
    ) -> Result<Vec<Slug>, RepositoryError>;

    /// Insert a store.
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    async fn create(&self, new_store: &NewStore) -> Result<Store, RepositoryError>;

    /// Apply a partial update and return the post-update record.
    ///
    /// Returns `None` if no store has this ID.
    async fn update(
        &self,
        id: StoreId,
        update: &StoreUpdate,
    ) -> Result<Option<Store>, RepositoryError>;

    /// Stores carrying `tag`, or every tagged store when `tag` is `None`.
    async fn list_by_tag(&self, tag: Option<&str>) -> Result<Vec<Store>, RepositoryError>;

    /// Every tag in use with its store count, most used first.
    async fn tag_counts(&self) -> Result<Vec<TagCount>, RepositoryError>;
}

const STORE_COLUMNS: &str = "id, name, slug, description, tags, location_type, location_lng, \
                             location_lat, location_address, photo, author, created_at";

/// Database row for `stores`.
#[derive(sqlx::FromRow)]
struct StoreRow {
    id: StoreId,
    name: String,
    slug: Slug,
    description: String,
    tags: Vec<String>,
    location_type: Option<String>,
    location_lng: Option<f64>,
    location_lat: Option<f64>,
    location_address: Option<String>,
    photo: Option<String>,
    author: Option<UserId>,
    created_at: DateTime<Utc>,
}

impl TryFrom<StoreRow> for Store {
    type Error = RepositoryError;

    fn try_from(row: StoreRow) -> Result<Self, Self::Error> {
        let location = match (row.location_type, row.location_lng, row.location_lat) {
            (None, None, None) => None,
            (Some(kind), Some(lng), Some(lat)) => {
                let kind: GeoKind = kind.parse().map_err(|e| {
                    RepositoryError::DataCorruption(format!("store {}: {e}", row.id))
                })?;
                Some(Location {
                    kind,
                    coordinates: Coordinates::new(lng, lat),
                    address: row.location_address,
                })
            }
            _ => {
                return Err(RepositoryError::DataCorruption(format!(
                    "store {} has a partial location",
                    row.id
                )));
            }
        };

        Ok(Self {
            id: row.id,
            name: row.name,
            slug: row.slug,
            description: row.description,
            tags: row.tags,
            location,
            photo: row.photo,
            author: row.author,
            created_at: row.created_at,
        })
    }
}

fn into_stores(rows: Vec<StoreRow>) -> Result<Vec<Store>, RepositoryError> {
    rows.into_iter().map(Store::try_from).collect()
}

/// `PostgreSQL` implementation of [`StoreRepository`].
#[derive(Clone)]
pub struct PgStoreRepository {
    pool: PgPool,
}

impl PgStoreRepository {
    /// Create a new store repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StoreRepository for PgStoreRepository {
    async fn list(&self) -> Result<Vec<Store>, RepositoryError> {
        let rows = sqlx::query_as::<_, StoreRow>(&format!(
            "SELECT {STORE_COLUMNS} FROM stores ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;

        into_stores(rows)
    }

    async fn get_by_id(&self, id: StoreId) -> Result<Option<Store>, RepositoryError> {
        let row = sqlx::query_as::<_, StoreRow>(&format!(
            "SELECT {STORE_COLUMNS} FROM stores WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Store::try_from).transpose()
    }

    async fn get_by_slug(&self, slug: &Slug) -> Result<Option<Store>, RepositoryError> {
        let row = sqlx::query_as::<_, StoreRow>(&format!(
            "SELECT {STORE_COLUMNS} FROM stores WHERE slug = $1"
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Store::try_from).transpose()
    }

    async fn slugs_with_base(
        &self,
        base: &Slug,
        exclude: Option<StoreId>,
    ) -> Result<Vec<Slug>, RepositoryError> {
        // Slugs only hold [a-z0-9-], so the base is safe inside a regex.
        let slugs = sqlx::query_scalar::<_, Slug>(
            r"
            SELECT slug
            FROM stores
            WHERE (slug = $1 OR slug ~ ('^' || $1 || '-[0-9]+$'))
              AND ($2::INTEGER IS NULL OR id <> $2)
            ",
        )
        .bind(base)
        .bind(exclude)
        .fetch_all(&self.pool)
        .await?;

        Ok(slugs)
    }

    async fn create(&self, new_store: &NewStore) -> Result<Store, RepositoryError> {
        let location = new_store.location.as_ref();

        let row = sqlx::query_as::<_, StoreRow>(&format!(
            r"
            INSERT INTO stores (name, slug, description, tags, location_type, location_lng,
                                location_lat, location_address, photo, author)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {STORE_COLUMNS}
            "
        ))
        .bind(&new_store.name)
        .bind(&new_store.slug)
        .bind(&new_store.description)
        .bind(&new_store.tags)
        .bind(location.map(|l| l.kind.as_str()))
        .bind(location.map(|l| l.coordinates.lng))
        .bind(location.map(|l| l.coordinates.lat))
        .bind(location.and_then(|l| l.address.as_deref()))
        .bind(new_store.photo.as_deref())
        .bind(new_store.author)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryError::from_insert(e, "slug"))?;

        Store::try_from(row)
    }

    async fn update(
        &self,
        id: StoreId,
        update: &StoreUpdate,
    ) -> Result<Option<Store>, RepositoryError> {
        let location = update.location.as_ref();

        let row = sqlx::query_as::<_, StoreRow>(&format!(
            r"
            UPDATE stores
            SET name = COALESCE($2, name),
                slug = COALESCE($3, slug),
                description = COALESCE($4, description),
                tags = COALESCE($5, tags),
                location_type = CASE WHEN $6::BOOLEAN THEN $7 ELSE location_type END,
                location_lng = CASE WHEN $6::BOOLEAN THEN $8 ELSE location_lng END,
                location_lat = CASE WHEN $6::BOOLEAN THEN $9 ELSE location_lat END,
                location_address = CASE WHEN $6::BOOLEAN THEN $10 ELSE location_address END,
                photo = COALESCE($11, photo)
            WHERE id = $1
            RETURNING {STORE_COLUMNS}
            "
        ))
        .bind(id)
        .bind(update.name.as_deref())
        .bind(update.slug.as_ref())
        .bind(update.description.as_deref())
        .bind(update.tags.as_deref())
        .bind(location.is_some())
        .bind(location.map(|l| l.kind.as_str()))
        .bind(location.map(|l| l.coordinates.lng))
        .bind(location.map(|l| l.coordinates.lat))
        .bind(location.and_then(|l| l.address.as_deref()))
        .bind(update.photo.as_deref())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryError::from_insert(e, "slug"))?;

        row.map(Store::try_from).transpose()
    }

    async fn list_by_tag(&self, tag: Option<&str>) -> Result<Vec<Store>, RepositoryError> {
        let rows = match tag {
            Some(tag) => {
                sqlx::query_as::<_, StoreRow>(&format!(
                    "SELECT {STORE_COLUMNS} FROM stores WHERE $1 = ANY(tags) ORDER BY id"
                ))
                .bind(tag)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, StoreRow>(&format!(
                    "SELECT {STORE_COLUMNS} FROM stores WHERE cardinality(tags) > 0 ORDER BY id"
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };

        into_stores(rows)
    }

    async fn tag_counts(&self) -> Result<Vec<TagCount>, RepositoryError> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            r"
            SELECT tag, COUNT(*) AS count
            FROM stores, UNNEST(tags) AS tag
            GROUP BY tag
            ORDER BY count DESC, tag
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(tag, count)| TagCount { tag, count })
            .collect())
    }
}
