//! Store listings: slug lookup, tag browsing, create and update.

use std::sync::Arc;

use thiserror::Error;
use tracing::instrument;

use delicious_core::{Slug, StoreId, UserId};

use crate::db::{RepositoryError, StoreRepository};
use crate::models::store::{Coordinates, Location, NewStore, Store, StoreUpdate, TagCount};

/// Longest accepted store name.
const MAX_NAME_LENGTH: usize = 200;

/// Errors from store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store not found")]
    NotFound,

    #[error("You must own a store in order to edit it!")]
    NotOwner,

    /// One message per rejected field.
    #[error("invalid store: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// Another store claimed the slug between lookup and write.
    #[error("a store with this name was just created, please try again")]
    SlugConflict,

    #[error("database error: {0}")]
    Repository(RepositoryError),
}

impl From<RepositoryError> for StoreError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(_) => Self::SlugConflict,
            RepositoryError::NotFound => Self::NotFound,
            other => Self::Repository(other),
        }
    }
}

/// Submitted point location.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationInput {
    /// `[lng, lat]`
    pub coordinates: [f64; 2],
    pub address: Option<String>,
}

/// Submitted store fields. `None` means "not submitted".
///
/// Creation requires `name`; updates leave absent fields untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub location: Option<LocationInput>,
    pub photo: Option<String>,
}

/// Result of a tag browse.
#[derive(Debug, Clone)]
pub struct TagBrowse {
    /// Every tag in use, most used first, regardless of the filter.
    pub tags: Vec<TagCount>,
    /// Stores matching the filter.
    pub stores: Vec<Store>,
}

/// Fields that passed validation.
struct Validated {
    name: Option<(String, Slug)>,
    description: Option<String>,
    tags: Option<Vec<String>>,
    location: Option<Location>,
    photo: Option<String>,
}

/// Store listing operations.
#[derive(Clone)]
pub struct StoreService {
    stores: Arc<dyn StoreRepository>,
}

impl StoreService {
    #[must_use]
    pub fn new(stores: Arc<dyn StoreRepository>) -> Self {
        Self { stores }
    }

    /// All stores, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Repository` if the query fails.
    pub async fn list(&self) -> Result<Vec<Store>, StoreError> {
        Ok(self.stores.list().await?)
    }

    /// Find a store by its exact slug.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the slug is malformed or unused.
    #[instrument(skip(self))]
    pub async fn by_slug(&self, slug: &str) -> Result<Store, StoreError> {
        let slug = Slug::parse(slug).map_err(|_| StoreError::NotFound)?;
        self.stores
            .get_by_slug(&slug)
            .await?
            .ok_or(StoreError::NotFound)
    }

    /// Tags in use plus the stores carrying `tag`.
    ///
    /// With no tag (or a blank one) the stores are every store with at least
    /// one tag.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Repository` if either query fails.
    #[instrument(skip(self))]
    pub async fn by_tag(&self, tag: Option<&str>) -> Result<TagBrowse, StoreError> {
        let tag = tag.map(str::trim).filter(|t| !t.is_empty());
        let (tags, stores) =
            tokio::try_join!(self.stores.tag_counts(), self.stores.list_by_tag(tag))?;
        Ok(TagBrowse { tags, stores })
    }

    /// Load a store for editing by `user`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if no store has this ID.
    /// Returns `StoreError::NotOwner` if the store belongs to someone else.
    pub async fn get_editable(&self, id: StoreId, user: UserId) -> Result<Store, StoreError> {
        let store = self
            .stores
            .get_by_id(id)
            .await?
            .ok_or(StoreError::NotFound)?;
        if !store.is_editable_by(user) {
            return Err(StoreError::NotOwner);
        }
        Ok(store)
    }

    /// Create a store authored by `author`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Validation` if any field is rejected.
    /// Returns `StoreError::SlugConflict` if a concurrent insert took the slug.
    #[instrument(skip(self, input), fields(name = ?input.name))]
    pub async fn create(
        &self,
        input: StoreInput,
        author: Option<UserId>,
    ) -> Result<Store, StoreError> {
        let validated = validate(input)?;
        let Some((name, base)) = validated.name else {
            return Err(missing_name());
        };

        let slug = self.disambiguate(&base, None).await?;
        let store = self
            .stores
            .create(&NewStore {
                name,
                slug,
                description: validated.description.unwrap_or_default(),
                tags: validated.tags.unwrap_or_default(),
                location: validated.location,
                photo: validated.photo,
                author,
            })
            .await?;

        tracing::info!(store_id = %store.id, slug = %store.slug, "store created");
        Ok(store)
    }

    /// Apply a partial update and return the stored result.
    ///
    /// Submitted coordinates always become a `Point`. Renaming re-derives the
    /// slug.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Validation` if any field is rejected; nothing is applied.
    /// Returns `StoreError::NotFound` if no store has this ID.
    /// Returns `StoreError::SlugConflict` if a concurrent write took the slug.
    #[instrument(skip(self, input))]
    pub async fn update(&self, id: StoreId, input: StoreInput) -> Result<Store, StoreError> {
        let validated = validate(input)?;
        let current = self
            .stores
            .get_by_id(id)
            .await?
            .ok_or(StoreError::NotFound)?;

        let mut update = StoreUpdate {
            description: validated.description,
            tags: validated.tags,
            location: validated.location,
            photo: validated.photo,
            ..StoreUpdate::default()
        };
        if let Some((name, base)) = validated.name
            && name != current.name
        {
            update.slug = Some(self.disambiguate(&base, Some(id)).await?);
            update.name = Some(name);
        }

        let store = self
            .stores
            .update(id, &update)
            .await?
            .ok_or(StoreError::NotFound)?;

        tracing::info!(store_id = %store.id, slug = %store.slug, "store updated");
        Ok(store)
    }

    async fn disambiguate(
        &self,
        base: &Slug,
        exclude: Option<StoreId>,
    ) -> Result<Slug, StoreError> {
        let taken = self.stores.slugs_with_base(base, exclude).await?;
        Ok(Slug::next_available(base, &taken))
    }
}

/// Check a submission without touching storage.
///
/// `creating` additionally requires a name. Passing here means `create` or
/// `update` can only fail on storage grounds.
///
/// # Errors
///
/// Returns `StoreError::Validation` listing every rejected field.
pub fn check_input(input: &StoreInput, creating: bool) -> Result<(), StoreError> {
    let validated = validate(input.clone())?;
    if creating && validated.name.is_none() {
        return Err(missing_name());
    }
    Ok(())
}

fn missing_name() -> StoreError {
    StoreError::Validation(vec!["You must supply a name!".to_string()])
}

/// Check every submitted field, collecting all problems.
fn validate(input: StoreInput) -> Result<Validated, StoreError> {
    let mut errors = Vec::new();

    let name = input.name.and_then(|raw| {
        let name = raw.trim().to_string();
        if name.is_empty() {
            errors.push("You must supply a name!".to_string());
            return None;
        }
        if name.chars().count() > MAX_NAME_LENGTH {
            errors.push(format!("Name must be at most {MAX_NAME_LENGTH} characters"));
            return None;
        }
        match Slug::from_name(&name) {
            Ok(slug) => Some((name, slug)),
            Err(_) => {
                errors.push("Name must contain at least one letter or number".to_string());
                None
            }
        }
    });

    let location = input.location.and_then(|loc| {
        let coordinates = Coordinates::from(loc.coordinates);
        if coordinates.in_bounds() {
            let address = loc
                .address
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty());
            Some(Location::point(coordinates, address))
        } else {
            errors.push("Coordinates must be a longitude and latitude".to_string());
            None
        }
    });

    if !errors.is_empty() {
        return Err(StoreError::Validation(errors));
    }

    Ok(Validated {
        name,
        description: input.description.map(|d| d.trim().to_string()),
        tags: input.tags.map(normalize_tags),
        location,
        photo: input.photo,
    })
}

/// Trim tags, drop blanks and duplicates, keep first-seen order.
fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if !tag.is_empty() && !out.iter().any(|t| t == tag) {
            out.push(tag.to_string());
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStoreRepository;
    use crate::models::store::GeoKind;

    fn service() -> StoreService {
        StoreService::new(Arc::new(MemoryStoreRepository::new()))
    }

    fn named(name: &str) -> StoreInput {
        StoreInput {
            name: Some(name.to_string()),
            ..StoreInput::default()
        }
    }

    fn tagged(name: &str, tags: &[&str]) -> StoreInput {
        StoreInput {
            tags: Some(tags.iter().map(ToString::to_string).collect()),
            ..named(name)
        }
    }

    #[tokio::test]
    async fn test_create_derives_slug_from_name() {
        let store = service().create(named("Café Crêpe!!"), None).await.unwrap();
        assert_eq!(store.slug.as_str(), "cafe-crepe");
        assert_eq!(store.name, "Café Crêpe!!");
    }

    #[tokio::test]
    async fn test_create_disambiguates_colliding_slugs() {
        let stores = service();
        let first = stores.create(named("Cafe"), None).await.unwrap();
        let second = stores.create(named("cafe"), None).await.unwrap();
        let third = stores.create(named("CAFE!"), None).await.unwrap();

        assert_eq!(first.slug.as_str(), "cafe");
        assert_eq!(second.slug.as_str(), "cafe-2");
        assert_eq!(third.slug.as_str(), "cafe-3");
    }

    #[tokio::test]
    async fn test_create_requires_sluggable_name() {
        let stores = service();
        for input in [StoreInput::default(), named("   "), named("!!!")] {
            assert!(matches!(
                stores.create(input, None).await,
                Err(StoreError::Validation(_))
            ));
        }
    }

    #[test]
    fn test_check_input_matches_service_validation() {
        assert!(check_input(&named("Cafe"), true).is_ok());
        assert!(check_input(&StoreInput::default(), false).is_ok());

        for (input, creating) in [
            (StoreInput::default(), true),
            (named("   "), false),
            (named("!!!"), true),
        ] {
            assert!(matches!(
                check_input(&input, creating),
                Err(StoreError::Validation(_))
            ));
        }

        let far = StoreInput {
            location: Some(LocationInput {
                coordinates: [200.0, 0.0],
                address: None,
            }),
            ..named("Far")
        };
        assert!(matches!(
            check_input(&far, true),
            Err(StoreError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_by_slug() {
        let stores = service();
        let created = stores.create(named("Cafe Crepe"), None).await.unwrap();

        assert_eq!(stores.by_slug("cafe-crepe").await.unwrap().id, created.id);
        assert!(matches!(
            stores.by_slug("cafe").await,
            Err(StoreError::NotFound)
        ));
        assert!(matches!(
            stores.by_slug("Not A Slug").await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_by_tag_without_filter_skips_untagged_stores() {
        let stores = service();
        let tagged_store = stores.create(tagged("A", &["a"]), None).await.unwrap();
        stores.create(tagged("B", &[]), None).await.unwrap();

        for filter in [None, Some(""), Some("  ")] {
            let browse = stores.by_tag(filter).await.unwrap();
            assert_eq!(browse.stores.len(), 1);
            assert_eq!(browse.stores[0].id, tagged_store.id);
            assert_eq!(
                browse.tags,
                vec![TagCount {
                    tag: "a".to_string(),
                    count: 1
                }]
            );
        }
    }

    #[tokio::test]
    async fn test_by_tag_filters_exactly_and_counts_all() {
        let stores = service();
        stores
            .create(tagged("A", &["Wifi", "Licensed"]), None)
            .await
            .unwrap();
        let b = stores.create(tagged("B", &["Wifi"]), None).await.unwrap();

        let browse = stores.by_tag(Some("Licensed")).await.unwrap();
        assert_eq!(browse.stores.len(), 1);
        assert_ne!(browse.stores[0].id, b.id);
        assert_eq!(browse.tags[0].tag, "Wifi");
        assert_eq!(browse.tags[0].count, 2);
        assert_eq!(browse.tags.len(), 2);

        assert!(stores.by_tag(Some("wifi")).await.unwrap().stores.is_empty());
    }

    #[tokio::test]
    async fn test_update_location_becomes_point() {
        let stores = service();
        let store = stores.create(named("A"), None).await.unwrap();

        let updated = stores
            .update(
                store.id,
                StoreInput {
                    location: Some(LocationInput {
                        coordinates: [1.0, 2.0],
                        address: None,
                    }),
                    ..StoreInput::default()
                },
            )
            .await
            .unwrap();

        let location = updated.location.unwrap();
        assert_eq!(location.kind, GeoKind::Point);
        assert_eq!(location.coordinates, Coordinates::new(1.0, 2.0));
        assert_eq!(updated.name, "A");
    }

    #[tokio::test]
    async fn test_update_rename_rederives_slug() {
        let stores = service();
        stores.create(named("Bar"), None).await.unwrap();
        let store = stores.create(named("Foo"), None).await.unwrap();

        let renamed = stores.update(store.id, named("Bar")).await.unwrap();
        assert_eq!(renamed.slug.as_str(), "bar-2");

        let same = stores.update(store.id, named("Bar")).await.unwrap();
        assert_eq!(same.slug.as_str(), "bar-2");
    }

    #[tokio::test]
    async fn test_update_rejects_invalid_input_wholesale() {
        let stores = service();
        let store = stores.create(tagged("A", &["x"]), None).await.unwrap();

        let err = stores
            .update(
                store.id,
                StoreInput {
                    tags: Some(vec!["y".to_string()]),
                    location: Some(LocationInput {
                        coordinates: [200.0, 0.0],
                        address: None,
                    }),
                    ..StoreInput::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));

        let unchanged = stores.by_slug("a").await.unwrap();
        assert_eq!(unchanged.tags, vec!["x".to_string()]);
    }

    #[tokio::test]
    async fn test_update_missing_store() {
        assert!(matches!(
            service().update(StoreId::new(42), named("X")).await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_get_editable_checks_owner() {
        let stores = service();
        let owner = UserId::new(1);
        let store = stores.create(named("Mine"), Some(owner)).await.unwrap();

        assert!(stores.get_editable(store.id, owner).await.is_ok());
        assert!(matches!(
            stores.get_editable(store.id, UserId::new(2)).await,
            Err(StoreError::NotOwner)
        ));

        let open = stores.create(named("Open"), None).await.unwrap();
        assert!(stores.get_editable(open.id, UserId::new(2)).await.is_ok());
    }

    #[test]
    fn test_normalize_tags() {
        let tags = normalize_tags(vec![
            " Wifi ".to_string(),
            String::new(),
            "Wifi".to_string(),
            "Licensed".to_string(),
        ]);
        assert_eq!(tags, vec!["Wifi".to_string(), "Licensed".to_string()]);
    }
}
