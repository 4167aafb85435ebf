//! In-memory repositories.
//!
//! Used by the test suites and by `delicious-storefront` when exercising the
//! HTTP layer without a database. Semantics mirror the `PostgreSQL`
//! implementations, including unique email/slug constraints and the
//! conditional reset-token update.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use delicious_core::{Email, Slug, StoreId, UserId};

use super::{RepositoryError, StoreRepository, UserRepository};
use crate::models::store::{NewStore, Store, StoreUpdate, TagCount};
use crate::models::user::{NewUser, User};

#[derive(Debug, Clone)]
struct UserRecord {
    user: User,
    password_hash: String,
    reset_token: Option<String>,
}

#[derive(Debug, Default)]
struct UserTable {
    next_id: i32,
    rows: BTreeMap<UserId, UserRecord>,
}

impl UserTable {
    fn find(&self, pred: impl Fn(&UserRecord) -> bool) -> Option<&UserRecord> {
        self.rows.values().find(|&r| pred(r))
    }
}

/// In-memory [`UserRepository`].
#[derive(Debug, Default)]
pub struct MemoryUserRepository {
    table: Mutex<UserTable>,
}

impl MemoryUserRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The reset token currently stored for `id`, if any.
    pub async fn reset_token_of(&self, id: UserId) -> Option<String> {
        self.table
            .lock()
            .await
            .rows
            .get(&id)
            .and_then(|r| r.reset_token.clone())
    }

    /// The password hash currently stored for `id`, if any.
    pub async fn password_hash_of(&self, id: UserId) -> Option<String> {
        self.table
            .lock()
            .await
            .rows
            .get(&id)
            .map(|r| r.password_hash.clone())
    }
}

fn live_token(record: &UserRecord, token: &str, now: DateTime<Utc>) -> bool {
    record.reset_token.as_deref() == Some(token) && record.user.has_live_reset(now)
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }

    async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.table.lock().await.rows.get(&id).map(|r| r.user.clone()))
    }

    async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let table = self.table.lock().await;
        Ok(table.find(|r| &r.user.email == email).map(|r| r.user.clone()))
    }

    async fn get_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let table = self.table.lock().await;
        Ok(table
            .find(|r| &r.user.email == email)
            .map(|r| (r.user.clone(), r.password_hash.clone())))
    }

    async fn create(&self, new_user: &NewUser) -> Result<User, RepositoryError> {
        let mut table = self.table.lock().await;
        if table.find(|r| r.user.email == new_user.email).is_some() {
            return Err(RepositoryError::Conflict("email already exists".to_string()));
        }

        table.next_id += 1;
        let now = Utc::now();
        let user = User {
            id: UserId::new(table.next_id),
            name: new_user.name.clone(),
            email: new_user.email.clone(),
            reset_expires_at: None,
            created_at: now,
            updated_at: now,
        };
        table.rows.insert(
            user.id,
            UserRecord {
                user: user.clone(),
                password_hash: new_user.password_hash.clone(),
                reset_token: None,
            },
        );
        Ok(user)
    }

    async fn set_reset_token(
        &self,
        id: UserId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut table = self.table.lock().await;
        let record = table.rows.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        record.reset_token = Some(token.to_string());
        record.user.reset_expires_at = Some(expires_at);
        record.user.updated_at = Utc::now();
        Ok(())
    }

    async fn find_by_reset_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, RepositoryError> {
        let table = self.table.lock().await;
        Ok(table
            .find(|r| live_token(r, token, now))
            .map(|r| r.user.clone()))
    }

    async fn reset_password(
        &self,
        token: &str,
        now: DateTime<Utc>,
        password_hash: &str,
    ) -> Result<Option<User>, RepositoryError> {
        let mut table = self.table.lock().await;
        let Some(record) = table.rows.values_mut().find(|r| live_token(r, token, now)) else {
            return Ok(None);
        };

        record.password_hash = password_hash.to_string();
        record.reset_token = None;
        record.user.reset_expires_at = None;
        record.user.updated_at = Utc::now();
        Ok(Some(record.user.clone()))
    }
}

#[derive(Debug, Default)]
struct StoreTable {
    next_id: i32,
    rows: BTreeMap<StoreId, Store>,
}

impl StoreTable {
    fn slug_taken(&self, slug: &Slug, except: Option<StoreId>) -> bool {
        self.rows
            .values()
            .any(|s| &s.slug == slug && Some(s.id) != except)
    }
}

/// In-memory [`StoreRepository`].
#[derive(Debug, Default)]
pub struct MemoryStoreRepository {
    table: Mutex<StoreTable>,
}

impl MemoryStoreRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StoreRepository for MemoryStoreRepository {
    async fn list(&self) -> Result<Vec<Store>, RepositoryError> {
        Ok(self.table.lock().await.rows.values().cloned().collect())
    }

    async fn get_by_id(&self, id: StoreId) -> Result<Option<Store>, RepositoryError> {
        Ok(self.table.lock().await.rows.get(&id).cloned())
    }

    async fn get_by_slug(&self, slug: &Slug) -> Result<Option<Store>, RepositoryError> {
        let table = self.table.lock().await;
        Ok(table.rows.values().find(|s| &s.slug == slug).cloned())
    }

    async fn slugs_with_base(
        &self,
        base: &Slug,
        exclude: Option<StoreId>,
    ) -> Result<Vec<Slug>, RepositoryError> {
        let table = self.table.lock().await;
        Ok(table
            .rows
            .values()
            .filter(|s| Some(s.id) != exclude && s.slug.suffix_relative_to(base).is_some())
            .map(|s| s.slug.clone())
            .collect())
    }

    async fn create(&self, new_store: &NewStore) -> Result<Store, RepositoryError> {
        let mut table = self.table.lock().await;
        if table.slug_taken(&new_store.slug, None) {
            return Err(RepositoryError::Conflict("slug already exists".to_string()));
        }

        table.next_id += 1;
        let store = Store {
            id: StoreId::new(table.next_id),
            name: new_store.name.clone(),
            slug: new_store.slug.clone(),
            description: new_store.description.clone(),
            tags: new_store.tags.clone(),
            location: new_store.location.clone(),
            photo: new_store.photo.clone(),
            author: new_store.author,
            created_at: Utc::now(),
        };
        table.rows.insert(store.id, store.clone());
        Ok(store)
    }

    async fn update(
        &self,
        id: StoreId,
        update: &StoreUpdate,
    ) -> Result<Option<Store>, RepositoryError> {
        let mut table = self.table.lock().await;
        if let Some(slug) = &update.slug
            && table.slug_taken(slug, Some(id))
        {
            return Err(RepositoryError::Conflict("slug already exists".to_string()));
        }

        let Some(store) = table.rows.get_mut(&id) else {
            return Ok(None);
        };
        update.apply_to(store);
        Ok(Some(store.clone()))
    }

    async fn list_by_tag(&self, tag: Option<&str>) -> Result<Vec<Store>, RepositoryError> {
        let table = self.table.lock().await;
        Ok(table
            .rows
            .values()
            .filter(|s| match tag {
                Some(tag) => s.tags.iter().any(|t| t == tag),
                None => !s.tags.is_empty(),
            })
            .cloned()
            .collect())
    }

    async fn tag_counts(&self) -> Result<Vec<TagCount>, RepositoryError> {
        let table = self.table.lock().await;
        let mut counts: BTreeMap<&str, i64> = BTreeMap::new();
        for tag in table.rows.values().flat_map(|s| s.tags.iter()) {
            *counts.entry(tag.as_str()).or_default() += 1;
        }

        let mut tags: Vec<TagCount> = counts
            .into_iter()
            .map(|(tag, count)| TagCount {
                tag: tag.to_string(),
                count,
            })
            .collect();
        // BTreeMap already yields tags alphabetically; the stable sort keeps that
        // order among equal counts.
        tags.sort_by(|a, b| b.count.cmp(&a.count));
        Ok(tags)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::models::store::{Coordinates, Location};

    fn new_store(name: &str, slug: &str, tags: &[&str]) -> NewStore {
        NewStore {
            name: name.to_string(),
            slug: Slug::parse(slug).unwrap(),
            description: String::new(),
            tags: tags.iter().map(ToString::to_string).collect(),
            location: None,
            photo: None,
            author: None,
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let repo = MemoryUserRepository::new();
        let new_user = NewUser {
            name: "Wes".to_string(),
            email: Email::parse("wes@example.com").unwrap(),
            password_hash: "hash".to_string(),
        };
        repo.create(&new_user).await.unwrap();
        assert!(matches!(
            repo.create(&new_user).await,
            Err(RepositoryError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_reset_password_is_single_use() {
        let repo = MemoryUserRepository::new();
        let user = repo
            .create(&NewUser {
                name: "Wes".to_string(),
                email: Email::parse("wes@example.com").unwrap(),
                password_hash: "old".to_string(),
            })
            .await
            .unwrap();
        let now = Utc::now();
        repo.set_reset_token(user.id, "tok", now + Duration::hours(1))
            .await
            .unwrap();

        assert!(repo.reset_password("tok", now, "new").await.unwrap().is_some());
        assert!(repo.reset_password("tok", now, "newer").await.unwrap().is_none());
        assert_eq!(repo.password_hash_of(user.id).await.unwrap(), "new");
        assert_eq!(repo.reset_token_of(user.id).await, None);
    }

    #[tokio::test]
    async fn test_slugs_with_base_ignores_unrelated_and_excluded() {
        let repo = MemoryStoreRepository::new();
        let first = repo.create(&new_store("Cafe", "cafe", &[])).await.unwrap();
        repo.create(&new_store("Cafe", "cafe-2", &[])).await.unwrap();
        repo.create(&new_store("Cafe Bar", "cafe-bar", &[])).await.unwrap();

        let base = Slug::parse("cafe").unwrap();
        let mut slugs = repo.slugs_with_base(&base, None).await.unwrap();
        slugs.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        assert_eq!(
            slugs,
            vec![Slug::parse("cafe").unwrap(), Slug::parse("cafe-2").unwrap()]
        );

        let slugs = repo.slugs_with_base(&base, Some(first.id)).await.unwrap();
        assert_eq!(slugs, vec![Slug::parse("cafe-2").unwrap()]);
    }

    #[tokio::test]
    async fn test_tag_counts_sorted_by_count_then_name() {
        let repo = MemoryStoreRepository::new();
        repo.create(&new_store("A", "a", &["wifi", "vegan"])).await.unwrap();
        repo.create(&new_store("B", "b", &["wifi", "licensed"])).await.unwrap();

        let counts = repo.tag_counts().await.unwrap();
        let flat: Vec<(&str, i64)> = counts.iter().map(|t| (t.tag.as_str(), t.count)).collect();
        assert_eq!(flat, vec![("wifi", 2), ("licensed", 1), ("vegan", 1)]);
    }

    #[tokio::test]
    async fn test_update_applies_location() {
        let repo = MemoryStoreRepository::new();
        let store = repo.create(&new_store("A", "a", &[])).await.unwrap();
        let update = StoreUpdate {
            location: Some(Location::point(Coordinates::new(1.0, 2.0), None)),
            ..StoreUpdate::default()
        };

        let updated = repo.update(store.id, &update).await.unwrap().unwrap();
        assert_eq!(updated.location.unwrap().coordinates, Coordinates::new(1.0, 2.0));
        assert!(repo.update(StoreId::new(99), &update).await.unwrap().is_none());
    }
}
