//! Application state shared across handlers.

use std::sync::Arc;

use lettre::transport::smtp::Error as SmtpError;
use sqlx::PgPool;

use crate::config::StorefrontConfig;
use crate::db::{PgStoreRepository, PgUserRepository, StoreRepository, UserRepository};
use crate::services::auth::AuthService;
use crate::services::clock::{Clock, SystemClock};
use crate::services::email::{LogMailer, Mailer, SmtpMailer};
use crate::services::password_reset::PasswordResetService;
use crate::services::photos::{DiskPhotoProcessor, PhotoProcessor};
use crate::services::stores::StoreService;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`; every collaborator sits behind
/// a trait object so tests can swap in memory-backed versions.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    users: Arc<dyn UserRepository>,
    auth: AuthService,
    resets: PasswordResetService,
    stores: StoreService,
    mailer: Arc<dyn Mailer>,
    photos: Arc<dyn PhotoProcessor>,
}

impl AppState {
    /// Create application state from its collaborators.
    #[must_use]
    pub fn new(
        config: StorefrontConfig,
        users: Arc<dyn UserRepository>,
        stores: Arc<dyn StoreRepository>,
        mailer: Arc<dyn Mailer>,
        photos: Arc<dyn PhotoProcessor>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                auth: AuthService::new(users.clone()),
                resets: PasswordResetService::new(users.clone(), clock),
                stores: StoreService::new(stores),
                config,
                users,
                mailer,
                photos,
            }),
        }
    }

    /// Create production state over a `PostgreSQL` pool.
    ///
    /// Mail goes through SMTP when configured and to the log otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the SMTP relay configuration is invalid.
    pub fn postgres(config: StorefrontConfig, pool: &PgPool) -> Result<Self, SmtpError> {
        let mailer: Arc<dyn Mailer> = match &config.email {
            Some(email) => Arc::new(SmtpMailer::new(email)?),
            None => {
                tracing::warn!("SMTP_HOST not set, password reset emails will only be logged");
                Arc::new(LogMailer)
            }
        };
        let photos = Arc::new(DiskPhotoProcessor::new(
            config.uploads_dir.clone(),
            config.photo_max_width,
        ));

        Ok(Self::new(
            config,
            Arc::new(PgUserRepository::new(pool.clone())),
            Arc::new(PgStoreRepository::new(pool.clone())),
            mailer,
            photos,
            Arc::new(SystemClock),
        ))
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// The user repository, for readiness checks.
    #[must_use]
    pub fn users(&self) -> &dyn UserRepository {
        self.inner.users.as_ref()
    }

    #[must_use]
    pub fn auth(&self) -> &AuthService {
        &self.inner.auth
    }

    #[must_use]
    pub fn resets(&self) -> &PasswordResetService {
        &self.inner.resets
    }

    #[must_use]
    pub fn stores(&self) -> &StoreService {
        &self.inner.stores
    }

    #[must_use]
    pub fn mailer(&self) -> &dyn Mailer {
        self.inner.mailer.as_ref()
    }

    #[must_use]
    pub fn photos(&self) -> &dyn PhotoProcessor {
        self.inner.photos.as_ref()
    }
}
