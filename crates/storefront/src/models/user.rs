//! User domain types.

use chrono::{DateTime, Utc};

use delicious_core::{Email, UserId};

/// A registered storefront user (domain type).
///
/// The password hash and reset token never leave the repository; only the
/// reset expiry is exposed so callers can tell whether a reset is pending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// User's email address (unique, normalized).
    pub email: Email,
    /// Expiry of the outstanding password reset token, if one was issued.
    pub reset_expires_at: Option<DateTime<Utc>>,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the user was last updated.
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Whether a reset token is outstanding and still usable at `now`.
    #[must_use]
    pub fn has_live_reset(&self, now: DateTime<Utc>) -> bool {
        self.reset_expires_at.is_some_and(|expires| expires > now)
    }
}

/// Data needed to insert a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: Email,
    pub password_hash: String,
}
