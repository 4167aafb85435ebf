//! Password reset tokens.
//!
//! A token is 20 random bytes, hex encoded, stored on the user row with an
//! expiry one hour out. Validation and consumption both require the expiry to
//! be strictly in the future, and consumption clears the token in the same
//! statement that sets the new password, so a token works at most once.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use thiserror::Error;
use tracing::instrument;

use delicious_core::Email;

use super::auth::{self, AuthError};
use super::clock::Clock;
use crate::db::{RepositoryError, UserRepository};
use crate::models::user::User;

/// Random bytes per token.
const TOKEN_BYTES: usize = 20;

/// How long an issued token stays usable.
pub const TOKEN_TTL: Duration = Duration::hours(1);

/// Errors from the reset flow.
#[derive(Debug, Error)]
pub enum ResetError {
    /// No user holds this token, or it has expired. The two are not told apart.
    #[error("Password reset is invalid or has expired")]
    InvalidOrExpired,

    /// New password and confirmation differ.
    #[error("Passwords do not match!")]
    PasswordMismatch,

    /// New password too short.
    #[error("{0}")]
    WeakPassword(String),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}

impl From<AuthError> for ResetError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::WeakPassword(msg) => Self::WeakPassword(msg),
            AuthError::Repository(e) => Self::Repository(e),
            _ => Self::PasswordHash,
        }
    }
}

/// An opaque reset token.
///
/// `Debug` is redacted; the value only leaves through [`ResetToken::as_str`].
#[derive(Clone, PartialEq, Eq)]
pub struct ResetToken(String);

impl ResetToken {
    /// Generate a fresh token from the thread-local CSPRNG.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::rng().fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ResetToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ResetToken([REDACTED])")
    }
}

/// Result of asking for a reset.
///
/// Callers must present both variants the same way so the response does not
/// reveal whether an account exists.
#[derive(Debug)]
pub enum IssueOutcome {
    Issued {
        user: User,
        token: ResetToken,
        expires_at: DateTime<Utc>,
    },
    UnknownEmail,
}

/// Whether a new password and its confirmation agree.
#[must_use]
pub fn passwords_match(password: &str, confirm: &str) -> bool {
    password == confirm
}

/// Issues, validates and consumes reset tokens.
#[derive(Clone)]
pub struct PasswordResetService {
    users: Arc<dyn UserRepository>,
    clock: Arc<dyn Clock>,
}

impl PasswordResetService {
    #[must_use]
    pub fn new(users: Arc<dyn UserRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { users, clock }
    }

    /// Issue a token for the account registered under `email`.
    ///
    /// Any previously issued token for that user is replaced.
    ///
    /// # Errors
    ///
    /// Returns `ResetError::Repository` if the lookup or write fails.
    #[instrument(skip_all, fields(email = %email))]
    pub async fn issue(&self, email: &str) -> Result<IssueOutcome, ResetError> {
        let Ok(email) = Email::parse(email) else {
            return Ok(IssueOutcome::UnknownEmail);
        };
        let Some(user) = self.users.get_by_email(&email).await? else {
            tracing::info!("reset requested for unknown email");
            return Ok(IssueOutcome::UnknownEmail);
        };

        let token = ResetToken::generate();
        let expires_at = self.clock.now() + TOKEN_TTL;
        self.users
            .set_reset_token(user.id, token.as_str(), expires_at)
            .await?;

        tracing::info!(user_id = %user.id, %expires_at, "reset token issued");
        Ok(IssueOutcome::Issued {
            user,
            token,
            expires_at,
        })
    }

    /// Look up the owner of a live token.
    ///
    /// # Errors
    ///
    /// Returns `ResetError::InvalidOrExpired` for unknown and expired tokens alike.
    #[instrument(skip_all)]
    pub async fn validate(&self, token: &str) -> Result<User, ResetError> {
        self.users
            .find_by_reset_token(token, self.clock.now())
            .await?
            .ok_or(ResetError::InvalidOrExpired)
    }

    /// Set a new password using a live token, clearing the token.
    ///
    /// # Errors
    ///
    /// Returns `ResetError::WeakPassword` if the password is too short.
    /// Returns `ResetError::InvalidOrExpired` if the token is unknown, expired,
    /// or was already used.
    #[instrument(skip_all)]
    pub async fn consume(&self, token: &str, new_password: &str) -> Result<User, ResetError> {
        auth::validate_password(new_password)?;
        let password_hash = auth::hash_password(new_password)?;

        let user = self
            .users
            .reset_password(token, self.clock.now(), &password_hash)
            .await?
            .ok_or(ResetError::InvalidOrExpired)?;

        tracing::info!(user_id = %user.id, "password reset");
        Ok(user)
    }
}
