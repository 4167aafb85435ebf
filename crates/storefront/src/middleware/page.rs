//! Per-page context for rendered templates.

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use super::auth::current_user;
use super::flash::take_flashes;
use crate::error::AppError;
use crate::models::{CurrentUser, Flash};

/// What every layout needs: the logged-in user and the drained flash queue.
///
/// Extracting a `Page` consumes the queued flashes, so handlers that may
/// still redirect call [`Page::from_session`] once they know they render.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub user: Option<CurrentUser>,
    pub flashes: Vec<Flash>,
}

impl Page {
    /// Build the context from a session, draining its flash queue.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store fails.
    pub async fn from_session(session: &Session) -> Result<Self, AppError> {
        Ok(Self {
            user: current_user(session).await?,
            flashes: take_flashes(session).await?,
        })
    }

    #[must_use]
    pub const fn is_logged_in(&self) -> bool {
        self.user.is_some()
    }
}

impl<S> FromRequestParts<S> for Page
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<Session>() {
            Some(session) => Self::from_session(session).await,
            None => Ok(Self::default()),
        }
    }
}
