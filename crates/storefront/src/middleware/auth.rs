//! Authentication extractors.
//!
//! Extractors run in handler-signature order, so a handler taking
//! `RequireAuth` never runs for an anonymous request: the extractor queues a
//! flash message and redirects to `/login` instead.

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;
use tower_sessions::session::Error as SessionError;

use super::flash::push_flash;
use crate::error::{clear_sentry_user, set_sentry_user};
use crate::models::{CurrentUser, Flash, session_keys};

/// Message shown when an anonymous visitor hits a protected page.
pub const LOGIN_REQUIRED_MESSAGE: &str = "You must be logged in to do that";

/// Extractor that requires a logged-in user.
///
/// # Example
///
/// ```rust,ignore
/// async fn add_store(RequireAuth(user): RequireAuth) -> impl IntoResponse {
///     format!("Hello, {}!", user.name)
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

/// Rejection for [`RequireAuth`].
#[derive(Debug)]
pub enum AuthRejection {
    /// Not logged in; redirect to the login page.
    RedirectToLogin,
    /// No session layer or the session store failed.
    SessionUnavailable,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin => Redirect::to("/login").into_response(),
            Self::SessionUnavailable => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        }
    }
}

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .ok_or(AuthRejection::SessionUnavailable)?;

        let user = current_user(session).await.map_err(|e| {
            tracing::error!(error = %e, "failed to read session");
            AuthRejection::SessionUnavailable
        })?;

        match user {
            Some(user) => {
                set_sentry_user(&user.id, Some(user.email.as_str()));
                Ok(Self(user))
            }
            None => {
                if let Err(e) = push_flash(session, Flash::error(LOGIN_REQUIRED_MESSAGE)).await {
                    tracing::warn!(error = %e, "failed to queue login flash");
                }
                Err(AuthRejection::RedirectToLogin)
            }
        }
    }
}

/// The user stored in the session, if any.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn current_user(session: &Session) -> Result<Option<CurrentUser>, SessionError> {
    session.get(session_keys::CURRENT_USER).await
}

/// Whether the session belongs to a logged-in user.
pub async fn is_authenticated(session: &Session) -> bool {
    matches!(current_user(session).await, Ok(Some(_)))
}

/// Log a user in: cycle the session ID, then store the user.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(session: &Session, user: &CurrentUser) -> Result<(), SessionError> {
    session.cycle_id().await?;
    session.insert(session_keys::CURRENT_USER, user).await?;
    set_sentry_user(&user.id, Some(user.email.as_str()));
    Ok(())
}

/// Log the user out by discarding the whole session.
///
/// # Errors
///
/// Returns an error if the session cannot be deleted.
pub async fn clear_current_user(session: &Session) -> Result<(), SessionError> {
    session.flush().await?;
    clear_sentry_user();
    Ok(())
}
