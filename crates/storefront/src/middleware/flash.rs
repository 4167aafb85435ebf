//! Flash message queue kept in the session.
//!
//! Handlers push messages before redirecting; the next rendered page drains
//! them through [`crate::middleware::Page`].

use tower_sessions::Session;
use tower_sessions::session::Error as SessionError;

use crate::models::{Flash, session_keys};

/// Queue a flash message for the next rendered page.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn push_flash(session: &Session, flash: Flash) -> Result<(), SessionError> {
    let mut queued: Vec<Flash> = session
        .get(session_keys::FLASH)
        .await?
        .unwrap_or_default();
    queued.push(flash);
    session.insert(session_keys::FLASH, queued).await
}

/// Remove and return every queued flash message.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn take_flashes(session: &Session) -> Result<Vec<Flash>, SessionError> {
    Ok(session
        .remove::<Vec<Flash>>(session_keys::FLASH)
        .await?
        .unwrap_or_default())
}
