//! Password reset routes.
//!
//! `POST /account/forgot` answers the same way whether or not the email
//! belongs to an account.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;

use crate::error::Result;
use crate::middleware::{Page, push_flash, set_current_user};
use crate::models::{CurrentUser, Flash};
use crate::services::email::{EmailError, PasswordResetEmail};
use crate::services::password_reset::{IssueOutcome, ResetError, passwords_match};
use crate::state::AppState;

const RESET_SENT_MESSAGE: &str = "You have been emailed a password reset link.";

/// Forgot password form data.
#[derive(Deserialize)]
pub struct ForgotForm {
    pub email: String,
}

/// Reset password form data.
#[derive(Deserialize)]
pub struct ResetForm {
    pub password: String,
    #[serde(rename = "password-confirm")]
    pub password_confirm: String,
}

/// Reset password page.
#[derive(Template, WebTemplate)]
#[template(path = "reset.html")]
pub struct ResetTemplate {
    pub page: Page,
    pub token: String,
}

/// Tokens are hex; anything else can't match and must not reach a `Location` header.
fn is_plausible_token(token: &str) -> bool {
    !token.is_empty() && token.len() <= 128 && token.chars().all(|c| c.is_ascii_alphanumeric())
}

fn reset_path(token: &str) -> String {
    format!("/account/reset/{token}")
}

/// Flash the invalid-token message and send the visitor to the login page.
async fn invalid_token(session: &Session) -> Result<Response> {
    push_flash(session, Flash::error(ResetError::InvalidOrExpired.to_string())).await?;
    Ok(Redirect::to("/login").into_response())
}

/// Issue a reset token and email the link.
///
/// Delivery failures are logged and reported but never shown, so the reply
/// is the same for every submitted address.
#[tracing::instrument(skip_all)]
pub async fn forgot(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<ForgotForm>,
) -> Result<Response> {
    if let IssueOutcome::Issued { user, token, .. } = state.resets().issue(&form.email).await? {
        let reset_url = format!(
            "{}{}",
            state.config().base_url,
            reset_path(token.as_str())
        );
        let email = PasswordResetEmail {
            to: user.email.as_str(),
            name: &user.name,
            reset_url: &reset_url,
        };
        if let Err(e) = send_reset_email(&state, &email).await {
            let event_id = sentry::capture_error(&e);
            tracing::error!(
                error = %e,
                user_id = %user.id,
                sentry_event_id = %event_id,
                "failed to send password reset email"
            );
        }
    }

    push_flash(&session, Flash::success(RESET_SENT_MESSAGE)).await?;
    Ok(Redirect::to("/login").into_response())
}

async fn send_reset_email(
    state: &AppState,
    email: &PasswordResetEmail<'_>,
) -> std::result::Result<(), EmailError> {
    let message = email.render()?;
    state.mailer().send(&message).await
}

/// Show the new-password form for a live token.
pub async fn reset_page(
    State(state): State<AppState>,
    session: Session,
    Path(token): Path<String>,
) -> Result<Response> {
    if !is_plausible_token(&token) {
        return invalid_token(&session).await;
    }

    match state.resets().validate(&token).await {
        Ok(_) => {
            let page = Page::from_session(&session).await?;
            Ok(ResetTemplate { page, token }.into_response())
        }
        Err(ResetError::InvalidOrExpired) => invalid_token(&session).await,
        Err(e) => Err(e.into()),
    }
}

/// Set the new password, clear the token and log the user in.
#[tracing::instrument(skip_all)]
pub async fn reset(
    State(state): State<AppState>,
    session: Session,
    Path(token): Path<String>,
    Form(form): Form<ResetForm>,
) -> Result<Response> {
    if !is_plausible_token(&token) {
        return invalid_token(&session).await;
    }

    if !passwords_match(&form.password, &form.password_confirm) {
        push_flash(&session, Flash::error(ResetError::PasswordMismatch.to_string())).await?;
        return Ok(Redirect::to(&reset_path(&token)).into_response());
    }

    match state.resets().consume(&token, &form.password).await {
        Ok(user) => {
            set_current_user(&session, &CurrentUser::from(&user)).await?;
            push_flash(
                &session,
                Flash::success("Your password has been reset, you are now logged in!"),
            )
            .await?;
            Ok(Redirect::to("/").into_response())
        }
        Err(ResetError::WeakPassword(msg)) => {
            push_flash(&session, Flash::error(msg)).await?;
            Ok(Redirect::to(&reset_path(&token)).into_response())
        }
        Err(ResetError::InvalidOrExpired) => invalid_token(&session).await,
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_plausible_token() {
        assert!(is_plausible_token(&"ab12".repeat(10)));
        assert!(!is_plausible_token(""));
        assert!(!is_plausible_token("abc\r\nSet-Cookie: x"));
        assert!(!is_plausible_token("../login"));
        assert!(!is_plausible_token(&"a".repeat(129)));
    }
}
