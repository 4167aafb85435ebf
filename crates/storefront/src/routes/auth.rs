//! Login, registration and logout.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;

use crate::error::{AppError, Result};
use crate::middleware::{Page, clear_current_user, push_flash, set_current_user};
use crate::models::{CurrentUser, Flash};
use crate::services::auth::AuthError;
use crate::state::AppState;

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
#[derive(Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Registration form data.
#[derive(Deserialize)]
pub struct RegisterForm {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(rename = "password-confirm")]
    pub password_confirm: String,
}

// =============================================================================
// Templates
// =============================================================================

/// Login page, including the forgotten-password form.
#[derive(Template, WebTemplate)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub page: Page,
}

/// Registration page.
#[derive(Template, WebTemplate)]
#[template(path = "register.html")]
pub struct RegisterTemplate {
    pub page: Page,
}

// =============================================================================
// Login / Logout
// =============================================================================

/// Display the login page.
pub async fn login_page(page: Page) -> impl IntoResponse {
    LoginTemplate { page }
}

/// Handle login form submission.
#[tracing::instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    match state.auth().login(&form.email, &form.password).await {
        Ok(user) => {
            set_current_user(&session, &CurrentUser::from(&user)).await?;
            push_flash(&session, Flash::success("You are now logged in!")).await?;
            Ok(Redirect::to("/").into_response())
        }
        Err(AuthError::InvalidCredentials) => {
            tracing::info!("login failed");
            push_flash(&session, Flash::error("Failed login")).await?;
            Ok(Redirect::to("/login").into_response())
        }
        Err(e) => Err(e.into()),
    }
}

/// Handle logout.
pub async fn logout(session: Session) -> Result<Response> {
    clear_current_user(&session).await?;
    push_flash(&session, Flash::success("You are now logged out!")).await?;
    Ok(Redirect::to("/").into_response())
}

// =============================================================================
// Registration
// =============================================================================

/// Display the registration page.
pub async fn register_page(page: Page) -> impl IntoResponse {
    RegisterTemplate { page }
}

/// Handle registration form submission.
///
/// A taken email is reported without confirming that the account exists.
#[tracing::instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RegisterForm>,
) -> Result<Response> {
    let result = state
        .auth()
        .register(
            &form.name,
            &form.email,
            &form.password,
            &form.password_confirm,
        )
        .await;

    let message = match result {
        Ok(user) => {
            set_current_user(&session, &CurrentUser::from(&user)).await?;
            push_flash(
                &session,
                Flash::success(format!("Welcome, {}! You are now logged in.", user.name)),
            )
            .await?;
            return Ok(Redirect::to("/").into_response());
        }
        Err(AuthError::MissingField(field)) => format!("You must supply a {field}!"),
        Err(AuthError::InvalidEmail(_)) => "That email is not valid!".to_string(),
        Err(AuthError::WeakPassword(msg)) => msg,
        Err(AuthError::PasswordMismatch) => "Passwords do not match!".to_string(),
        Err(AuthError::UserAlreadyExists) => {
            "Could not register with those details. Try logging in instead.".to_string()
        }
        Err(e) => return Err(AppError::from(e)),
    };

    push_flash(&session, Flash::error(message)).await?;
    Ok(Redirect::to("/register").into_response())
}
