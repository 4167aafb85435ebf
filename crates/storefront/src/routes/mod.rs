//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /, /stores              - Store listing
//! GET  /add                    - New store form (auth)
//! POST /stores                 - Create store (auth, multipart)
//! GET  /stores/{id}/edit       - Edit form (auth, owner)
//! POST /stores/{id}            - Update store (auth, owner, multipart)
//! GET  /store/{slug}           - Store detail
//! GET  /tags, /tags/{tag}      - Tag browsing
//!
//! # Auth
//! GET  /login                  - Login page
//! POST /login                  - Login action
//! GET  /register               - Register page
//! POST /register               - Register action
//! POST /logout                 - Logout action
//!
//! # Password reset
//! POST /account/forgot         - Email a reset link
//! GET  /account/reset/{token}  - New password form
//! POST /account/reset/{token}  - Set new password
//!
//! # Health
//! GET  /health                 - Liveness
//! GET  /health/ready           - Readiness (database)
//! ```

pub mod account;
pub mod auth;
pub mod stores;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/register", get(auth::register_page).post(auth::register))
        .route("/logout", post(auth::logout))
}

/// Create the password reset routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/forgot", post(account::forgot))
        .route(
            "/reset/{token}",
            get(account::reset_page).post(account::reset),
        )
}

/// Create the store routes router.
pub fn store_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(stores::index))
        .route("/stores", get(stores::index).post(stores::create))
        .route("/add", get(stores::add))
        .route("/stores/{id}", post(stores::update))
        .route("/stores/{id}/edit", get(stores::edit))
        .route("/store/{slug}", get(stores::show))
        .route("/tags", get(stores::tags))
        .route("/tags/{tag}", get(stores::tag))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(store_routes())
        .merge(auth_routes())
        .nest("/account", account_routes())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.users().ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
