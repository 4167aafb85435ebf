//! Delicious storefront library.
//!
//! A server-rendered site for listing stores, browsing them by tag, and
//! managing accounts. The binary wires [`app`] to `PostgreSQL`; tests build
//! the same router over memory-backed repositories and sessions.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use axum::{Router, body::Body, extract::DefaultBodyLimit, http::Request};
use tower_http::{services::ServeDir, trace::TraceLayer};
use tower_sessions::SessionStore;

use crate::middleware::{create_session_layer, request_id_middleware};
use crate::state::AppState;

/// Build the storefront router over the given state and session store.
///
/// Sentry layers are added by the binary so tests don't need a hub.
pub fn app<S>(state: AppState, session_store: S) -> Router
where
    S: SessionStore + Clone,
{
    let config = state.config();
    let session_layer = create_session_layer(session_store, config);

    Router::new()
        .merge(routes::routes())
        .nest_service("/uploads", ServeDir::new(&config.uploads_dir))
        .nest_service("/static", ServeDir::new(&config.static_dir))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(session_layer)
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
        .with_state(state)
}
