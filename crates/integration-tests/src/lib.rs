//! Integration tests for the Delicious storefront.
//!
//! Tests drive the real router with `tower::ServiceExt::oneshot`. Repositories
//! and sessions live in memory, mail is recorded, photos are faked and time is
//! a [`ManualClock`], so no database or network is needed.
//!
//! ```bash
//! cargo test -p delicious-integration-tests
//! ```
//!
//! A [`TestApp`] carries the session cookie between requests like a browser.

#![allow(clippy::missing_panics_doc, clippy::unwrap_used)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use tower::ServiceExt;
use tower_sessions::MemoryStore;

use delicious_storefront::app;
use delicious_storefront::config::StorefrontConfig;
use delicious_storefront::db::memory::{MemoryStoreRepository, MemoryUserRepository};
use delicious_storefront::services::clock::ManualClock;
use delicious_storefront::services::email::{EmailError, Mailer, OutgoingEmail};
use delicious_storefront::services::photos::{PhotoError, PhotoProcessor};
use delicious_storefront::state::AppState;

/// Base URL the test app believes it is served from.
pub const BASE_URL: &str = "http://delicious.test";

/// Largest response body the helpers will read.
const MAX_BODY: usize = 1024 * 1024;

// =============================================================================
// Fakes
// =============================================================================

/// Mailer that keeps every message instead of sending it.
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
}

impl RecordingMailer {
    /// Every message sent so far.
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }

    /// The reset token from the most recent message, if any.
    pub fn last_reset_token(&self) -> Option<String> {
        let sent = self.sent.lock().unwrap();
        let text = &sent.last()?.text;
        let start = text.find("/account/reset/")? + "/account/reset/".len();
        let token: String = text
            .get(start..)?
            .chars()
            .take_while(char::is_ascii_alphanumeric)
            .collect();
        Some(token)
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), EmailError> {
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

/// Mailer whose every delivery fails.
#[derive(Debug, Default)]
pub struct FailingMailer;

#[async_trait]
impl Mailer for FailingMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), EmailError> {
        Err(EmailError::InvalidAddress(email.to.clone()))
    }
}

/// Photo processor that accepts `image/*` uploads without decoding them.
#[derive(Debug, Default)]
pub struct FakePhotoProcessor {
    uploads: AtomicUsize,
    stored: Mutex<Vec<(String, usize)>>,
}

impl FakePhotoProcessor {
    /// `(filename, byte length)` of every photo stored and not discarded.
    pub fn stored(&self) -> Vec<(String, usize)> {
        self.stored.lock().unwrap().clone()
    }

    /// How many photos were ever stored, discarded ones included.
    pub fn uploads(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PhotoProcessor for FakePhotoProcessor {
    async fn process(&self, bytes: Bytes, content_type: &str) -> Result<String, PhotoError> {
        let Some(ext) = content_type.strip_prefix("image/") else {
            return Err(PhotoError::NotAnImage(content_type.to_string()));
        };
        let n = self.uploads.fetch_add(1, Ordering::SeqCst) + 1;
        let filename = format!("photo-{n}.{ext}");
        self.stored
            .lock()
            .unwrap()
            .push((filename.clone(), bytes.len()));
        Ok(filename)
    }

    async fn discard(&self, filename: &str) -> Result<(), PhotoError> {
        self.stored.lock().unwrap().retain(|(name, _)| name != filename);
        Ok(())
    }
}

// =============================================================================
// Requests and responses
// =============================================================================

/// What a test needs from a response.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub location: Option<String>,
    pub body: String,
}

impl TestResponse {
    /// Assert a redirect and return its target.
    pub fn redirect_target(&self) -> &str {
        assert!(
            self.status.is_redirection(),
            "expected a redirect, got {}: {}",
            self.status,
            self.body
        );
        self.location.as_deref().unwrap()
    }
}

/// A multipart form body.
#[derive(Debug, Default)]
pub struct MultipartForm {
    parts: Vec<u8>,
}

impl MultipartForm {
    const BOUNDARY: &'static str = "delicious-test-boundary";

    pub fn new() -> Self {
        Self::default()
    }

    /// Add a text field.
    #[must_use]
    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.parts.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n",
                Self::BOUNDARY
            )
            .as_bytes(),
        );
        self
    }

    /// Add a file field.
    #[must_use]
    pub fn file(mut self, name: &str, filename: &str, content_type: &str, data: &[u8]) -> Self {
        self.parts.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n",
                Self::BOUNDARY
            )
            .as_bytes(),
        );
        self.parts.extend_from_slice(data);
        self.parts.extend_from_slice(b"\r\n");
        self
    }

    fn finish(mut self) -> (String, Vec<u8>) {
        self.parts
            .extend_from_slice(format!("--{}--\r\n", Self::BOUNDARY).as_bytes());
        (
            format!("multipart/form-data; boundary={}", Self::BOUNDARY),
            self.parts,
        )
    }
}

// =============================================================================
// Test application
// =============================================================================

/// The storefront wired to in-memory collaborators, plus a cookie jar of one.
pub struct TestApp {
    router: Router,
    cookie: Option<String>,
    pub users: Arc<MemoryUserRepository>,
    pub stores: Arc<MemoryStoreRepository>,
    pub mailer: Arc<RecordingMailer>,
    pub photos: Arc<FakePhotoProcessor>,
    pub clock: Arc<ManualClock>,
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

impl TestApp {
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    /// An app whose clock starts at `now`.
    pub fn starting_at(now: DateTime<Utc>) -> Self {
        Self::build(now, None)
    }

    /// An app that hands every email to `mailer` instead of recording it.
    pub fn with_mailer(mailer: Arc<dyn Mailer>) -> Self {
        Self::build(Utc::now(), Some(mailer))
    }

    fn build(now: DateTime<Utc>, mailer_override: Option<Arc<dyn Mailer>>) -> Self {
        let users = Arc::new(MemoryUserRepository::new());
        let stores = Arc::new(MemoryStoreRepository::new());
        let mailer = Arc::new(RecordingMailer::default());
        let delivery: Arc<dyn Mailer> = match mailer_override {
            Some(other) => other,
            None => mailer.clone(),
        };
        let photos = Arc::new(FakePhotoProcessor::default());
        let clock = Arc::new(ManualClock::new(now));

        let config = StorefrontConfig::with_defaults(
            SecretString::from("postgres://unused"),
            BASE_URL,
        );
        let state = AppState::new(
            config,
            users.clone(),
            stores.clone(),
            delivery,
            photos.clone(),
            clock.clone(),
        );

        Self {
            router: app(state, MemoryStore::default()),
            cookie: None,
            users,
            stores,
            mailer,
            photos,
            clock,
        }
    }

    /// Forget the session cookie, as a fresh browser would.
    pub fn clear_cookies(&mut self) {
        self.cookie = None;
    }

    async fn send(&mut self, builder: axum::http::request::Builder, body: Body) -> TestResponse {
        let builder = match &self.cookie {
            Some(cookie) => builder.header(header::COOKIE, cookie),
            None => builder,
        };
        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        if let Some(set_cookie) = response.headers().get(header::SET_COOKIE) {
            let pair = set_cookie
                .to_str()
                .unwrap()
                .split(';')
                .next()
                .unwrap_or_default()
                .to_string();
            let cleared = pair.split_once('=').is_none_or(|(_, v)| v.is_empty());
            self.cookie = if cleared { None } else { Some(pair) };
        }

        let status = response.status();
        let location = response
            .headers()
            .get(header::LOCATION)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = axum::body::to_bytes(response.into_body(), MAX_BODY)
            .await
            .unwrap();

        TestResponse {
            status,
            location,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        }
    }

    pub async fn get(&mut self, path: &str) -> TestResponse {
        self.send(Request::get(path), Body::empty()).await
    }

    pub async fn post_form(&mut self, path: &str, fields: &[(&str, &str)]) -> TestResponse {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields)
            .finish();
        self.send(
            Request::post(path).header(header::CONTENT_TYPE, "application/x-www-form-urlencoded"),
            Body::from(body),
        )
        .await
    }

    pub async fn post_multipart(&mut self, path: &str, form: MultipartForm) -> TestResponse {
        let (content_type, body) = form.finish();
        self.send(
            Request::post(path).header(header::CONTENT_TYPE, content_type),
            Body::from(body),
        )
        .await
    }

    /// Follow a redirect response with a GET.
    pub async fn follow(&mut self, response: &TestResponse) -> TestResponse {
        let target = response.redirect_target().to_string();
        self.get(&target).await
    }

    /// Register an account; the session ends up logged in as it.
    pub async fn register(&mut self, name: &str, email: &str, password: &str) -> TestResponse {
        let response = self
            .post_form(
                "/register",
                &[
                    ("name", name),
                    ("email", email),
                    ("password", password),
                    ("password-confirm", password),
                ],
            )
            .await;
        assert_eq!(response.redirect_target(), "/", "registration failed");
        response
    }

    pub async fn login(&mut self, email: &str, password: &str) -> TestResponse {
        self.post_form("/login", &[("email", email), ("password", password)])
            .await
    }

    pub async fn logout(&mut self) -> TestResponse {
        self.post_form("/logout", &[]).await
    }

    /// Submit the store form to `path` with the given text fields.
    pub async fn submit_store(&mut self, path: &str, fields: &[(&str, &str)]) -> TestResponse {
        let form = fields
            .iter()
            .fold(MultipartForm::new(), |form, (name, value)| form.text(name, value));
        self.post_multipart(path, form).await
    }
}
