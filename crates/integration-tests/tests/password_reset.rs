//! Forgotten password flow: issue, validate, consume.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::Arc;

use axum::http::StatusCode;
use chrono::Duration;

use delicious_integration_tests::{BASE_URL, FailingMailer, TestApp};

const SENT: &str = "You have been emailed a password reset link.";
const INVALID: &str = "Password reset is invalid or has expired";

async fn app_with_user() -> TestApp {
    let mut app = TestApp::new();
    app.register("Wes", "wes@example.com", "old password").await;
    app.logout().await;
    app
}

async fn request_reset(app: &mut TestApp, email: &str) -> String {
    let response = app.post_form("/account/forgot", &[("email", email)]).await;
    assert_eq!(response.redirect_target(), "/login");
    let page = app.follow(&response).await;
    assert!(page.body.contains(SENT));
    app.mailer.last_reset_token().unwrap()
}

async fn reset(app: &mut TestApp, token: &str, password: &str, confirm: &str) -> String {
    let response = app
        .post_form(
            &format!("/account/reset/{token}"),
            &[("password", password), ("password-confirm", confirm)],
        )
        .await;
    response.redirect_target().to_string()
}

#[tokio::test]
async fn test_forgot_answers_the_same_for_unknown_email() {
    let mut app = app_with_user().await;

    for email in ["nobody@example.com", "not an email"] {
        let response = app.post_form("/account/forgot", &[("email", email)]).await;
        assert_eq!(response.redirect_target(), "/login");
        assert!(app.follow(&response).await.body.contains(SENT));
    }

    assert!(app.mailer.sent().is_empty());
}

#[tokio::test]
async fn test_failed_delivery_answers_like_unknown_email() {
    let mut app = TestApp::with_mailer(Arc::new(FailingMailer));
    app.register("Wes", "wes@example.com", "old password").await;
    app.logout().await;

    let mut answers = Vec::new();
    for email in ["wes@example.com", "nobody@example.com"] {
        let response = app.post_form("/account/forgot", &[("email", email)]).await;
        let page = app.follow(&response).await;
        answers.push((
            response.status,
            response.location.clone(),
            page.body.contains(SENT),
        ));
    }

    assert_eq!(answers[0], answers[1]);
    assert_eq!(
        answers[0],
        (StatusCode::SEE_OTHER, Some("/login".to_string()), true)
    );
}

#[tokio::test]
async fn test_reset_email_carries_link() {
    let mut app = app_with_user().await;
    let token = request_reset(&mut app, "WES@example.com").await;

    let sent = app.mailer.sent();
    assert_eq!(sent.len(), 1);
    let email = &sent[0];
    assert_eq!(email.to, "wes@example.com");
    assert_eq!(email.subject, "Password Reset");
    assert_eq!(token.len(), 40);
    assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    let link = format!("{BASE_URL}/account/reset/{token}");
    assert!(email.text.contains(&link));
    assert!(email.html.contains(&link));
}

#[tokio::test]
async fn test_full_reset_flow() {
    let mut app = app_with_user().await;
    let token = request_reset(&mut app, "wes@example.com").await;

    let form = app.get(&format!("/account/reset/{token}")).await;
    assert_eq!(form.status, StatusCode::OK);
    assert!(form.body.contains("Reset your password"));

    assert_eq!(reset(&mut app, &token, "new password", "new password").await, "/");
    let home = app.get("/").await;
    assert!(home.body.contains("Your password has been reset, you are now logged in!"));
    assert_eq!(app.get("/add").await.status, StatusCode::OK);

    app.logout().await;
    assert_eq!(
        app.login("wes@example.com", "old password").await.redirect_target(),
        "/login"
    );
    app.get("/login").await;
    assert_eq!(
        app.login("wes@example.com", "new password").await.redirect_target(),
        "/"
    );
}

#[tokio::test]
async fn test_token_is_single_use() {
    let mut app = app_with_user().await;
    let token = request_reset(&mut app, "wes@example.com").await;

    assert_eq!(reset(&mut app, &token, "new password", "new password").await, "/");
    app.logout().await;

    assert_eq!(
        reset(&mut app, &token, "third password", "third password").await,
        "/login"
    );
    assert!(app.get("/login").await.body.contains(INVALID));

    let again = app.get(&format!("/account/reset/{token}")).await;
    assert_eq!(again.redirect_target(), "/login");
}

#[tokio::test]
async fn test_expired_token_is_rejected() {
    let mut app = app_with_user().await;
    let token = request_reset(&mut app, "wes@example.com").await;

    app.clock.advance(Duration::minutes(59));
    assert_eq!(
        app.get(&format!("/account/reset/{token}")).await.status,
        StatusCode::OK
    );

    app.clock.advance(Duration::minutes(2));
    let response = app.get(&format!("/account/reset/{token}")).await;
    assert_eq!(response.redirect_target(), "/login");
    assert!(app.follow(&response).await.body.contains(INVALID));

    assert_eq!(
        reset(&mut app, &token, "new password", "new password").await,
        "/login"
    );
}

#[tokio::test]
async fn test_new_request_replaces_old_token() {
    let mut app = app_with_user().await;
    let first = request_reset(&mut app, "wes@example.com").await;
    let second = request_reset(&mut app, "wes@example.com").await;
    assert_ne!(first, second);

    assert_eq!(
        app.get(&format!("/account/reset/{first}")).await.redirect_target(),
        "/login"
    );
    assert_eq!(
        app.get(&format!("/account/reset/{second}")).await.status,
        StatusCode::OK
    );
}

#[tokio::test]
async fn test_mismatch_and_weak_password_keep_token() {
    let mut app = app_with_user().await;
    let token = request_reset(&mut app, "wes@example.com").await;
    let path = format!("/account/reset/{token}");

    assert_eq!(reset(&mut app, &token, "new password", "other password").await, path);
    assert!(app.get(&path).await.body.contains("Passwords do not match!"));

    assert_eq!(reset(&mut app, &token, "short", "short").await, path);
    assert!(app.get(&path).await.body.contains("at least 8 characters"));

    assert_eq!(reset(&mut app, &token, "new password", "new password").await, "/");
}

#[tokio::test]
async fn test_garbage_tokens_are_invalid() {
    let mut app = app_with_user().await;

    let long = "a".repeat(200);
    for token in ["deadbeef", "not-hex", long.as_str()] {
        let response = app.get(&format!("/account/reset/{token}")).await;
        assert_eq!(response.redirect_target(), "/login");
    }
    assert!(app.get("/login").await.body.contains(INVALID));
}
