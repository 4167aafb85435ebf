//! Login, logout, registration and the login gate.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;

use delicious_integration_tests::TestApp;

#[tokio::test]
async fn test_health_endpoints() {
    let mut app = TestApp::new();

    let live = app.get("/health").await;
    assert_eq!(live.status, StatusCode::OK);
    assert_eq!(live.body, "ok");

    assert_eq!(app.get("/health/ready").await.status, StatusCode::OK);
}

#[tokio::test]
async fn test_anonymous_visitor_is_sent_to_login() {
    let mut app = TestApp::new();

    let response = app.get("/add").await;
    assert_eq!(response.redirect_target(), "/login");

    let login = app.follow(&response).await;
    assert_eq!(login.status, StatusCode::OK);
    assert!(login.body.contains("You must be logged in to do that"));
}

#[tokio::test]
async fn test_gate_applies_to_store_writes() {
    let mut app = TestApp::new();

    let create = app.submit_store("/stores", &[("name", "Sneaky")]).await;
    assert_eq!(create.redirect_target(), "/login");
    assert_eq!(app.get("/stores/1/edit").await.redirect_target(), "/login");
    assert!(app.get("/stores").await.body.contains("No stores yet"));
}

#[tokio::test]
async fn test_registered_user_passes_gate() {
    let mut app = TestApp::new();
    app.register("Wes", "wes@example.com", "correct horse").await;

    let add = app.get("/add").await;
    assert_eq!(add.status, StatusCode::OK);
    assert!(add.body.contains("Add Store"));
    assert!(add.body.contains("Wes"));
}

#[tokio::test]
async fn test_login_and_logout() {
    let mut app = TestApp::new();
    app.register("Wes", "wes@example.com", "correct horse").await;

    let logout = app.logout().await;
    assert_eq!(logout.redirect_target(), "/");
    let home = app.follow(&logout).await;
    assert!(home.body.contains("You are now logged out!"));
    assert_eq!(app.get("/add").await.redirect_target(), "/login");

    let login = app.login("WES@example.com", "correct horse").await;
    assert_eq!(login.redirect_target(), "/");
    let home = app.follow(&login).await;
    assert!(home.body.contains("You are now logged in!"));
    assert_eq!(app.get("/add").await.status, StatusCode::OK);
}

#[tokio::test]
async fn test_failed_login_reveals_nothing() {
    let mut app = TestApp::new();
    app.register("Wes", "wes@example.com", "correct horse").await;
    app.logout().await;

    for (email, password) in [
        ("wes@example.com", "wrong password"),
        ("nobody@example.com", "correct horse"),
        ("not an email", "correct horse"),
    ] {
        let response = app.login(email, password).await;
        assert_eq!(response.redirect_target(), "/login");
        let page = app.follow(&response).await;
        assert!(page.body.contains("Failed login"));
    }

    assert_eq!(app.get("/add").await.redirect_target(), "/login");
}

#[tokio::test]
async fn test_flash_is_shown_once() {
    let mut app = TestApp::new();

    app.get("/add").await;
    assert!(app.get("/login").await.body.contains("You must be logged in"));
    assert!(!app.get("/login").await.body.contains("You must be logged in"));
}

#[tokio::test]
async fn test_registration_rejections() {
    let mut app = TestApp::new();
    app.register("Wes", "wes@example.com", "correct horse").await;
    app.logout().await;

    let cases = [
        (["Other", "wes@example.com", "another pass", "another pass"], "Try logging in"),
        (["Other", "other@example.com", "short", "short"], "at least 8 characters"),
        (["Other", "other@example.com", "long enough", "different!"], "Passwords do not match!"),
        (["Other", "nope", "long enough", "long enough"], "That email is not valid!"),
    ];

    for ([name, email, password, confirm], expected) in cases {
        let response = app
            .post_form(
                "/register",
                &[
                    ("name", name),
                    ("email", email),
                    ("password", password),
                    ("password-confirm", confirm),
                ],
            )
            .await;
        assert_eq!(response.redirect_target(), "/register");
        let page = app.follow(&response).await;
        assert!(page.body.contains(expected), "missing {expected:?}");
    }
}
