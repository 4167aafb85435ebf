//! Store listing, creation, editing, photos and tag browsing.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;

use delicious_integration_tests::{MultipartForm, TestApp};

async fn logged_in(name: &str, email: &str) -> TestApp {
    let mut app = TestApp::new();
    app.register(name, email, "correct horse").await;
    app
}

#[tokio::test]
async fn test_create_store_redirects_to_slug() {
    let mut app = logged_in("Wes", "wes@example.com").await;

    let response = app
        .submit_store(
            "/stores",
            &[
                ("name", "Wee Cafe"),
                ("description", "Tiny and friendly"),
                ("tags", "Wifi"),
                ("tags", "Vegetarian"),
                ("address", "1 Main St"),
                ("lng", "-79.38"),
                ("lat", "43.65"),
            ],
        )
        .await;
    assert_eq!(response.redirect_target(), "/store/wee-cafe");

    let page = app.follow(&response).await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page.body.contains("Successfully Created Wee Cafe. Care to leave a review?"));
    assert!(page.body.contains("Tiny and friendly"));
    assert!(page.body.contains("1 Main St"));
    assert!(page.body.contains("/stores/1/edit"));

    let listing = app.get("/stores").await;
    assert!(listing.body.contains("/store/wee-cafe"));
}

#[tokio::test]
async fn test_duplicate_names_get_suffixed_slugs() {
    let mut app = logged_in("Wes", "wes@example.com").await;

    let mut targets = Vec::new();
    for _ in 0..3 {
        let response = app.submit_store("/stores", &[("name", "Wee Cafe")]).await;
        targets.push(response.redirect_target().to_string());
    }

    assert_eq!(
        targets,
        ["/store/wee-cafe", "/store/wee-cafe-2", "/store/wee-cafe-3"]
    );
    for target in &targets {
        assert_eq!(app.get(target).await.status, StatusCode::OK);
    }
}

#[tokio::test]
async fn test_create_rejects_bad_input() {
    let mut app = logged_in("Wes", "wes@example.com").await;

    let cases: [(&[(&str, &str)], &str); 5] = [
        (&[("name", "   ")], "You must supply a name!"),
        (&[("name", "Half"), ("lng", "1.0")], "both a longitude and a latitude"),
        (&[("name", "Words"), ("lng", "east"), ("lat", "north")], "Coordinates must be numbers"),
        (&[("name", "Far"), ("lng", "200"), ("lat", "0")], "Coordinates must be a longitude"),
        (&[("name", "Lost"), ("address", "1 Main St")], "An address needs a longitude"),
    ];

    for (fields, expected) in cases {
        let response = app.submit_store("/stores", fields).await;
        assert_eq!(response.redirect_target(), "/add");
        let page = app.follow(&response).await;
        assert!(page.body.contains(expected), "missing {expected:?}");
    }

    assert!(app.get("/stores").await.body.contains("No stores yet"));
}

#[tokio::test]
async fn test_unknown_slug_is_not_found() {
    let mut app = TestApp::new();
    assert_eq!(app.get("/store/nowhere").await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_owner_can_edit_and_update() {
    let mut app = logged_in("Wes", "wes@example.com").await;
    app.submit_store("/stores", &[("name", "Wee Cafe"), ("tags", "Wifi")])
        .await;

    let form = app.get("/stores/1/edit").await;
    assert_eq!(form.status, StatusCode::OK);
    assert!(form.body.contains("value=\"Wee Cafe\""));
    assert!(form.body.contains("value=\"Wifi\" name=\"tags\" checked"));

    let response = app
        .submit_store(
            "/stores/1",
            &[
                ("name", "Big Cafe"),
                ("description", "Not so wee"),
                ("tags", "Open Late"),
            ],
        )
        .await;
    assert_eq!(response.redirect_target(), "/stores/1/edit");
    let page = app.follow(&response).await;
    assert!(page.body.contains("Successfully updated Big Cafe."));

    let store = app.get("/store/big-cafe").await;
    assert_eq!(store.status, StatusCode::OK);
    assert!(store.body.contains("Not so wee"));
    assert!(store.body.contains("#Open Late"));
    assert!(!store.body.contains("#Wifi"));
    assert_eq!(app.get("/store/wee-cafe").await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_non_owner_is_turned_away() {
    let mut app = logged_in("Wes", "wes@example.com").await;
    app.submit_store("/stores", &[("name", "Wee Cafe")]).await;
    app.logout().await;
    app.register("Other", "other@example.com", "correct horse").await;

    let edit = app.get("/stores/1/edit").await;
    assert_eq!(edit.redirect_target(), "/stores");
    assert!(
        app.follow(&edit)
            .await
            .body
            .contains("You must own a store in order to edit it!")
    );

    let update = app.submit_store("/stores/1", &[("name", "Stolen")]).await;
    assert_eq!(update.redirect_target(), "/stores");
    app.get("/stores").await;
    assert_eq!(app.get("/store/wee-cafe").await.status, StatusCode::OK);
    assert_eq!(app.get("/store/stolen").await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_edit_of_missing_store_is_not_found() {
    let mut app = logged_in("Wes", "wes@example.com").await;
    assert_eq!(app.get("/stores/99/edit").await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_photo_upload() {
    let mut app = logged_in("Wes", "wes@example.com").await;

    let form = MultipartForm::new()
        .text("name", "Snap Shack")
        .file("photo", "snap.png", "image/png", b"fake png bytes");
    let response = app.post_multipart("/stores", form).await;
    assert_eq!(response.redirect_target(), "/store/snap-shack");

    assert_eq!(app.photos.stored(), vec![("photo-1.png".to_string(), 14)]);
    let page = app.get("/store/snap-shack").await;
    assert!(page.body.contains("/uploads/photo-1.png"));
}

#[tokio::test]
async fn test_empty_photo_field_is_ignored() {
    let mut app = logged_in("Wes", "wes@example.com").await;

    let form = MultipartForm::new()
        .text("name", "No Pic")
        .file("photo", "", "application/octet-stream", b"");
    let response = app.post_multipart("/stores", form).await;
    assert_eq!(response.redirect_target(), "/store/no-pic");
    assert!(app.photos.stored().is_empty());
}

#[tokio::test]
async fn test_non_image_upload_is_rejected() {
    let mut app = logged_in("Wes", "wes@example.com").await;

    let form = MultipartForm::new()
        .text("name", "Docs")
        .file("photo", "notes.pdf", "application/pdf", b"%PDF");
    let response = app.post_multipart("/stores", form).await;
    assert_eq!(response.redirect_target(), "/add");
    assert!(app.follow(&response).await.body.contains("That filetype"));
    assert_eq!(app.get("/store/docs").await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_rejected_submissions_store_no_photo() {
    let mut app = logged_in("Wes", "wes@example.com").await;

    let blank = MultipartForm::new()
        .text("name", "   ")
        .file("photo", "snap.png", "image/png", b"png");
    let far = MultipartForm::new()
        .text("name", "Ok")
        .text("lng", "500")
        .text("lat", "0")
        .file("photo", "snap.png", "image/png", b"png");

    for form in [blank, far] {
        let response = app.post_multipart("/stores", form).await;
        assert_eq!(response.redirect_target(), "/add");
    }

    assert_eq!(app.photos.uploads(), 0);
    assert!(app.photos.stored().is_empty());
}

#[tokio::test]
async fn test_rejected_update_stores_no_photo() {
    let mut app = logged_in("Wes", "wes@example.com").await;
    app.submit_store("/stores", &[("name", "Wee Cafe")]).await;

    let form = MultipartForm::new()
        .text("name", "!!!")
        .file("photo", "snap.png", "image/png", b"png");
    let response = app.post_multipart("/stores/1", form).await;
    assert_eq!(response.redirect_target(), "/stores/1/edit");

    assert_eq!(app.photos.uploads(), 0);
    let store = app.get("/store/wee-cafe").await;
    assert!(!store.body.contains("/uploads/"));
}

#[tokio::test]
async fn test_tag_browsing() {
    let mut app = logged_in("Wes", "wes@example.com").await;
    app.submit_store("/stores", &[("name", "One"), ("tags", "Wifi")])
        .await;
    app.submit_store(
        "/stores",
        &[("name", "Two"), ("tags", "Wifi"), ("tags", "Open Late")],
    )
    .await;
    app.submit_store("/stores", &[("name", "Untagged")]).await;

    let all = app.get("/tags").await;
    assert_eq!(all.status, StatusCode::OK);
    assert!(all.body.contains("/store/one"));
    assert!(all.body.contains("/store/two"));
    assert!(!all.body.contains("/store/untagged"));
    let wifi = all.body.find("href=\"/tags/Wifi\"").unwrap();
    let late = all.body.find("href=\"/tags/Open%20Late\"").unwrap();
    assert!(wifi < late, "most used tag comes first");

    let filtered = app.get("/tags/Open%20Late").await;
    assert_eq!(filtered.status, StatusCode::OK);
    assert!(filtered.body.contains("/store/two"));
    assert!(!filtered.body.contains("/store/one"));
    assert!(filtered.body.contains("tag__link--active"));
    assert!(filtered.body.contains("/tags/Wifi"));

    let none = app.get("/tags/Nothing").await;
    assert_eq!(none.status, StatusCode::OK);
    assert!(!none.body.contains("/store/"));
}
