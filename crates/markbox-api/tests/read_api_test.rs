//! Owner-scoped read endpoints.

mod common;

use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use serde_json::json;

use common::*;
use markbox_core::{BookmarkRepository, SaveBookmarkRequest};

async fn seed_bookmarks(app: &TestApp, count: usize) {
    for i in 0..count {
        let url = format!("https://example.com/{}", i);
        let title = format!("Post {:02}", i);
        let resp = app
            .action(
                "/actions/add-bookmark",
                &[
                    ("url", url.as_str()),
                    ("title", title.as_str()),
                    ("tags", r#"["reading"]"#),
                ],
            )
            .await;
        assert_eq!(resp["success"], json!(true));
    }
}

#[tokio::test]
async fn test_read_api_requires_session() {
    let app = TestApp::new();
    for uri in [
        "/api/v1/bookmarks",
        "/api/v1/bookmarks/1",
        "/api/v1/categories",
        "/api/v1/categories/count",
        "/api/v1/tags",
        "/api/v1/files/1",
        "/api/v1/me",
    ] {
        let resp = app.get(uri, None).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{}", uri);
        assert!(body_json(resp).await["error"].is_string());
    }
}

#[tokio::test]
async fn test_bookmark_list_pagination() {
    let app = TestApp::new();
    seed_bookmarks(&app, 25).await;
    let cookie = app.session_cookie();

    let resp = app
        .get(
            "/api/v1/bookmarks?order_by=title&order_direction=asc&limit=10&page=2",
            Some(&cookie),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;

    let titles: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles.len(), 10);
    assert_eq!(titles[0], "Post 10");
    assert_eq!(titles[9], "Post 19");
    assert_eq!(
        body["pagination"],
        json!({"total": 25, "limit": 10, "offset": 10, "has_more": true})
    );
}

#[tokio::test]
async fn test_out_of_range_page_is_bad_request() {
    let app = TestApp::new();
    seed_bookmarks(&app, 1).await;
    let cookie = app.session_cookie();

    for uri in [
        "/api/v1/bookmarks?limit=10&page=9223372036854775807",
        "/api/v1/categories?limit=10&page=9223372036854775807",
    ] {
        let resp = app.get(uri, Some(&cookie)).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{}", uri);
        assert!(body_json(resp).await["error"]
            .as_str()
            .unwrap()
            .contains("out of range"));
    }

    // Largest page that still fits: empty data, no panic.
    let resp = app
        .get("/api/v1/bookmarks?limit=1&page=9223372036854775807", Some(&cookie))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["data"], json!([]));
    assert_eq!(body["pagination"]["has_more"], json!(false));
}

#[tokio::test]
async fn test_bookmarks_are_owner_scoped() {
    let app = TestApp::new();
    app.store.insert_user(2, "bob").unwrap();
    let bobs = app
        .store
        .create(
            2,
            SaveBookmarkRequest {
                draft: markbox_core::BookmarkDraft {
                    url: "https://bob.example.com".to_string(),
                    ..Default::default()
                },
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let cookie = app.session_cookie();
    let resp = app
        .get(&format!("/api/v1/bookmarks/{}", bobs.id), Some(&cookie))
        .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let body = body_json(app.get("/api/v1/bookmarks", Some(&cookie)).await).await;
    assert_eq!(body["data"], json!([]));
    assert_eq!(body["pagination"]["total"], json!(0));
    assert_eq!(BookmarkRepository::count(&app.store, 2, None).await.unwrap(), 1);
}

#[tokio::test]
async fn test_categories_endpoints() {
    let app = TestApp::new();
    let cookie = app.session_cookie();
    let parent = app
        .action("/actions/add-category", &[("name", "Parent")])
        .await["id"]
        .as_i64()
        .unwrap();
    let parent_ref = parent.to_string();
    let child = app
        .action(
            "/actions/add-category",
            &[("name", "Child"), ("parent", parent_ref.as_str())],
        )
        .await["id"]
        .as_i64()
        .unwrap();

    let body = body_json(
        app.get(&format!("/api/v1/categories/{}", child), Some(&cookie))
            .await,
    )
    .await;
    assert_eq!(body["parent"]["id"], json!(parent));
    assert_eq!(body["owner"]["username"], json!("alice"));

    let body = body_json(
        app.get(
            &format!("/api/v1/categories/{}?expand=", child),
            Some(&cookie),
        )
        .await,
    )
    .await;
    assert!(body.get("parent").is_none());
    assert!(body.get("owner").is_none());

    let body = body_json(
        app.get(
            "/api/v1/categories?order_by=name&order_direction=desc",
            Some(&cookie),
        )
        .await,
    )
    .await;
    let names: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Parent", "Child"]);

    let body = body_json(app.get("/api/v1/categories/count", Some(&cookie)).await).await;
    assert_eq!(body, json!({"count": 2}));

    let resp = app.get("/api/v1/categories/9999", Some(&cookie)).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_tags_and_files() {
    let app = TestApp::new();
    let cookie = app.session_cookie();
    let resp = app
        .action(
            "/actions/add-bookmark",
            &[
                ("url", "https://example.com"),
                ("title", "Pic"),
                ("tags", r#"["zeta", "alpha"]"#),
                ("main_image_url", "https://example.com/pic.png"),
            ],
        )
        .await;
    let image_id = resp["bookmark"]["main_image_id"].as_i64().unwrap();

    let tags = body_json(app.get("/api/v1/tags", Some(&cookie)).await).await;
    let names: Vec<&str> = tags
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["alpha", "zeta"]);
    assert_eq!(tags[0]["bookmark_count"], json!(1));

    let resp = app
        .get(&format!("/api/v1/files/{}", image_id), Some(&cookie))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers().get(CONTENT_TYPE).unwrap(), "image/png");
    assert_eq!(body_bytes(resp).await, PNG_BYTES);
}

#[tokio::test]
async fn test_me_returns_settings() {
    let app = TestApp::new();
    app.action("/actions/change-theme", &[("theme", "solarized")])
        .await;
    let me = body_json(app.get("/api/v1/me", Some(&app.session_cookie())).await).await;
    assert_eq!(me["username"], json!("alice"));
    assert_eq!(me["settings"], json!({"theme": "solarized"}));
}
