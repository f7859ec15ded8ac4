//! Session refresh middleware against a mocked auth service.

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::header::COOKIE;
use axum::http::{Request, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value as JsonValue};
use tower::ServiceExt;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::*;
use markbox_api::middleware::{auth_refresh_middleware, Session};
use markbox_api::services::{AuthStore, HttpAuthService};
use markbox_api::{build_router, AppState};
use markbox_db::MemoryStore;

const EPOCH: &str = "Expires=Thu, 01 Jan 1970 00:00:00 GMT";

fn state_for(server: &MockServer) -> AppState {
    let auth = HttpAuthService::new(server.uri(), Duration::from_secs(5)).unwrap();
    AppState::with_store(
        MemoryStore::new(),
        Arc::new(auth),
        Arc::new(FakeImages::default()),
        test_config(),
    )
}

async fn get_with_cookie(router: Router, uri: &str, cookie: &str) -> axum::http::Response<Body> {
    let req = Request::builder()
        .uri(uri)
        .header(COOKIE, cookie)
        .body(Body::empty())
        .unwrap();
    router.oneshot(req).await.unwrap()
}

fn cookie_store(set_cookie: &str) -> AuthStore {
    let pair = set_cookie.split(';').next().unwrap();
    AuthStore::from_cookie_header(pair, "pb_auth")
}

#[tokio::test]
async fn test_valid_session_is_refreshed() {
    let server = MockServer::start().await;
    let token = valid_token();
    let fresh = jwt(chrono::Utc::now().timestamp() + 7200);

    Mock::given(method("POST"))
        .and(path("/api/collections/users/auth-refresh"))
        .and(header("authorization", token.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": fresh,
            "record": user_model(7, "carol"),
        })))
        .expect(1)
        .mount(&server)
        .await;

    let router = build_router(state_for(&server));
    let resp = get_with_cookie(
        router,
        "/api/v1/me",
        &auth_cookie(&token, user_model(7, "carol")),
    )
    .await;

    assert_eq!(resp.status(), StatusCode::OK);
    let cookie = set_cookie(&resp).unwrap();
    assert!(cookie.contains("SameSite=Strict"));
    assert!(!cookie.contains("HttpOnly"));
    let store = cookie_store(&cookie);
    assert_eq!(store.token(), fresh);
    assert!(store.is_valid());

    // The refreshed account is mirrored locally.
    let me = body_json(resp).await;
    assert_eq!(me["id"], json!(7));
    assert_eq!(me["username"], json!("carol"));
    assert_eq!(me["email"], json!("carol@example.com"));
}

#[tokio::test]
async fn test_rejected_refresh_clears_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/collections/users/auth-refresh"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "invalid"})))
        .expect(1)
        .mount(&server)
        .await;

    let router = build_router(state_for(&server));
    let resp = get_with_cookie(
        router,
        "/api/v1/me",
        &auth_cookie(&valid_token(), user_model(7, "carol")),
    )
    .await;

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let cookie = set_cookie(&resp).unwrap();
    assert!(cookie.contains(EPOCH));
    assert_eq!(cookie_store(&cookie), AuthStore::default());
}

#[tokio::test]
async fn test_expired_token_is_not_refreshed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let router = build_router(state_for(&server));
    let resp = get_with_cookie(
        router,
        "/api/v1/bookmarks",
        &auth_cookie(&expired_token(), user_model(7, "carol")),
    )
    .await;

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(set_cookie(&resp).unwrap().contains(EPOCH));
}

#[tokio::test]
async fn test_malformed_cookie_means_no_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let router = build_router(state_for(&server));
    let resp = get_with_cookie(router, "/api/v1/tags", "pb_auth=%7Bbroken").await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(set_cookie(&resp).unwrap().contains(EPOCH));
}

async fn whoami(session: Session) -> Json<JsonValue> {
    Json(json!({
        "user": session.user,
        "owner_id": session.owner_id(),
    }))
}

#[tokio::test]
async fn test_admin_paths_refresh_admin_accounts() {
    let server = MockServer::start().await;
    let token = valid_token();

    Mock::given(method("POST"))
        .and(path("/api/admins/auth-refresh"))
        .and(header("authorization", token.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": token,
            "admin": {"id": "adm1", "email": "root@example.com"},
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/collections/users/auth-refresh"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let state = state_for(&server);
    let router = Router::new()
        .route("/admin/whoami", get(whoami))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_refresh_middleware,
        ))
        .with_state(state);

    let resp = get_with_cookie(
        router,
        "/admin/whoami",
        &auth_cookie(&token, json!({"id": "adm1"})),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        body_json(resp).await,
        json!({
            "user": {"id": "adm1", "email": "root@example.com"},
            "owner_id": null,
        })
    );
}

#[tokio::test]
async fn test_health_skips_session_handling() {
    let app = TestApp::new();
    let resp = app.get("/health", Some(&app.session_cookie())).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(set_cookie(&resp).is_none());
    assert_eq!(
        app.auth.calls.load(std::sync::atomic::Ordering::SeqCst),
        0
    );
    assert_eq!(body_json(resp).await["status"], json!("healthy"));
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    let app = TestApp::new();
    let resp = app.get("/health", None).await;
    let id = resp.headers().get("x-request-id").unwrap().to_str().unwrap();
    assert!(uuid::Uuid::parse_str(id).is_ok());
}
