//! Shared helpers for router-level tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::header::{CONTENT_TYPE, COOKIE, SET_COOKIE};
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::{json, Value as JsonValue};
use tower::ServiceExt;

use markbox_api::services::{AccountKind, AuthRefresh, AuthService, ImageFetcher};
use markbox_api::{build_router, AppConfig, AppState};
use markbox_core::{Error, Result};
use markbox_db::MemoryStore;

pub const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

pub fn jwt(exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let claims = URL_SAFE_NO_PAD.encode(json!({ "exp": exp }).to_string());
    format!("{}.{}.signature", header, claims)
}

pub fn valid_token() -> String {
    jwt(chrono::Utc::now().timestamp() + 3600)
}

pub fn expired_token() -> String {
    jwt(chrono::Utc::now().timestamp() - 3600)
}

pub fn auth_cookie(token: &str, model: JsonValue) -> String {
    let payload = json!({ "token": token, "model": model }).to_string();
    format!("pb_auth={}", urlencoding::encode(&payload))
}

pub fn user_model(id: i64, username: &str) -> JsonValue {
    json!({
        "id": id,
        "username": username,
        "email": format!("{}@example.com", username),
        "verified": true,
        "collectionId": "users",
    })
}

/// Auth service that accepts every token and returns a fixed account.
pub struct StaticAuth {
    pub model: JsonValue,
    pub calls: AtomicUsize,
}

impl StaticAuth {
    pub fn new(model: JsonValue) -> Self {
        Self {
            model,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl AuthService for StaticAuth {
    async fn refresh(&self, _kind: AccountKind, token: &str) -> Result<AuthRefresh> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(AuthRefresh {
            token: token.to_string(),
            model: self.model.clone(),
        })
    }
}

/// Image fetcher serving a tiny PNG; URLs containing `broken` fail.
#[derive(Default)]
pub struct FakeImages {
    pub fetched: std::sync::Mutex<Vec<String>>,
}

#[async_trait]
impl ImageFetcher for FakeImages {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.fetched
            .lock()
            .map_err(|_| Error::Internal("poisoned".to_string()))?
            .push(url.to_string());
        if url.contains("broken") {
            return Err(Error::Request(format!("Image fetch returned 404: {}", url)));
        }
        Ok(PNG_BYTES.to_vec())
    }
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.auth.cookie_secure = false;
    config
}

pub struct TestApp {
    pub router: Router,
    pub store: MemoryStore,
    pub auth: Arc<StaticAuth>,
    pub images: Arc<FakeImages>,
}

impl TestApp {
    /// App whose auth service signs everyone in as user `1` (`alice`).
    pub fn new() -> Self {
        Self::with_model(user_model(1, "alice"))
    }

    pub fn with_model(model: JsonValue) -> Self {
        let store = MemoryStore::new();
        let auth = Arc::new(StaticAuth::new(model));
        let images = Arc::new(FakeImages::default());
        let state =
            AppState::with_store(store.clone(), auth.clone(), images.clone(), test_config());
        Self {
            router: build_router(state),
            store,
            auth,
            images,
        }
    }

    pub fn session_cookie(&self) -> String {
        auth_cookie(&valid_token(), self.auth.model.clone())
    }

    pub async fn send(&self, req: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(req).await.unwrap()
    }

    /// POST a urlencoded form with a valid session.
    pub async fn action(&self, path: &str, fields: &[(&str, &str)]) -> JsonValue {
        let resp = self.post_form(path, fields, Some(&self.session_cookie())).await;
        assert_eq!(resp.status(), StatusCode::OK, "action {} failed", path);
        body_json(resp).await
    }

    pub async fn post_form(
        &self,
        path: &str,
        fields: &[(&str, &str)],
        cookie: Option<&str>,
    ) -> Response<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(path)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        self.send(builder.body(Body::from(encode_form(fields))).unwrap())
            .await
    }

    pub async fn get(&self, path: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder().method("GET").uri(path);
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }
}

pub fn encode_form(fields: &[(&str, &str)]) -> String {
    fields
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

pub async fn body_bytes(resp: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn body_json(resp: Response<Body>) -> JsonValue {
    serde_json::from_slice(&body_bytes(resp).await).unwrap()
}

pub fn set_cookie(resp: &Response<Body>) -> Option<String> {
    resp.headers()
        .get(SET_COOKIE)
        .map(|v| v.to_str().unwrap().to_string())
}
