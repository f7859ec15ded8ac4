//! Request-scoped auth store backed by the auth cookie.
//!
//! The cookie value is URL-encoded JSON `{"token": "...", "model": {...}}`.
//! A store is built fresh for every request and never shared across requests.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use markbox_core::defaults::MAX_COOKIE_BYTES;

/// Model keys kept when the full cookie would exceed the browser limit.
const ESSENTIAL_MODEL_KEYS: &[&str] = &["id", "email", "username", "verified", "collectionId"];

#[derive(Debug, Serialize, Deserialize)]
struct CookiePayload {
    #[serde(default)]
    token: String,
    #[serde(default)]
    model: Option<JsonValue>,
}

/// Token and account record for the current request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthStore {
    token: String,
    model: Option<JsonValue>,
}

impl AuthStore {
    pub fn new(token: impl Into<String>, model: Option<JsonValue>) -> Self {
        Self {
            token: token.into(),
            model,
        }
    }

    /// Load from a raw `cookie` header. Missing or malformed cookies yield
    /// an empty store.
    pub fn from_cookie_header(header: &str, cookie_name: &str) -> Self {
        let Some(raw) = header.split(';').find_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            (name.trim() == cookie_name).then_some(value.trim())
        }) else {
            return Self::default();
        };

        let Ok(decoded) = urlencoding::decode(raw) else {
            return Self::default();
        };
        match serde_json::from_str::<CookiePayload>(&decoded) {
            Ok(payload) => Self {
                token: payload.token,
                model: payload.model.filter(|m| !m.is_null()),
            },
            Err(_) => Self::default(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn model(&self) -> Option<&JsonValue> {
        self.model.as_ref()
    }

    /// Non-empty token whose `exp` claim lies in the future.
    pub fn is_valid(&self) -> bool {
        self.expires_at().is_some_and(|exp| exp > Utc::now())
    }

    /// `exp` claim of the stored token.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        token_expiry(&self.token)
    }

    pub fn save(&mut self, token: impl Into<String>, model: Option<JsonValue>) {
        self.token = token.into();
        self.model = model;
    }

    pub fn clear(&mut self) {
        self.token.clear();
        self.model = None;
    }

    /// Serialize into a `set-cookie` header value.
    ///
    /// Never `HttpOnly`: the browser client reads the same cookie. Expires at
    /// the token's `exp`, or the Unix epoch for an empty store.
    pub fn export_to_cookie(&self, cookie_name: &str, secure: bool) -> String {
        let expires = self
            .expires_at()
            .filter(|_| !self.token.is_empty())
            .unwrap_or_default();

        let mut cookie = self.build_cookie(cookie_name, self.model.clone(), expires, secure);
        if cookie.len() > MAX_COOKIE_BYTES {
            let reduced = self.model.as_ref().map(essential_model);
            cookie = self.build_cookie(cookie_name, reduced, expires, secure);
        }
        cookie
    }

    fn build_cookie(
        &self,
        cookie_name: &str,
        model: Option<JsonValue>,
        expires: DateTime<Utc>,
        secure: bool,
    ) -> String {
        let payload = CookiePayload {
            token: self.token.clone(),
            model,
        };
        let json = serde_json::to_string(&payload).unwrap_or_else(|_| "{}".to_string());
        let mut cookie = format!(
            "{}={}; Path=/; Expires={}; SameSite=Strict",
            cookie_name,
            urlencoding::encode(&json),
            expires.format("%a, %d %b %Y %H:%M:%S GMT")
        );
        if secure {
            cookie.push_str("; Secure");
        }
        cookie
    }
}

fn essential_model(model: &JsonValue) -> JsonValue {
    let Some(obj) = model.as_object() else {
        return model.clone();
    };
    let reduced: Map<String, JsonValue> = obj
        .iter()
        .filter(|(k, _)| ESSENTIAL_MODEL_KEYS.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    JsonValue::Object(reduced)
}

/// Decode the `exp` claim of a JWT without verifying its signature.
///
/// The auth service verifies tokens on refresh; this only decides whether a
/// refresh is worth attempting.
pub fn token_expiry(token: &str) -> Option<DateTime<Utc>> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: JsonValue = serde_json::from_slice(&bytes).ok()?;
    let exp = claims.get("exp")?.as_f64()?;
    DateTime::from_timestamp(exp as i64, 0)
}
