//! Session refresh middleware.
//!
//! Every request gets its own [`AuthStore`] parsed from the auth cookie. A
//! valid token is refreshed against the auth service before the handler runs;
//! anything else leaves the request unauthenticated. The store is written back
//! to `set-cookie` on the way out.

use std::sync::Arc;

use axum::extract::{FromRequestParts, Request, State};
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::request::Parts;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use serde_json::Value as JsonValue;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::ApiError;
use crate::services::{AccountKind, AuthStore};
use crate::AppState;

/// Session context injected into request extensions.
#[derive(Clone, Debug)]
pub struct Session {
    store: Arc<Mutex<AuthStore>>,
    /// Snapshot of the account record taken after refresh; `None` when the
    /// request is unauthenticated.
    pub user: Option<JsonValue>,
    pub kind: AccountKind,
}

impl Session {
    pub fn new(store: AuthStore, kind: AccountKind) -> Self {
        let user = store.model().cloned();
        Self {
            store: Arc::new(Mutex::new(store)),
            user,
            kind,
        }
    }

    /// Id of the authenticated user account.
    pub fn owner_id(&self) -> Option<i64> {
        if self.kind != AccountKind::User {
            return None;
        }
        self.user.as_ref().and_then(account_id)
    }

    /// Drop the session; the response cookie expires it in the browser.
    pub async fn clear(&self) {
        self.store.lock().await.clear();
    }

    pub async fn export_to_cookie(&self, cookie_name: &str, secure: bool) -> String {
        self.store
            .lock()
            .await
            .export_to_cookie(cookie_name, secure)
    }
}

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Session {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Session>().cloned().ok_or_else(|| {
            ApiError::Internal(markbox_core::Error::Internal(
                "session middleware not installed".to_string(),
            ))
        })
    }
}

/// Numeric id of an account record. The auth service may send it as a
/// number or a numeric string.
pub fn account_id(model: &JsonValue) -> Option<i64> {
    match model.get("id")? {
        JsonValue::Number(n) => n.as_i64(),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn model_str<'a>(model: Option<&'a JsonValue>, key: &str) -> Option<&'a str> {
    model.and_then(|m| m.get(key)).and_then(JsonValue::as_str)
}

/// Refresh the session carried by the request cookie and expose it as a
/// [`Session`] extension.
pub async fn auth_refresh_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let auth = &state.config.auth;
    let cookie_header = req
        .headers()
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect::<Vec<_>>()
        .join("; ");
    let mut store = AuthStore::from_cookie_header(&cookie_header, &auth.cookie_name);
    let kind = AccountKind::for_path(req.uri().path(), &auth.admin_path_prefix);

    if store.is_valid() {
        match state.auth.refresh(kind, store.token()).await {
            Ok(refresh) => {
                store.save(refresh.token, Some(refresh.model));
                let model = store.model();
                match kind {
                    AccountKind::Admin => info!(
                        subsystem = "auth",
                        component = "auth_refresh",
                        email = model_str(model, "email").unwrap_or_default(),
                        "Admin logged"
                    ),
                    AccountKind::User => {
                        info!(
                            subsystem = "auth",
                            component = "auth_refresh",
                            username = model_str(model, "username").unwrap_or_default(),
                            "User logged"
                        );
                        mirror_user(&state, model).await;
                    }
                }
            }
            Err(e) => {
                debug!(
                    subsystem = "auth",
                    component = "auth_refresh",
                    account_kind = kind.as_str(),
                    error = %e,
                    "Session refresh failed, clearing auth store"
                );
                store.clear();
            }
        }
    } else {
        store.clear();
    }

    let session = Session::new(store, kind);
    req.extensions_mut().insert(session.clone());

    let mut response = next.run(req).await;

    let cookie = session
        .export_to_cookie(&auth.cookie_name, auth.cookie_secure)
        .await;
    match HeaderValue::from_str(&cookie) {
        Ok(value) => {
            response.headers_mut().insert(SET_COOKIE, value);
        }
        Err(e) => warn!(
            subsystem = "auth",
            component = "auth_refresh",
            error = %e,
            "Auth cookie is not a valid header value"
        ),
    }
    response
}

/// Keep a local user row for the refreshed account so owned rows can
/// reference it.
async fn mirror_user(state: &AppState, model: Option<&JsonValue>) {
    let Some(id) = model.and_then(account_id) else {
        return;
    };
    let email = model_str(model, "email");
    let username = model_str(model, "username")
        .or(email)
        .map(str::to_string)
        .unwrap_or_else(|| format!("user-{}", id));

    if let Err(e) = state.users.ensure(id, &username, email).await {
        warn!(
            subsystem = "auth",
            component = "auth_refresh",
            owner_id = id,
            error = %e,
            "Failed to mirror user account"
        );
    }
}
