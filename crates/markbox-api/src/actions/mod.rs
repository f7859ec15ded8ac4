//! Form actions.
//!
//! Each action answers with an [`ActionResult`]:
//!
//! ```json
//! { "success": true, "bookmark": { ... } }
//! { "success": false, "error": "Bookmark not found" }
//! ```

pub mod bookmarks;
pub mod categories;
pub mod settings;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

use crate::middleware::Session;

/// Result record returned by every action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub data: Map<String, JsonValue>,
}

impl ActionResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
            data: Map::new(),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            data: Map::new(),
        }
    }

    /// `{success: false}` with no message.
    pub fn bare_failure() -> Self {
        Self {
            success: false,
            error: None,
            data: Map::new(),
        }
    }

    /// Attach an entity field to the record.
    pub fn with(mut self, key: &str, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(JsonValue::Null);
        self.data.insert(key.to_string(), value);
        self
    }
}

impl IntoResponse for ActionResult {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// Owner id of the authenticated user.
///
/// Rejects with `{success: false, error: "Unauthorized"}` before the form
/// body is read, so unauthenticated requests never reach storage.
#[derive(Debug, Clone, Copy)]
pub struct RequireOwner(pub i64);

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for RequireOwner {
    type Rejection = ActionResult;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .and_then(Session::owner_id)
            .map(RequireOwner)
            .ok_or_else(|| {
                tracing::debug!(path = %parts.uri.path(), "Rejected unauthenticated action");
                ActionResult::failure("Unauthorized")
            })
    }
}
