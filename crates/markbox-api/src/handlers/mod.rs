//! Read API handlers.
//!
//! Every endpoint except `/health` requires an authenticated user and only
//! returns rows owned by that user.

pub mod bookmarks;
pub mod categories;
pub mod files;
pub mod tags;
pub mod users;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use markbox_core::defaults::PAGE_LIMIT_MAX;

use crate::error::ApiError;
use crate::middleware::Session;

/// Owner id of the authenticated user; 401 otherwise.
#[derive(Debug, Clone, Copy)]
pub struct RequireUser(pub i64);

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for RequireUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .and_then(Session::owner_id)
            .map(RequireUser)
            .ok_or_else(|| ApiError::Unauthorized("Authentication required".to_string()))
    }
}

/// Pagination metadata for list responses.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PaginationMeta {
    /// Total number of items across all pages
    pub total: i64,
    /// Maximum number of items per page
    pub limit: i64,
    /// Number of items skipped
    pub offset: i64,
    /// True if more items are available after this page
    pub has_more: bool,
}

/// List response wrapper.
///
/// ```json
/// {
///   "data": [...],
///   "pagination": { "total": 100, "limit": 50, "offset": 0, "has_more": true }
/// }
/// ```
#[derive(Serialize, Deserialize, Debug)]
pub struct ListResponse<T> {
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

impl<T: Serialize> ListResponse<T> {
    pub fn new(data: Vec<T>, total: i64, limit: Option<i64>, offset: Option<i64>) -> Self {
        let offset = offset.unwrap_or(0);
        let has_more = offset.saturating_add(data.len() as i64) < total;
        Self {
            pagination: PaginationMeta {
                total,
                limit: limit.unwrap_or(data.len() as i64),
                offset,
                has_more,
            },
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for ListResponse<T> {
    fn into_response(self) -> axum::response::Response {
        Json(self).into_response()
    }
}

/// Clamp a caller-supplied page size.
pub(crate) fn clamp_limit(limit: Option<i64>) -> Option<i64> {
    limit.map(|l| l.clamp(1, PAGE_LIMIT_MAX))
}

/// GET /health
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
