use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use markbox_core::defaults::PAGE_LIMIT;
use markbox_core::{Bookmark, BookmarkOrder, ListBookmarksRequest, SortDirection};

use super::{clamp_limit, ListResponse, RequireUser};
use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ListBookmarksQuery {
    pub category_id: Option<i64>,
    pub order_by: Option<BookmarkOrder>,
    pub order_direction: Option<String>,
    pub limit: Option<i64>,
    pub page: Option<i64>,
}

/// GET /api/v1/bookmarks
pub async fn list_bookmarks(
    State(state): State<AppState>,
    RequireUser(owner_id): RequireUser,
    Query(query): Query<ListBookmarksQuery>,
) -> Result<ListResponse<Bookmark>, ApiError> {
    let req = ListBookmarksRequest {
        category_id: query.category_id,
        order_by: query.order_by,
        order_direction: query.order_direction.as_deref().map(SortDirection::from_param),
        limit: clamp_limit(query.limit).or(Some(PAGE_LIMIT)),
        page: query.page,
    };
    let offset = req.offset()?;

    let data = state.bookmarks.list(owner_id, &req).await?;
    let total = state.bookmarks.count(owner_id, req.category_id).await?;
    Ok(ListResponse::new(data, total, req.limit, offset))
}

/// GET /api/v1/bookmarks/:id
pub async fn get_bookmark(
    State(state): State<AppState>,
    RequireUser(owner_id): RequireUser,
    Path(id): Path<i64>,
) -> Result<Json<Bookmark>, ApiError> {
    state
        .bookmarks
        .get(id, owner_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Bookmark {} not found", id)))
}
