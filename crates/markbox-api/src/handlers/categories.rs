use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use markbox_core::{
    Category, CategoryOrder, CategoryRelation, ListCategoriesRequest, SortDirection,
};

use super::{clamp_limit, ListResponse, RequireUser};
use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ListCategoriesQuery {
    pub order_by: Option<CategoryOrder>,
    pub order_direction: Option<String>,
    pub limit: Option<i64>,
    pub page: Option<i64>,
    /// Comma-separated relations to expand; all when absent.
    pub expand: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GetCategoryQuery {
    pub expand: Option<String>,
}

fn parse_relations(expand: Option<&str>) -> Result<Vec<CategoryRelation>, ApiError> {
    let Some(expand) = expand else {
        return Ok(CategoryRelation::ALL.to_vec());
    };
    expand
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|name| match name {
            "owner" => Ok(CategoryRelation::Owner),
            "parent" => Ok(CategoryRelation::Parent),
            other => Err(ApiError::BadRequest(format!("Unknown relation: {}", other))),
        })
        .collect()
}

/// GET /api/v1/categories
pub async fn list_categories(
    State(state): State<AppState>,
    RequireUser(owner_id): RequireUser,
    Query(query): Query<ListCategoriesQuery>,
) -> Result<ListResponse<Category>, ApiError> {
    let relations = parse_relations(query.expand.as_deref())?;
    let req = ListCategoriesRequest {
        order_by: query.order_by,
        order_direction: query.order_direction.as_deref().map(SortDirection::from_param),
        limit: clamp_limit(query.limit),
        page: query.page,
    };
    let offset = req.offset()?;

    let data = state.categories.list(owner_id, &req, &relations).await?;
    let total = state.categories.count(owner_id).await?;
    Ok(ListResponse::new(data, total, req.limit, offset))
}

/// GET /api/v1/categories/count
pub async fn count_categories(
    State(state): State<AppState>,
    RequireUser(owner_id): RequireUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let count = state.categories.count(owner_id).await?;
    Ok(Json(serde_json::json!({ "count": count })))
}

/// GET /api/v1/categories/:id
pub async fn get_category(
    State(state): State<AppState>,
    RequireUser(owner_id): RequireUser,
    Path(id): Path<i64>,
    Query(query): Query<GetCategoryQuery>,
) -> Result<Json<Category>, ApiError> {
    let relations = parse_relations(query.expand.as_deref())?;
    state
        .categories
        .get(id, owner_id, &relations)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Category {} not found", id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_relations() {
        assert_eq!(parse_relations(None).unwrap(), CategoryRelation::ALL.to_vec());
        assert!(parse_relations(Some("")).unwrap().is_empty());
        assert_eq!(
            parse_relations(Some("parent")).unwrap(),
            vec![CategoryRelation::Parent]
        );
        assert!(parse_relations(Some("owner,children")).is_err());
    }
}
