use axum::extract::State;
use axum::Json;

use markbox_core::Tag;

use super::RequireUser;
use crate::error::ApiError;
use crate::AppState;

/// GET /api/v1/tags
///
/// Every tag of the user with its bookmark count, ordered by name.
pub async fn list_tags(
    State(state): State<AppState>,
    RequireUser(owner_id): RequireUser,
) -> Result<Json<Vec<Tag>>, ApiError> {
    Ok(Json(state.tags.list(owner_id).await?))
}
