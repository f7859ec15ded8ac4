use axum::extract::State;
use axum::Json;

use markbox_core::User;

use super::RequireUser;
use crate::error::ApiError;
use crate::AppState;

/// GET /api/v1/me
pub async fn get_me(
    State(state): State<AppState>,
    RequireUser(owner_id): RequireUser,
) -> Result<Json<User>, ApiError> {
    state
        .users
        .get(owner_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("User {} not found", owner_id)))
}
