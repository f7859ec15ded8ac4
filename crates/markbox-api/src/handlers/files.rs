use axum::extract::{Path, State};
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};

use super::RequireUser;
use crate::error::ApiError;
use crate::AppState;

/// GET /api/v1/files/:id
///
/// Raw blob bytes served with the stored content type.
pub async fn get_file(
    State(state): State<AppState>,
    RequireUser(owner_id): RequireUser,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    let (file, data) = state
        .files
        .read(id, owner_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("File {} not found", id)))?;

    let content_type = HeaderValue::from_str(&file.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    let len = data.len();
    let mut response = data.into_response();
    response.headers_mut().insert(CONTENT_TYPE, content_type);
    response
        .headers_mut()
        .insert(CONTENT_LENGTH, HeaderValue::from(len));
    Ok(response)
}
