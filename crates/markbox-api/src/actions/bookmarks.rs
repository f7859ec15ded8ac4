//! Bookmark actions.

use std::time::Instant;

use axum::extract::State;
use tracing::{info, warn};

use markbox_core::{
    Bookmark, BookmarkDraft, BookmarkStatusPatch, NewFile, Result, SaveBookmarkRequest,
};

use super::{ActionResult, RequireOwner};
use crate::error::ApiError;
use crate::form::FormData;
use crate::services::image_file_name;
use crate::AppState;

const NOT_FOUND: &str = "Bookmark not found";

/// Parse the bookmark form and download its images.
async fn bookmark_request(state: &AppState, form: &FormData) -> Result<SaveBookmarkRequest> {
    let draft = BookmarkDraft {
        url: form.required("url")?,
        domain: form.text("domain"),
        title: form.text("title").unwrap_or_default(),
        description: form.text("description"),
        author: form.text("author"),
        content_text: form.text("content_text"),
        content_html: form.text("content_html"),
        content_type: form.text("content_type"),
        content_published_date: form.datetime("content_published_date")?,
        note: form.text("note"),
        main_image_url: form.text("main_image_url"),
        icon_url: form.text("icon_url"),
        importance: form.int("importance", 0)?,
        flagged: form.checkbox_time("flagged"),
        category_id: form.id_reference("category")?,
    };
    let tags = form.tags("tags")?;

    let (main_image, icon) = futures::future::try_join(
        fetch_image(state, &draft.title, draft.main_image_url.as_deref()),
        fetch_image(state, &draft.title, draft.icon_url.as_deref()),
    )
    .await?;

    Ok(SaveBookmarkRequest {
        draft,
        tags,
        main_image,
        icon,
    })
}

async fn fetch_image(state: &AppState, title: &str, url: Option<&str>) -> Result<Option<NewFile>> {
    let Some(url) = url else {
        return Ok(None);
    };
    let data = state.images.fetch(url).await?;
    Ok(Some(NewFile {
        file_name: image_file_name(title, url),
        data,
    }))
}

async fn create_bookmark(state: &AppState, owner_id: i64, form: &FormData) -> Result<Bookmark> {
    let req = bookmark_request(state, form).await?;
    state.bookmarks.create(owner_id, req).await
}

/// POST /actions/add-bookmark
///
/// Failures of any kind are reported in the result record.
pub async fn add_bookmark(
    State(state): State<AppState>,
    RequireOwner(owner_id): RequireOwner,
    form: std::result::Result<FormData, ApiError>,
) -> ActionResult {
    let start = Instant::now();
    let form = match form {
        Ok(form) => form,
        Err(e) => return ActionResult::failure(e.to_string()),
    };

    match create_bookmark(&state, owner_id, &form).await {
        Ok(bookmark) => {
            info!(
                subsystem = "api",
                component = "actions",
                op = "add_bookmark",
                owner_id,
                bookmark_id = bookmark.id,
                duration_ms = start.elapsed().as_millis() as u64,
                "Bookmark added"
            );
            ActionResult::ok().with("bookmark", &bookmark)
        }
        Err(e) => {
            warn!(
                subsystem = "api",
                component = "actions",
                op = "add_bookmark",
                owner_id,
                error = %e,
                "Failed to add bookmark"
            );
            ActionResult::failure(e.to_string())
        }
    }
}

/// POST /actions/update-bookmark
pub async fn update_bookmark(
    State(state): State<AppState>,
    RequireOwner(owner_id): RequireOwner,
    form: FormData,
) -> std::result::Result<ActionResult, ApiError> {
    let id = form.id("id")?;
    let req = bookmark_request(&state, &form).await?;
    let bookmark = state.bookmarks.update(id, owner_id, req).await?;
    Ok(ActionResult::ok().with("bookmark", &bookmark))
}

/// POST /actions/delete-bookmark
pub async fn delete_bookmark(
    State(state): State<AppState>,
    RequireOwner(owner_id): RequireOwner,
    form: FormData,
) -> std::result::Result<ActionResult, ApiError> {
    let id = form.id("id")?;
    if !state.bookmarks.delete(id, owner_id).await? {
        return Ok(ActionResult::failure(NOT_FOUND));
    }
    Ok(ActionResult::ok().with("id", id))
}

async fn apply_status(
    state: &AppState,
    owner_id: i64,
    id: i64,
    patch: BookmarkStatusPatch,
) -> std::result::Result<ActionResult, ApiError> {
    if !state.bookmarks.update_status(id, owner_id, patch).await? {
        return Ok(ActionResult::failure(NOT_FOUND));
    }
    Ok(ActionResult::ok().with("id", id))
}

/// POST /actions/update-flagged
pub async fn update_flagged(
    State(state): State<AppState>,
    RequireOwner(owner_id): RequireOwner,
    form: FormData,
) -> std::result::Result<ActionResult, ApiError> {
    let id = form.id("id")?;
    let patch = BookmarkStatusPatch {
        flagged: Some(form.checkbox_time("flagged")),
        ..Default::default()
    };
    apply_status(&state, owner_id, id, patch).await
}

/// POST /actions/update-importance
pub async fn update_importance(
    State(state): State<AppState>,
    RequireOwner(owner_id): RequireOwner,
    form: FormData,
) -> std::result::Result<ActionResult, ApiError> {
    let id = form.id("id")?;
    let patch = BookmarkStatusPatch {
        importance: Some(form.int("importance", 0)?),
        ..Default::default()
    };
    apply_status(&state, owner_id, id, patch).await
}

/// POST /actions/update-read
pub async fn update_read(
    State(state): State<AppState>,
    RequireOwner(owner_id): RequireOwner,
    form: FormData,
) -> std::result::Result<ActionResult, ApiError> {
    let id = form.id("id")?;
    let patch = BookmarkStatusPatch {
        read: Some(form.checkbox_time("read")),
        ..Default::default()
    };
    apply_status(&state, owner_id, id, patch).await
}

/// POST /actions/increase-opened-count
pub async fn increase_opened_count(
    State(state): State<AppState>,
    RequireOwner(owner_id): RequireOwner,
    form: FormData,
) -> std::result::Result<ActionResult, ApiError> {
    let id = form.id("id")?;
    match state.bookmarks.increment_opened(id, owner_id).await? {
        Some(opened_times) => Ok(ActionResult::ok()
            .with("id", id)
            .with("opened_times", opened_times)),
        None => Ok(ActionResult::failure(NOT_FOUND)),
    }
}
