//! Category actions.

use axum::extract::State;
use tracing::info;

use markbox_core::{create_slug, CreateCategoryRequest, UpdateCategoryRequest};

use super::{ActionResult, RequireOwner};
use crate::error::ApiError;
use crate::form::FormData;
use crate::AppState;

/// POST /actions/add-category
pub async fn add_category(
    State(state): State<AppState>,
    RequireOwner(owner_id): RequireOwner,
    form: FormData,
) -> Result<ActionResult, ApiError> {
    let name = form.required("name")?;
    let req = CreateCategoryRequest {
        owner_id,
        slug: create_slug(&name),
        name,
        description: form.text("description"),
        icon: form.text("icon"),
        color: form.text("color"),
        parent_id: form.id_reference("parent")?,
        archived: form.checkbox_time("archived"),
        public: form.checkbox_time("public"),
        initial: false,
    };

    let category = state.categories.create(req).await?;
    info!(
        subsystem = "api",
        component = "actions",
        op = "add_category",
        owner_id,
        category_id = category.id,
        "Category added"
    );
    Ok(ActionResult::ok().with("id", category.id))
}

/// POST /actions/update-category
pub async fn update_category(
    State(state): State<AppState>,
    RequireOwner(owner_id): RequireOwner,
    form: FormData,
) -> Result<ActionResult, ApiError> {
    let id = form.id("id")?;
    let name = form.required("name")?;
    let req = UpdateCategoryRequest {
        slug: create_slug(&name),
        name,
        description: form.text("description"),
        icon: form.text("icon"),
        color: form.text("color"),
        parent_id: form.id_reference("parent")?,
        archived: form.checkbox_time("archived"),
        public: form.checkbox_time("public"),
    };

    state.categories.update(id, owner_id, req).await?;
    Ok(ActionResult::ok())
}

/// POST /actions/delete-category
pub async fn delete_category(
    State(state): State<AppState>,
    RequireOwner(owner_id): RequireOwner,
    form: FormData,
) -> Result<ActionResult, ApiError> {
    let id = form.id("id")?;
    if !state.categories.delete(id, owner_id).await? {
        return Ok(ActionResult::failure("Category not found"));
    }
    Ok(ActionResult::ok())
}
