//! Core traits for markbox abstractions.
//!
//! These traits define the repository interfaces the HTTP layer talks to.
//! Every method that touches owned data takes the owner id explicitly and
//! must never read or write rows belonging to another owner.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::*;
use crate::tags::TagInput;

// =============================================================================
// PAGINATION & ORDERING
// =============================================================================

/// Sort direction for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    /// Anything other than `asc` sorts descending.
    pub fn from_param(value: &str) -> Self {
        if value.eq_ignore_ascii_case("asc") {
            SortDirection::Asc
        } else {
            SortDirection::Desc
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Row offset for a 1-based page.
///
/// Returns `None` (no offsetting) unless both `page` and `limit` are present
/// and positive. A page whose offset does not fit in an `i64` is invalid input.
pub fn page_offset(page: Option<i64>, limit: Option<i64>) -> Result<Option<i64>> {
    match (page, limit) {
        (Some(page), Some(limit)) if page >= 1 && limit > 0 => (page - 1)
            .checked_mul(limit)
            .map(Some)
            .ok_or_else(|| Error::InvalidInput(format!("page {} is out of range", page))),
        _ => Ok(None),
    }
}

// =============================================================================
// USER REPOSITORY TRAITS
// =============================================================================

/// Partial update of user settings; `None` leaves a key untouched.
#[derive(Debug, Clone, Default)]
pub struct UserSettingsPatch {
    pub theme: Option<String>,
}

/// Repository for user records.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fetch a user by id.
    async fn get(&self, id: i64) -> Result<Option<User>>;

    /// Mirror an account from the auth service so owned rows can reference it.
    async fn ensure(&self, id: i64, username: &str, email: Option<&str>) -> Result<()>;

    /// Merge settings keys into the user's settings object.
    async fn update_settings(&self, id: i64, patch: UserSettingsPatch) -> Result<User>;
}

// =============================================================================
// CATEGORY REPOSITORY TRAITS
// =============================================================================

/// Sortable category columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryOrder {
    Created,
    Name,
    Slug,
}

impl CategoryOrder {
    pub fn column(self) -> &'static str {
        match self {
            CategoryOrder::Created => "created",
            CategoryOrder::Name => "name",
            CategoryOrder::Slug => "slug",
        }
    }
}

/// Options for listing an owner's categories.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListCategoriesRequest {
    pub order_by: Option<CategoryOrder>,
    /// Only consulted when `order_by` is set; defaults to descending.
    pub order_direction: Option<SortDirection>,
    pub limit: Option<i64>,
    /// 1-based page; ignored without `limit`.
    pub page: Option<i64>,
}

impl ListCategoriesRequest {
    pub fn offset(&self) -> Result<Option<i64>> {
        page_offset(self.page, self.limit)
    }
}

/// Request for creating a category.
#[derive(Debug, Clone)]
pub struct CreateCategoryRequest {
    pub owner_id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub parent_id: Option<i64>,
    pub archived: Option<DateTime<Utc>>,
    pub public: Option<DateTime<Utc>>,
    pub initial: bool,
}

/// Request for replacing a category's editable fields.
#[derive(Debug, Clone)]
pub struct UpdateCategoryRequest {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub parent_id: Option<i64>,
    pub archived: Option<DateTime<Utc>>,
    pub public: Option<DateTime<Utc>>,
}

/// Repository for category (tree) operations.
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    /// Fetch one category, expanding the requested relations.
    async fn get(
        &self,
        id: i64,
        owner_id: i64,
        relations: &[CategoryRelation],
    ) -> Result<Option<Category>>;

    /// List an owner's categories with ordering and pagination.
    async fn list(
        &self,
        owner_id: i64,
        req: &ListCategoriesRequest,
        relations: &[CategoryRelation],
    ) -> Result<Vec<Category>>;

    /// Create a category. A parent must belong to the same owner.
    async fn create(&self, req: CreateCategoryRequest) -> Result<Category>;

    /// Replace a category's editable fields.
    ///
    /// Returns `Error::NotFound` if no category matches `(id, owner_id)`.
    async fn update(&self, id: i64, owner_id: i64, req: UpdateCategoryRequest)
        -> Result<Category>;

    /// Hard-delete a category. Returns whether a row was removed.
    async fn delete(&self, id: i64, owner_id: i64) -> Result<bool>;

    /// Number of categories the owner has.
    async fn count(&self, owner_id: i64) -> Result<i64>;
}

// =============================================================================
// TAG REPOSITORY TRAITS
// =============================================================================

/// Repository for tag operations.
#[async_trait]
pub trait TagRepository: Send + Sync {
    /// Resolve descriptors to tag ids, creating missing names.
    ///
    /// Idempotent: resolving the same name twice yields the same id and a
    /// single row. The result keeps input order without duplicates.
    async fn prepare_tags(&self, owner_id: i64, inputs: &[TagInput]) -> Result<Vec<i64>>;

    /// List the owner's tags with bookmark counts, ordered by name.
    async fn list(&self, owner_id: i64) -> Result<Vec<Tag>>;

    /// Exact-name lookup.
    async fn find_by_name(&self, owner_id: i64, name: &str) -> Result<Option<Tag>>;
}

// =============================================================================
// BOOKMARK REPOSITORY TRAITS
// =============================================================================

/// Sortable bookmark columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookmarkOrder {
    Created,
    Title,
    Importance,
    OpenedLast,
}

impl BookmarkOrder {
    pub fn column(self) -> &'static str {
        match self {
            BookmarkOrder::Created => "created",
            BookmarkOrder::Title => "title",
            BookmarkOrder::Importance => "importance",
            BookmarkOrder::OpenedLast => "opened_last",
        }
    }
}

/// Options for listing an owner's bookmarks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListBookmarksRequest {
    pub category_id: Option<i64>,
    pub order_by: Option<BookmarkOrder>,
    pub order_direction: Option<SortDirection>,
    pub limit: Option<i64>,
    pub page: Option<i64>,
}

impl ListBookmarksRequest {
    pub fn offset(&self) -> Result<Option<i64>> {
        page_offset(self.page, self.limit)
    }
}

/// Editable bookmark fields as submitted by a form.
#[derive(Debug, Clone, Default)]
pub struct BookmarkDraft {
    pub url: String,
    pub domain: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub author: Option<String>,
    pub content_text: Option<String>,
    pub content_html: Option<String>,
    pub content_type: Option<String>,
    pub content_published_date: Option<DateTime<Utc>>,
    pub note: Option<String>,
    pub main_image_url: Option<String>,
    pub icon_url: Option<String>,
    pub importance: i32,
    pub flagged: Option<DateTime<Utc>>,
    pub category_id: Option<i64>,
}

/// Everything written when a bookmark is saved.
///
/// Repositories persist images, tags and the bookmark row as one unit:
/// either all of it is committed or none of it.
#[derive(Debug, Clone, Default)]
pub struct SaveBookmarkRequest {
    pub draft: BookmarkDraft,
    pub tags: Vec<TagInput>,
    /// Fetched main image; stored and linked as `main_image_id`
    pub main_image: Option<NewFile>,
    /// Fetched icon; stored and linked as `icon_id`
    pub icon: Option<NewFile>,
}

/// Single-field bookmark updates. Outer `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct BookmarkStatusPatch {
    pub flagged: Option<Option<DateTime<Utc>>>,
    pub read: Option<Option<DateTime<Utc>>>,
    pub importance: Option<i32>,
}

impl BookmarkStatusPatch {
    pub fn is_empty(&self) -> bool {
        self.flagged.is_none() && self.read.is_none() && self.importance.is_none()
    }
}

/// Repository for bookmark CRUD operations.
#[async_trait]
pub trait BookmarkRepository: Send + Sync {
    /// Fetch a bookmark with its tags.
    async fn get(&self, id: i64, owner_id: i64) -> Result<Option<Bookmark>>;

    /// List an owner's bookmarks with ordering and pagination.
    async fn list(&self, owner_id: i64, req: &ListBookmarksRequest) -> Result<Vec<Bookmark>>;

    /// Number of bookmarks the owner has, optionally within one category.
    async fn count(&self, owner_id: i64, category_id: Option<i64>) -> Result<i64>;

    /// Create a bookmark, its images and its tag links in one transaction.
    async fn create(&self, owner_id: i64, req: SaveBookmarkRequest) -> Result<Bookmark>;

    /// Replace a bookmark's fields and tag set in one transaction.
    ///
    /// Image ids are only replaced when a new image is supplied.
    /// Returns `Error::NotFound` if no bookmark matches `(id, owner_id)`.
    async fn update(&self, id: i64, owner_id: i64, req: SaveBookmarkRequest) -> Result<Bookmark>;

    /// Apply single-field updates. Returns false when no row matched.
    async fn update_status(&self, id: i64, owner_id: i64, patch: BookmarkStatusPatch)
        -> Result<bool>;

    /// Atomically increment `opened_times` and stamp `opened_last`.
    ///
    /// Returns the new count, or `None` when no row matched.
    async fn increment_opened(&self, id: i64, owner_id: i64) -> Result<Option<i32>>;

    /// Hard-delete a bookmark. Returns whether a row was removed.
    async fn delete(&self, id: i64, owner_id: i64) -> Result<bool>;

    /// Link a tag to a bookmark. Linking an already linked tag is a no-op.
    async fn add_tag(&self, bookmark_id: i64, owner_id: i64, tag_id: i64) -> Result<()>;
}

// =============================================================================
// FILE REPOSITORY TRAITS
// =============================================================================

/// Repository for owner-scoped stored files.
#[async_trait]
pub trait FileRepository: Send + Sync {
    /// Store bytes for an owner and record their metadata.
    async fn store_file(&self, owner_id: i64, file: NewFile) -> Result<StoredFile>;

    /// Fetch file metadata.
    async fn get(&self, id: i64, owner_id: i64) -> Result<Option<StoredFile>>;

    /// Fetch file metadata and content.
    async fn read(&self, id: i64, owner_id: i64) -> Result<Option<(StoredFile, Vec<u8>)>>;
}
