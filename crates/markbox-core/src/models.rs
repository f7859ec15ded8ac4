//! Core data models for markbox.
//!
//! These are the view models handed to callers. Storage rows live in
//! `markbox-db` and are converted into these types before leaving the
//! repository layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

// =============================================================================
// USER TYPES
// =============================================================================

/// Per-user preferences stored as a JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserSettings {
    /// UI theme name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    /// Keys this version does not interpret, preserved on write
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

/// An application user. Owns every other entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub settings: UserSettings,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

/// Owner expansion attached to categories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
}

// =============================================================================
// CATEGORY TYPES
// =============================================================================

/// Relations that can be expanded when fetching categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryRelation {
    Owner,
    Parent,
}

impl CategoryRelation {
    /// Every relation; the default expansion.
    pub const ALL: &'static [CategoryRelation] =
        &[CategoryRelation::Owner, CategoryRelation::Parent];
}

/// Parent expansion attached to categories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub icon: Option<String>,
    pub color: Option<String>,
}

/// A bookmark category. Categories form a tree through `parent_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub parent_id: Option<i64>,
    pub archived: Option<DateTime<Utc>>,
    pub public: Option<DateTime<Utc>>,
    /// Created by onboarding rather than by the user
    pub initial: bool,
    pub owner_id: i64,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<UserSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<CategorySummary>,
}

impl Category {
    pub fn summary(&self) -> CategorySummary {
        CategorySummary {
            id: self.id,
            name: self.name.clone(),
            slug: self.slug.clone(),
            icon: self.icon.clone(),
            color: self.color.clone(),
        }
    }
}

// =============================================================================
// TAG TYPES
// =============================================================================

/// A tag definition, unique per owner by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub owner_id: i64,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    /// Number of bookmarks carrying this tag (computed)
    #[serde(default)]
    pub bookmark_count: i64,
}

/// Tag as embedded in a bookmark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRef {
    pub id: i64,
    pub name: String,
}

// =============================================================================
// BOOKMARK TYPES
// =============================================================================

/// A saved URL with extracted metadata and reading state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: i64,
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
    pub main_image_id: Option<i64>,
    pub icon_id: Option<i64>,
    pub importance: i32,
    pub flagged: Option<DateTime<Utc>>,
    pub read: Option<DateTime<Utc>>,
    pub opened_times: i32,
    pub opened_last: Option<DateTime<Utc>>,
    pub category_id: Option<i64>,
    pub owner_id: i64,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    #[serde(default)]
    pub tags: Vec<TagRef>,
}

// =============================================================================
// FILE TYPES
// =============================================================================

/// Metadata of a blob stored for an owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredFile {
    pub id: i64,
    pub owner_id: i64,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    /// `blake3:<hex>`
    pub content_hash: String,
    pub storage_path: String,
    pub created: DateTime<Utc>,
}

/// Bytes to be stored under a file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFile {
    pub file_name: String,
    pub data: Vec<u8>,
}
