//! Tag descriptors and name rules shared by every tag repository.
//!
//! A bookmark form submits its tags as a list of descriptors: references to
//! tags the owner already has, mixed with free text naming new ones.
//! Repositories resolve the list with `TagRepository::prepare_tags`.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::defaults::TAG_NAME_MAX_LEN;

/// One element of a submitted tag list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagInput {
    /// Reference to an existing tag of the same owner.
    Id(i64),
    /// Tag name; resolved by `(name, owner_id)` and created when missing.
    Name(String),
}

impl TagInput {
    pub fn name(name: impl Into<String>) -> Self {
        TagInput::Name(name.into())
    }
}

/// Validate a tag name after trimming.
///
/// Rules:
/// - Length between 1 and 100 characters
/// - No control characters (newlines, tabs, NUL)
///
/// Returns Ok(()) if valid, Err with message if invalid.
pub fn validate_tag_name(tag: &str) -> std::result::Result<(), String> {
    if tag.is_empty() {
        return Err("Tag name cannot be empty".to_string());
    }
    if tag.chars().count() > TAG_NAME_MAX_LEN {
        return Err(format!(
            "Tag name must be {} characters or less",
            TAG_NAME_MAX_LEN
        ));
    }
    if tag.chars().any(char::is_control) {
        return Err("Tag name cannot contain control characters".to_string());
    }
    Ok(())
}

/// Trim a submitted name; `None` when nothing is left.
pub fn normalize_tag_name(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Drop repeated ids, keeping the first occurrence order.
pub fn dedupe_ids(ids: Vec<i64>) -> Vec<i64> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}
