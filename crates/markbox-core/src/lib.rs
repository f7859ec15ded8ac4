//! # markbox-core
//!
//! Core types, traits, and abstractions for the markbox bookmark manager.
//!
//! This crate provides the domain models, the owner-scoped repository traits
//! implemented by `markbox-db`, and small helpers shared by the HTTP layer.

pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod slug;
pub mod tags;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use models::*;
pub use slug::create_slug;
pub use tags::{dedupe_ids, normalize_tag_name, validate_tag_name, TagInput};
pub use traits::*;
