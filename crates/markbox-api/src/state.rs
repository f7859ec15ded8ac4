//! Shared application state.

use std::sync::Arc;

use markbox_core::{
    BookmarkRepository, CategoryRepository, FileRepository, TagRepository, UserRepository,
};
use markbox_db::Database;

use crate::config::AppConfig;
use crate::services::{AuthService, ImageFetcher};

/// Repositories, outbound services and configuration shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepository>,
    pub categories: Arc<dyn CategoryRepository>,
    pub tags: Arc<dyn TagRepository>,
    pub bookmarks: Arc<dyn BookmarkRepository>,
    pub files: Arc<dyn FileRepository>,
    pub auth: Arc<dyn AuthService>,
    pub images: Arc<dyn ImageFetcher>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// State backed by PostgreSQL repositories.
    pub fn from_database(
        db: Database,
        auth: Arc<dyn AuthService>,
        images: Arc<dyn ImageFetcher>,
        config: AppConfig,
    ) -> Self {
        Self {
            users: Arc::new(db.users),
            categories: Arc::new(db.categories),
            tags: Arc::new(db.tags),
            bookmarks: Arc::new(db.bookmarks),
            files: Arc::new(db.files),
            auth,
            images,
            config: Arc::new(config),
        }
    }

    /// State backed by a single store implementing every repository.
    pub fn with_store<S>(
        store: S,
        auth: Arc<dyn AuthService>,
        images: Arc<dyn ImageFetcher>,
        config: AppConfig,
    ) -> Self
    where
        S: UserRepository
            + CategoryRepository
            + TagRepository
            + BookmarkRepository
            + FileRepository
            + 'static,
    {
        let store = Arc::new(store);
        Self {
            users: store.clone(),
            categories: store.clone(),
            tags: store.clone(),
            bookmarks: store.clone(),
            files: store,
            auth,
            images,
            config: Arc::new(config),
        }
    }
}
