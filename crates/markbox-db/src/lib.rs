//! # markbox-db
//!
//! PostgreSQL database layer for markbox.
//!
//! This crate provides:
//! - Connection pool management
//! - Owner-scoped repository implementations for every core entity
//! - Transactional bookmark saves (tags, images, links in one unit)
//! - File storage with a filesystem blob backend
//! - In-memory repositories for handler tests (feature `memory`)
//!
//! ## Example
//!
//! ```rust,ignore
//! use markbox_db::{Database, TagRepository, TagInput};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/markbox")
//!         .await?
//!         .with_filesystem_storage("/var/lib/markbox/files");
//!
//!     let ids = db.tags.prepare_tags(1, &[TagInput::name("rust")]).await?;
//!     println!("Resolved tags: {:?}", ids);
//!     Ok(())
//! }
//! ```
pub mod bookmarks;
pub mod categories;
pub mod file_storage;
#[cfg(feature = "memory")]
pub mod memory;
pub mod pool;
pub mod tags;
pub mod users;

// Test fixtures for integration tests
pub mod test_fixtures;

// Re-export core types
pub use markbox_core::*;

pub use bookmarks::PgBookmarkRepository;
pub use categories::PgCategoryRepository;
pub use file_storage::{
    compute_content_hash, generate_storage_path, sniff_content_type, FilesystemBackend,
    PgFileRepository, StorageBackend,
};
#[cfg(feature = "memory")]
pub use memory::MemoryStore;
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};
pub use tags::{prepare_tags_tx, PgTagRepository};
pub use users::PgUserRepository;

use markbox_core::defaults::FILE_STORAGE_PATH;

/// Combined database context with all repositories.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    pub users: PgUserRepository,
    pub categories: PgCategoryRepository,
    pub tags: PgTagRepository,
    /// Bookmark repository; shares `files` for image storage.
    pub bookmarks: PgBookmarkRepository,
    pub files: PgFileRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    ///
    /// Blobs go to the default storage path until
    /// [`with_filesystem_storage`](Self::with_filesystem_storage) is called.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self::with_backend(pool, FilesystemBackend::new(FILE_STORAGE_PATH))
    }

    fn with_backend(
        pool: sqlx::Pool<sqlx::Postgres>,
        backend: impl StorageBackend + 'static,
    ) -> Self {
        let files = PgFileRepository::new(pool.clone(), backend);
        Self {
            users: PgUserRepository::new(pool.clone()),
            categories: PgCategoryRepository::new(pool.clone()),
            tags: PgTagRepository::new(pool.clone()),
            bookmarks: PgBookmarkRepository::new(pool.clone(), files.clone()),
            files,
            pool,
        }
    }

    /// Configure file storage with a filesystem backend path.
    pub fn with_filesystem_storage(self, path: &str) -> Self {
        Self::with_backend(self.pool, FilesystemBackend::new(path))
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}
