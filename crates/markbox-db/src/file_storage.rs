//! Owner-scoped file storage with a pluggable blob backend.
//!
//! Metadata lives in the `file` table; bytes live in a [`StorageBackend`]
//! under `blobs/{2 hex}/{2 hex}/{uuid}.bin`. Content type is sniffed from
//! magic bytes and every blob is hashed with BLAKE3.
//!
//! ```rust,ignore
//! use markbox_db::file_storage::{FilesystemBackend, PgFileRepository};
//!
//! let repo = PgFileRepository::new(pool, FilesystemBackend::new("/var/lib/markbox/files"));
//! let stored = repo.store_file(owner_id, NewFile { file_name, data }).await?;
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use markbox_core::{Error, FileRepository, NewFile, Result, StoredFile};

/// Content type recorded when the magic bytes are not recognised.
pub const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Storage backend trait for different storage implementations.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Write data to the specified path.
    async fn write(&self, path: &str, data: &[u8]) -> Result<()>;

    /// Read data from the specified path.
    async fn read(&self, path: &str) -> Result<Vec<u8>>;

    /// Delete data at the specified path. Missing data is not an error.
    async fn delete(&self, path: &str) -> Result<()>;
}

/// Filesystem storage backend rooted at a base directory.
pub struct FilesystemBackend {
    base_path: PathBuf,
}

impl FilesystemBackend {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn full_path(&self, path: &str) -> PathBuf {
        self.base_path.join(path)
    }

    /// Write, read back and delete a probe file.
    ///
    /// Run at startup so permission problems surface before the first upload.
    pub async fn validate(&self) -> std::result::Result<(), String> {
        let test_dir = self.base_path.join("blobs/.health-check");
        let test_file = test_dir.join("test.bin");

        fs::create_dir_all(&test_dir)
            .await
            .map_err(|e| format!("create_dir_all({:?}): {}", test_dir, e))?;

        let data = b"storage-health-check";
        fs::write(&test_file, data)
            .await
            .map_err(|e| format!("write({:?}): {}", test_file, e))?;

        let read_data = fs::read(&test_file)
            .await
            .map_err(|e| format!("read({:?}): {}", test_file, e))?;
        if read_data != data {
            return Err("read-back mismatch".to_string());
        }

        fs::remove_file(&test_file)
            .await
            .map_err(|e| format!("remove_file({:?}): {}", test_file, e))?;
        let _ = fs::remove_dir(&test_dir).await;

        Ok(())
    }
}

#[async_trait]
impl StorageBackend for FilesystemBackend {
    async fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.full_path(path);
        debug!(storage_path = %path, size_bytes = data.len(), "file_storage: write");

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                warn!(parent = %parent.display(), error = %e, "file_storage: create_dir_all failed");
                e
            })?;
        }

        // temp file + rename keeps readers from seeing partial blobs
        let temp_path = full_path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, &full_path).await.map_err(|e| {
            warn!(from = %temp_path.display(), to = %full_path.display(), error = %e, "file_storage: rename failed");
            e
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&full_path, std::fs::Permissions::from_mode(0o644)).await?;
        }

        Ok(())
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = self.full_path(path);
        fs::read(&full_path)
            .await
            .map_err(|e| Error::Storage(format!("read {}: {}", path, e)))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        match fs::remove_file(self.full_path(path)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Storage(format!("delete {}: {}", path, e))),
        }
    }
}

/// Remove blobs whose metadata rows were never committed.
///
/// Failures are logged and swallowed; the caller is already returning the
/// error that caused the rollback.
pub async fn discard_blobs(backend: &dyn StorageBackend, paths: &[String]) {
    for path in paths {
        if let Err(e) = backend.delete(path).await {
            warn!(
                subsystem = "storage",
                component = "file_storage",
                op = "discard",
                storage_path = %path,
                error = %e,
                "Failed to remove orphaned blob"
            );
        }
    }
    if !paths.is_empty() {
        debug!(
            subsystem = "storage",
            component = "file_storage",
            op = "discard",
            result_count = paths.len(),
            "Discarded blobs of a rolled back save"
        );
    }
}

/// BLAKE3 hash of data with a `blake3:` prefix.
pub fn compute_content_hash(data: &[u8]) -> String {
    format!("blake3:{}", blake3::hash(data).to_hex())
}

/// Storage path for a blob id: `blobs/{first-2-hex}/{next-2-hex}/{uuid}.bin`.
pub fn generate_storage_path(uuid: &Uuid) -> String {
    let hex = uuid.simple().to_string();
    format!(
        "blobs/{}/{}/{}.bin",
        &hex[0..2],
        &hex[2..4],
        uuid.as_hyphenated()
    )
}

/// MIME type from magic bytes.
pub fn sniff_content_type(data: &[u8]) -> String {
    infer::get(data)
        .map(|kind| kind.mime_type().to_string())
        .unwrap_or_else(|| FALLBACK_CONTENT_TYPE.to_string())
}

/// PostgreSQL file metadata repository over a blob backend.
#[derive(Clone)]
pub struct PgFileRepository {
    pool: PgPool,
    backend: Arc<dyn StorageBackend>,
}

impl PgFileRepository {
    pub fn new(pool: PgPool, backend: impl StorageBackend + 'static) -> Self {
        Self {
            pool,
            backend: Arc::new(backend),
        }
    }

    /// Delete blobs written under a transaction that did not commit.
    pub async fn discard(&self, paths: &[String]) {
        discard_blobs(self.backend.as_ref(), paths).await;
    }

    /// Transaction-aware variant of `store_file`.
    ///
    /// The blob is written before the row and removed again if the insert
    /// fails. Once this returns, the caller owns the blob: if the transaction
    /// later rolls back it must pass `storage_path` to [`discard`](Self::discard).
    pub async fn store_file_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        owner_id: i64,
        file: &NewFile,
    ) -> Result<StoredFile> {
        let blob_id = Uuid::now_v7();
        let path = generate_storage_path(&blob_id);
        self.backend.write(&path, &file.data).await?;

        let inserted = sqlx::query(
            r#"INSERT INTO file
               (owner_id, file_name, content_type, size_bytes, content_hash, blob_id, storage_path)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               RETURNING id, owner_id, file_name, content_type, size_bytes,
                         content_hash, storage_path, created"#,
        )
        .bind(owner_id)
        .bind(&file.file_name)
        .bind(sniff_content_type(&file.data))
        .bind(file.data.len() as i64)
        .bind(compute_content_hash(&file.data))
        .bind(blob_id)
        .bind(&path)
        .fetch_one(&mut **tx)
        .await;
        let row = match inserted {
            Ok(row) => row,
            Err(e) => {
                self.discard(std::slice::from_ref(&path)).await;
                return Err(e.into());
            }
        };

        debug!(
            subsystem = "database",
            component = "file_storage",
            op = "store",
            owner_id,
            size_bytes = file.data.len(),
            "Stored file"
        );
        Ok(stored_file_from_row(&row))
    }
}

#[async_trait]
impl FileRepository for PgFileRepository {
    async fn store_file(&self, owner_id: i64, file: NewFile) -> Result<StoredFile> {
        let mut tx = self.pool.begin().await?;
        let stored = self.store_file_tx(&mut tx, owner_id, &file).await?;
        if let Err(e) = tx.commit().await {
            self.discard(std::slice::from_ref(&stored.storage_path)).await;
            return Err(e.into());
        }
        Ok(stored)
    }

    async fn get(&self, id: i64, owner_id: i64) -> Result<Option<StoredFile>> {
        let row = sqlx::query(
            r#"SELECT id, owner_id, file_name, content_type, size_bytes,
                      content_hash, storage_path, created
               FROM file WHERE id = $1 AND owner_id = $2"#,
        )
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(stored_file_from_row))
    }

    async fn read(&self, id: i64, owner_id: i64) -> Result<Option<(StoredFile, Vec<u8>)>> {
        let Some(file) = FileRepository::get(self, id, owner_id).await? else {
            return Ok(None);
        };
        let data = self.backend.read(&file.storage_path).await?;
        Ok(Some((file, data)))
    }
}

fn stored_file_from_row(row: &sqlx::postgres::PgRow) -> StoredFile {
    StoredFile {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
        file_name: row.get("file_name"),
        content_type: row.get("content_type"),
        size_bytes: row.get("size_bytes"),
        content_hash: row.get("content_hash"),
        storage_path: row.get("storage_path"),
        created: row.get("created"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_prefix() {
        let hash = compute_content_hash(b"hello");
        assert!(hash.starts_with("blake3:"));
        assert_eq!(hash.len(), "blake3:".len() + 64);
    }

    #[test]
    fn test_storage_path_layout() {
        let id = Uuid::parse_str("01948f7e-8b2a-7c3d-9e4f-5a6b7c8d9e0f").unwrap();
        assert_eq!(
            generate_storage_path(&id),
            "blobs/01/94/01948f7e-8b2a-7c3d-9e4f-5a6b7c8d9e0f.bin"
        );
    }

    #[test]
    fn test_sniff_png() {
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        assert_eq!(sniff_content_type(&png), "image/png");
    }

    #[test]
    fn test_sniff_unknown_falls_back() {
        assert_eq!(sniff_content_type(b"plain words"), FALLBACK_CONTENT_TYPE);
    }

    #[tokio::test]
    async fn test_filesystem_backend_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path());

        backend.write("blobs/aa/bb/x.bin", b"data").await.unwrap();
        assert!(dir.path().join("blobs/aa/bb/x.bin").exists());
        assert_eq!(backend.read("blobs/aa/bb/x.bin").await.unwrap(), b"data");
        assert!(!dir.path().join("blobs/aa/bb/x.tmp").exists());

        backend.delete("blobs/aa/bb/x.bin").await.unwrap();
        assert!(!dir.path().join("blobs/aa/bb/x.bin").exists());
        assert!(matches!(
            backend.read("blobs/aa/bb/x.bin").await,
            Err(Error::Storage(_))
        ));
    }

    #[tokio::test]
    async fn test_discard_blobs_removes_written_and_ignores_missing() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path());
        let first = generate_storage_path(&Uuid::now_v7());
        let second = generate_storage_path(&Uuid::now_v7());
        backend.write(&first, b"main image").await.unwrap();
        backend.write(&second, b"icon").await.unwrap();

        let never_written = generate_storage_path(&Uuid::now_v7());
        discard_blobs(&backend, &[first.clone(), second.clone(), never_written]).await;

        assert!(!dir.path().join(&first).exists());
        assert!(!dir.path().join(&second).exists());
    }

    #[tokio::test]
    async fn test_filesystem_backend_validate() {
        let dir = tempfile::tempdir().unwrap();
        assert!(FilesystemBackend::new(dir.path()).validate().await.is_ok());
    }
}
