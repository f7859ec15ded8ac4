//! Bookmark repository implementation.
//!
//! Creating and updating a bookmark touches four tables (tag, file,
//! bookmark, bookmark_tag). Both run in a single transaction so a failed
//! save leaves no partial rows behind; blobs written for a failed save are
//! deleted after the rollback.

use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row, Transaction};
use tracing::{debug, info};

use markbox_core::{
    Bookmark, BookmarkDraft, BookmarkRepository, BookmarkStatusPatch, Error,
    ListBookmarksRequest, Result, SaveBookmarkRequest, TagRef,
};

use crate::file_storage::PgFileRepository;
use crate::tags::prepare_tags_tx;

const BOOKMARK_COLUMNS: &str = r#"
    id, url, domain, title, description, author, content_text, content_html,
    content_type, content_published_date, note, main_image_url, icon_url,
    main_image_id, icon_id, importance, flagged, read, opened_times, opened_last,
    category_id, owner_id, created, updated
"#;

/// PostgreSQL implementation of BookmarkRepository.
#[derive(Clone)]
pub struct PgBookmarkRepository {
    pool: Pool<Postgres>,
    files: PgFileRepository,
}

impl PgBookmarkRepository {
    pub fn new(pool: Pool<Postgres>, files: PgFileRepository) -> Self {
        Self { pool, files }
    }

    /// Attach tags to already-fetched bookmarks with one query.
    async fn load_tags(&self, bookmarks: &mut [Bookmark]) -> Result<()> {
        if bookmarks.is_empty() {
            return Ok(());
        }
        let ids: Vec<i64> = bookmarks.iter().map(|b| b.id).collect();

        let rows = sqlx::query(
            r#"SELECT bt.bookmark_id, t.id, t.name
               FROM bookmark_tag bt
               JOIN tag t ON t.id = bt.tag_id
               WHERE bt.bookmark_id = ANY($1)
               ORDER BY t.name"#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_bookmark: HashMap<i64, Vec<TagRef>> = HashMap::new();
        for row in rows {
            by_bookmark
                .entry(row.get("bookmark_id"))
                .or_default()
                .push(TagRef {
                    id: row.get("id"),
                    name: row.get("name"),
                });
        }
        for bookmark in bookmarks.iter_mut() {
            bookmark.tags = by_bookmark.remove(&bookmark.id).unwrap_or_default();
        }
        Ok(())
    }

    /// Store fetched images; returns `(main_image_id, icon_id)`.
    ///
    /// Blob paths are pushed to `written` so a failed save can remove them.
    async fn store_images_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        owner_id: i64,
        req: &SaveBookmarkRequest,
        written: &mut Vec<String>,
    ) -> Result<(Option<i64>, Option<i64>)> {
        let mut ids = [None, None];
        for (slot, file) in ids.iter_mut().zip([&req.main_image, &req.icon]) {
            if let Some(file) = file {
                let stored = self.files.store_file_tx(tx, owner_id, file).await?;
                written.push(stored.storage_path);
                *slot = Some(stored.id);
            }
        }
        let [main_image_id, icon_id] = ids;
        Ok((main_image_id, icon_id))
    }

    /// Insert the bookmark and everything it references; returns the new id.
    async fn create_tx(
        &self,
        owner_id: i64,
        req: &SaveBookmarkRequest,
        written: &mut Vec<String>,
    ) -> Result<(i64, usize)> {
        let mut tx = self.pool.begin().await?;

        let tag_ids = prepare_tags_tx(&mut tx, owner_id, &req.tags).await?;
        check_category_tx(&mut tx, owner_id, req.draft.category_id).await?;
        let (main_image_id, icon_id) =
            self.store_images_tx(&mut tx, owner_id, req, written).await?;

        let d = &req.draft;
        let id: i64 = sqlx::query_scalar(
            r#"INSERT INTO bookmark
               (url, domain, title, description, author, content_text, content_html,
                content_type, content_published_date, note, main_image_url, icon_url,
                main_image_id, icon_id, importance, flagged, category_id, owner_id)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9,
                       $10, $11, $12, $13, $14, $15, $16, $17, $18)
               RETURNING id"#,
        )
        .bind(&d.url)
        .bind(&d.domain)
        .bind(&d.title)
        .bind(&d.description)
        .bind(&d.author)
        .bind(&d.content_text)
        .bind(&d.content_html)
        .bind(&d.content_type)
        .bind(d.content_published_date)
        .bind(&d.note)
        .bind(&d.main_image_url)
        .bind(&d.icon_url)
        .bind(main_image_id)
        .bind(icon_id)
        .bind(d.importance)
        .bind(d.flagged)
        .bind(d.category_id)
        .bind(owner_id)
        .fetch_one(&mut *tx)
        .await?;

        link_tags_tx(&mut tx, id, &tag_ids).await?;
        tx.commit().await?;
        Ok((id, tag_ids.len()))
    }

    /// Replace the bookmark's fields and tag set; returns the tag count.
    async fn update_tx(
        &self,
        id: i64,
        owner_id: i64,
        req: &SaveBookmarkRequest,
        written: &mut Vec<String>,
    ) -> Result<usize> {
        let mut tx = self.pool.begin().await?;

        let found: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM bookmark WHERE id = $1 AND owner_id = $2 FOR UPDATE",
        )
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&mut *tx)
        .await?;
        if found.is_none() {
            return Err(Error::NotFound(format!("Bookmark {}", id)));
        }

        let tag_ids = prepare_tags_tx(&mut tx, owner_id, &req.tags).await?;
        check_category_tx(&mut tx, owner_id, req.draft.category_id).await?;
        let (main_image_id, icon_id) =
            self.store_images_tx(&mut tx, owner_id, req, written).await?;

        let d: &BookmarkDraft = &req.draft;
        sqlx::query(
            r#"UPDATE bookmark
               SET url = $1, domain = $2, title = $3, description = $4, author = $5,
                   content_text = $6, content_html = $7, content_type = $8,
                   content_published_date = $9, note = $10, main_image_url = $11,
                   icon_url = $12,
                   main_image_id = COALESCE($13, main_image_id),
                   icon_id = COALESCE($14, icon_id),
                   importance = $15, flagged = $16, category_id = $17, updated = NOW()
               WHERE id = $18 AND owner_id = $19"#,
        )
        .bind(&d.url)
        .bind(&d.domain)
        .bind(&d.title)
        .bind(&d.description)
        .bind(&d.author)
        .bind(&d.content_text)
        .bind(&d.content_html)
        .bind(&d.content_type)
        .bind(d.content_published_date)
        .bind(&d.note)
        .bind(&d.main_image_url)
        .bind(&d.icon_url)
        .bind(main_image_id)
        .bind(icon_id)
        .bind(d.importance)
        .bind(d.flagged)
        .bind(d.category_id)
        .bind(id)
        .bind(owner_id)
        .execute(&mut *tx)
        .await?;

        // Replace the tag set: drop links not in the resolved set, add the rest.
        sqlx::query("DELETE FROM bookmark_tag WHERE bookmark_id = $1 AND tag_id <> ALL($2)")
            .bind(id)
            .bind(&tag_ids)
            .execute(&mut *tx)
            .await?;
        link_tags_tx(&mut tx, id, &tag_ids).await?;

        tx.commit().await?;
        Ok(tag_ids.len())
    }
}

async fn check_category_tx(
    tx: &mut Transaction<'_, Postgres>,
    owner_id: i64,
    category_id: Option<i64>,
) -> Result<()> {
    let Some(category_id) = category_id else {
        return Ok(());
    };
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM category WHERE id = $1 AND owner_id = $2)",
    )
    .bind(category_id)
    .bind(owner_id)
    .fetch_one(&mut **tx)
    .await?;
    if !exists {
        return Err(Error::InvalidInput(format!(
            "Unknown category: {}",
            category_id
        )));
    }
    Ok(())
}

/// Link resolved tags. Already linked pairs are left alone.
async fn link_tags_tx(
    tx: &mut Transaction<'_, Postgres>,
    bookmark_id: i64,
    tag_ids: &[i64],
) -> Result<()> {
    if tag_ids.is_empty() {
        return Ok(());
    }
    sqlx::query(
        r#"INSERT INTO bookmark_tag (bookmark_id, tag_id)
           SELECT $1, UNNEST($2::BIGINT[])
           ON CONFLICT DO NOTHING"#,
    )
    .bind(bookmark_id)
    .bind(tag_ids)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[async_trait]
impl BookmarkRepository for PgBookmarkRepository {
    async fn get(&self, id: i64, owner_id: i64) -> Result<Option<Bookmark>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM bookmark WHERE id = $1 AND owner_id = $2",
            BOOKMARK_COLUMNS
        ))
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut bookmarks = [bookmark_from_row(&row)];
        self.load_tags(&mut bookmarks).await?;
        let [bookmark] = bookmarks;
        Ok(Some(bookmark))
    }

    async fn list(&self, owner_id: i64, req: &ListBookmarksRequest) -> Result<Vec<Bookmark>> {
        let mut sql = format!("SELECT {} FROM bookmark WHERE owner_id = $1", BOOKMARK_COLUMNS);
        let mut param_idx = 2;

        if req.category_id.is_some() {
            sql.push_str(&format!(" AND category_id = ${}", param_idx));
            param_idx += 1;
        }

        match req.order_by {
            Some(order) => {
                let direction = req.order_direction.unwrap_or_default();
                sql.push_str(&format!(
                    " ORDER BY {} {} NULLS LAST, id {}",
                    order.column(),
                    direction.as_sql(),
                    direction.as_sql()
                ));
            }
            None => sql.push_str(" ORDER BY created DESC, id DESC"),
        }

        if req.limit.is_some() {
            sql.push_str(&format!(" LIMIT ${}", param_idx));
            param_idx += 1;
        }
        let offset = req.offset()?;
        if offset.is_some() {
            sql.push_str(&format!(" OFFSET ${}", param_idx));
        }

        let mut query = sqlx::query(&sql).bind(owner_id);
        if let Some(category_id) = req.category_id {
            query = query.bind(category_id);
        }
        if let Some(limit) = req.limit {
            query = query.bind(limit);
        }
        if let Some(offset) = offset {
            query = query.bind(offset);
        }

        let rows = query.fetch_all(&self.pool).await?;
        let mut bookmarks: Vec<Bookmark> = rows.iter().map(bookmark_from_row).collect();
        self.load_tags(&mut bookmarks).await?;
        Ok(bookmarks)
    }

    async fn count(&self, owner_id: i64, category_id: Option<i64>) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM bookmark
             WHERE owner_id = $1 AND ($2::BIGINT IS NULL OR category_id = $2)",
        )
        .bind(owner_id)
        .bind(category_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn create(&self, owner_id: i64, req: SaveBookmarkRequest) -> Result<Bookmark> {
        let start = Instant::now();
        let mut written = Vec::new();
        let (id, tag_count) = match self.create_tx(owner_id, &req, &mut written).await {
            Ok(saved) => saved,
            Err(e) => {
                self.files.discard(&written).await;
                return Err(e);
            }
        };

        info!(
            subsystem = "database",
            component = "bookmarks",
            op = "create",
            owner_id,
            bookmark_id = id,
            tag_count,
            duration_ms = start.elapsed().as_millis() as u64,
            "Bookmark created"
        );

        self.get(id, owner_id)
            .await?
            .ok_or_else(|| Error::Internal(format!("Bookmark {} vanished after insert", id)))
    }

    async fn update(&self, id: i64, owner_id: i64, req: SaveBookmarkRequest) -> Result<Bookmark> {
        let start = Instant::now();
        let mut written = Vec::new();
        let tag_count = match self.update_tx(id, owner_id, &req, &mut written).await {
            Ok(count) => count,
            Err(e) => {
                self.files.discard(&written).await;
                return Err(e);
            }
        };

        info!(
            subsystem = "database",
            component = "bookmarks",
            op = "update",
            owner_id,
            bookmark_id = id,
            tag_count,
            duration_ms = start.elapsed().as_millis() as u64,
            "Bookmark updated"
        );

        self.get(id, owner_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Bookmark {}", id)))
    }

    async fn update_status(
        &self,
        id: i64,
        owner_id: i64,
        patch: BookmarkStatusPatch,
    ) -> Result<bool> {
        if patch.is_empty() {
            return Ok(self.get(id, owner_id).await?.is_some());
        }

        let mut sets = Vec::new();
        let mut param_idx = 3; // $1 = id, $2 = owner_id
        if patch.flagged.is_some() {
            sets.push(format!("flagged = ${}", param_idx));
            param_idx += 1;
        }
        if patch.read.is_some() {
            sets.push(format!("read = ${}", param_idx));
            param_idx += 1;
        }
        if patch.importance.is_some() {
            sets.push(format!("importance = ${}", param_idx));
        }
        sets.push("updated = NOW()".to_string());

        let sql = format!(
            "UPDATE bookmark SET {} WHERE id = $1 AND owner_id = $2",
            sets.join(", ")
        );
        let mut query = sqlx::query(&sql).bind(id).bind(owner_id);
        if let Some(flagged) = patch.flagged {
            query = query.bind(flagged);
        }
        if let Some(read) = patch.read {
            query = query.bind(read);
        }
        if let Some(importance) = patch.importance {
            query = query.bind(importance);
        }

        let result = query.execute(&self.pool).await?;
        debug!(
            subsystem = "database",
            component = "bookmarks",
            op = "update_status",
            owner_id,
            bookmark_id = id,
            "Bookmark status updated"
        );
        Ok(result.rows_affected() > 0)
    }

    async fn increment_opened(&self, id: i64, owner_id: i64) -> Result<Option<i32>> {
        let opened_times: Option<i32> = sqlx::query_scalar(
            r#"UPDATE bookmark
               SET opened_times = opened_times + 1, opened_last = NOW()
               WHERE id = $1 AND owner_id = $2
               RETURNING opened_times"#,
        )
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(opened_times)
    }

    async fn delete(&self, id: i64, owner_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM bookmark WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn add_tag(&self, bookmark_id: i64, owner_id: i64, tag_id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let owned: bool = sqlx::query_scalar(
            r#"SELECT EXISTS(SELECT 1 FROM bookmark WHERE id = $1 AND owner_id = $3)
                  AND EXISTS(SELECT 1 FROM tag WHERE id = $2 AND owner_id = $3)"#,
        )
        .bind(bookmark_id)
        .bind(tag_id)
        .bind(owner_id)
        .fetch_one(&mut *tx)
        .await?;
        if !owned {
            return Err(Error::NotFound(format!(
                "Bookmark {} or tag {}",
                bookmark_id, tag_id
            )));
        }

        link_tags_tx(&mut tx, bookmark_id, &[tag_id]).await?;
        tx.commit().await?;
        Ok(())
    }
}

fn bookmark_from_row(row: &sqlx::postgres::PgRow) -> Bookmark {
    Bookmark {
        id: row.get("id"),
        url: row.get("url"),
        domain: row.get("domain"),
        title: row.get("title"),
        description: row.get("description"),
        author: row.get("author"),
        content_text: row.get("content_text"),
        content_html: row.get("content_html"),
        content_type: row.get("content_type"),
        content_published_date: row.get("content_published_date"),
        note: row.get("note"),
        main_image_url: row.get("main_image_url"),
        icon_url: row.get("icon_url"),
        main_image_id: row.get("main_image_id"),
        icon_id: row.get("icon_id"),
        importance: row.get("importance"),
        flagged: row.get("flagged"),
        read: row.get("read"),
        opened_times: row.get("opened_times"),
        opened_last: row.get("opened_last"),
        category_id: row.get("category_id"),
        owner_id: row.get("owner_id"),
        created: row.get("created"),
        updated: row.get("updated"),
        tags: Vec::new(),
    }
}
