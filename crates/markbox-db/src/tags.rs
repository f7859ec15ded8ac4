//! Tag repository implementation.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row, Transaction};
use tracing::debug;

use markbox_core::{
    dedupe_ids, normalize_tag_name, validate_tag_name, Error, Result, Tag, TagInput,
    TagRepository,
};

/// PostgreSQL implementation of TagRepository.
#[derive(Clone)]
pub struct PgTagRepository {
    pool: Pool<Postgres>,
}

impl PgTagRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

/// Resolve tag descriptors to ids inside an open transaction.
///
/// Names are upserted with `ON CONFLICT (owner_id, name) DO NOTHING` and read
/// back, so concurrent submissions of the same name converge on one row.
pub async fn prepare_tags_tx(
    tx: &mut Transaction<'_, Postgres>,
    owner_id: i64,
    inputs: &[TagInput],
) -> Result<Vec<i64>> {
    let mut ids = Vec::with_capacity(inputs.len());

    for input in inputs {
        match input {
            TagInput::Name(raw) => {
                let Some(name) = normalize_tag_name(raw) else {
                    continue;
                };
                validate_tag_name(name).map_err(Error::InvalidInput)?;

                sqlx::query(
                    "INSERT INTO tag (name, owner_id) VALUES ($1, $2)
                     ON CONFLICT (owner_id, name) DO NOTHING",
                )
                .bind(name)
                .bind(owner_id)
                .execute(&mut **tx)
                .await?;

                let id: i64 = sqlx::query_scalar(
                    "SELECT id FROM tag WHERE owner_id = $1 AND name = $2",
                )
                .bind(owner_id)
                .bind(name)
                .fetch_one(&mut **tx)
                .await?;
                ids.push(id);
            }
            TagInput::Id(id) => {
                let exists: bool = sqlx::query_scalar(
                    "SELECT EXISTS(SELECT 1 FROM tag WHERE id = $1 AND owner_id = $2)",
                )
                .bind(id)
                .bind(owner_id)
                .fetch_one(&mut **tx)
                .await?;
                if !exists {
                    return Err(Error::InvalidInput(format!("Unknown tag: {}", id)));
                }
                ids.push(*id);
            }
        }
    }

    let ids = dedupe_ids(ids);
    debug!(
        subsystem = "database",
        component = "tags",
        op = "prepare",
        owner_id,
        tag_count = ids.len(),
        "Resolved tags"
    );
    Ok(ids)
}

#[async_trait]
impl TagRepository for PgTagRepository {
    async fn prepare_tags(&self, owner_id: i64, inputs: &[TagInput]) -> Result<Vec<i64>> {
        let mut tx = self.pool.begin().await?;
        let ids = prepare_tags_tx(&mut tx, owner_id, inputs).await?;
        tx.commit().await?;
        Ok(ids)
    }

    async fn list(&self, owner_id: i64) -> Result<Vec<Tag>> {
        let rows = sqlx::query(
            r#"
            SELECT t.id, t.name, t.owner_id, t.created, t.updated,
                   COUNT(bt.bookmark_id) AS bookmark_count
            FROM tag t
            LEFT JOIN bookmark_tag bt ON bt.tag_id = t.id
            WHERE t.owner_id = $1
            GROUP BY t.id
            ORDER BY t.name
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(tag_from_row).collect())
    }

    async fn find_by_name(&self, owner_id: i64, name: &str) -> Result<Option<Tag>> {
        let row = sqlx::query(
            r#"
            SELECT t.id, t.name, t.owner_id, t.created, t.updated,
                   (SELECT COUNT(*) FROM bookmark_tag bt WHERE bt.tag_id = t.id) AS bookmark_count
            FROM tag t
            WHERE t.owner_id = $1 AND t.name = $2
            "#,
        )
        .bind(owner_id)
        .bind(name.trim())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(tag_from_row))
    }
}

fn tag_from_row(row: &sqlx::postgres::PgRow) -> Tag {
    Tag {
        id: row.get("id"),
        name: row.get("name"),
        owner_id: row.get("owner_id"),
        created: row.get("created"),
        updated: row.get("updated"),
        bookmark_count: row.get("bookmark_count"),
    }
}
