//! Category repository implementation.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use tracing::debug;

use markbox_core::{
    Category, CategoryRelation, CategoryRepository, CategorySummary, CreateCategoryRequest,
    Error, ListCategoriesRequest, Result, UpdateCategoryRequest, UserSummary,
};

const CATEGORY_SELECT: &str = r#"
    SELECT c.id, c.name, c.slug, c.description, c.icon, c.color, c.parent_id,
           c.archived, c.public, c.initial, c.owner_id, c.created, c.updated,
           u.username AS owner_username,
           p.name AS parent_name, p.slug AS parent_slug,
           p.icon AS parent_icon, p.color AS parent_color
    FROM category c
    JOIN app_user u ON u.id = c.owner_id
    LEFT JOIN category p ON p.id = c.parent_id AND p.owner_id = c.owner_id
"#;

/// PostgreSQL implementation of CategoryRepository.
#[derive(Clone)]
pub struct PgCategoryRepository {
    pool: Pool<Postgres>,
}

impl PgCategoryRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Reject parents that are missing, foreign, the category itself, or one
    /// of its descendants.
    async fn check_parent(
        &self,
        owner_id: i64,
        category_id: Option<i64>,
        parent_id: Option<i64>,
    ) -> Result<()> {
        let Some(parent_id) = parent_id else {
            return Ok(());
        };
        if Some(parent_id) == category_id {
            return Err(Error::InvalidInput(
                "Category cannot be its own parent".to_string(),
            ));
        }
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM category WHERE id = $1 AND owner_id = $2)",
        )
        .bind(parent_id)
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await?;
        if !exists {
            return Err(Error::InvalidInput(format!(
                "Unknown parent category: {}",
                parent_id
            )));
        }

        let Some(category_id) = category_id else {
            return Ok(());
        };
        // UNION (not UNION ALL) stops the walk if the stored tree already loops.
        let creates_cycle: bool = sqlx::query_scalar(
            r#"WITH RECURSIVE chain(id) AS (
                   SELECT $1::BIGINT
                   UNION
                   SELECT c.parent_id FROM category c
                   JOIN chain ON c.id = chain.id
                   WHERE c.owner_id = $2 AND c.parent_id IS NOT NULL
               )
               SELECT EXISTS(SELECT 1 FROM chain WHERE id = $3)"#,
        )
        .bind(parent_id)
        .bind(owner_id)
        .bind(category_id)
        .fetch_one(&self.pool)
        .await?;
        if creates_cycle {
            return Err(Error::InvalidInput(format!(
                "Category {} cannot be moved under its descendant {}",
                category_id, parent_id
            )));
        }
        Ok(())
    }

    async fn fetch(
        &self,
        id: i64,
        owner_id: i64,
        relations: &[CategoryRelation],
    ) -> Result<Option<Category>> {
        let row = sqlx::query(&format!(
            "{} WHERE c.id = $1 AND c.owner_id = $2",
            CATEGORY_SELECT
        ))
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(|r| category_from_row(r, relations)))
    }
}

#[async_trait]
impl CategoryRepository for PgCategoryRepository {
    async fn get(
        &self,
        id: i64,
        owner_id: i64,
        relations: &[CategoryRelation],
    ) -> Result<Option<Category>> {
        self.fetch(id, owner_id, relations).await
    }

    async fn list(
        &self,
        owner_id: i64,
        req: &ListCategoriesRequest,
        relations: &[CategoryRelation],
    ) -> Result<Vec<Category>> {
        let mut sql = format!("{} WHERE c.owner_id = $1", CATEGORY_SELECT);

        match req.order_by {
            Some(order) => {
                let direction = req.order_direction.unwrap_or_default();
                sql.push_str(&format!(
                    " ORDER BY c.{} {}, c.id {}",
                    order.column(),
                    direction.as_sql(),
                    direction.as_sql()
                ));
            }
            None => sql.push_str(" ORDER BY c.id ASC"),
        }

        let mut param_idx = 2;
        if req.limit.is_some() {
            sql.push_str(&format!(" LIMIT ${}", param_idx));
            param_idx += 1;
        }
        let offset = req.offset()?;
        if offset.is_some() {
            sql.push_str(&format!(" OFFSET ${}", param_idx));
        }

        let mut query = sqlx::query(&sql).bind(owner_id);
        if let Some(limit) = req.limit {
            query = query.bind(limit);
        }
        if let Some(offset) = offset {
            query = query.bind(offset);
        }

        let rows = query.fetch_all(&self.pool).await?;
        debug!(
            subsystem = "database",
            component = "categories",
            op = "list",
            owner_id,
            result_count = rows.len(),
            "Listed categories"
        );
        Ok(rows
            .iter()
            .map(|r| category_from_row(r, relations))
            .collect())
    }

    async fn create(&self, req: CreateCategoryRequest) -> Result<Category> {
        self.check_parent(req.owner_id, None, req.parent_id).await?;

        let id: i64 = sqlx::query_scalar(
            r#"INSERT INTO category
               (name, slug, description, icon, color, parent_id, archived, public, initial, owner_id)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
               RETURNING id"#,
        )
        .bind(&req.name)
        .bind(&req.slug)
        .bind(&req.description)
        .bind(&req.icon)
        .bind(&req.color)
        .bind(req.parent_id)
        .bind(req.archived)
        .bind(req.public)
        .bind(req.initial)
        .bind(req.owner_id)
        .fetch_one(&self.pool)
        .await?;

        self.fetch(id, req.owner_id, CategoryRelation::ALL)
            .await?
            .ok_or_else(|| Error::Internal(format!("Category {} vanished after insert", id)))
    }

    async fn update(
        &self,
        id: i64,
        owner_id: i64,
        req: UpdateCategoryRequest,
    ) -> Result<Category> {
        self.check_parent(owner_id, Some(id), req.parent_id).await?;

        let result = sqlx::query(
            r#"UPDATE category
               SET name = $1, slug = $2, description = $3, icon = $4, color = $5,
                   parent_id = $6, archived = $7, public = $8, updated = NOW()
               WHERE id = $9 AND owner_id = $10"#,
        )
        .bind(&req.name)
        .bind(&req.slug)
        .bind(&req.description)
        .bind(&req.icon)
        .bind(&req.color)
        .bind(req.parent_id)
        .bind(req.archived)
        .bind(req.public)
        .bind(id)
        .bind(owner_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Category {}", id)));
        }

        self.fetch(id, owner_id, CategoryRelation::ALL)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Category {}", id)))
    }

    async fn delete(&self, id: i64, owner_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM category WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count(&self, owner_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM category WHERE owner_id = $1")
            .bind(owner_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn category_from_row(row: &sqlx::postgres::PgRow, relations: &[CategoryRelation]) -> Category {
    let owner_id: i64 = row.get("owner_id");
    let parent_id: Option<i64> = row.get("parent_id");

    let owner = relations
        .contains(&CategoryRelation::Owner)
        .then(|| UserSummary {
            id: owner_id,
            username: row.get("owner_username"),
        });

    let parent = if relations.contains(&CategoryRelation::Parent) {
        match (parent_id, row.get::<Option<String>, _>("parent_name")) {
            (Some(id), Some(name)) => Some(CategorySummary {
                id,
                name,
                slug: row.get("parent_slug"),
                icon: row.get("parent_icon"),
                color: row.get("parent_color"),
            }),
            _ => None,
        }
    } else {
        None
    };

    Category {
        id: row.get("id"),
        name: row.get("name"),
        slug: row.get("slug"),
        description: row.get("description"),
        icon: row.get("icon"),
        color: row.get("color"),
        parent_id,
        archived: row.get("archived"),
        public: row.get("public"),
        initial: row.get("initial"),
        owner_id,
        created: row.get("created"),
        updated: row.get("updated"),
        owner,
        parent,
    }
}
