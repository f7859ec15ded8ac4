//! User repository implementation.

use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};
use sqlx::{Pool, Postgres, Row};

use markbox_core::{Error, Result, User, UserRepository, UserSettings, UserSettingsPatch};

/// PostgreSQL implementation of UserRepository.
#[derive(Clone)]
pub struct PgUserRepository {
    pool: Pool<Postgres>,
}

impl PgUserRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

/// Settings keys written by a patch.
pub fn settings_patch_json(patch: &UserSettingsPatch) -> JsonValue {
    let mut map = Map::new();
    if let Some(theme) = &patch.theme {
        map.insert("theme".to_string(), JsonValue::String(theme.clone()));
    }
    JsonValue::Object(map)
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn get(&self, id: i64) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT id, username, email, name, settings, created, updated
             FROM app_user WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn ensure(&self, id: i64, username: &str, email: Option<&str>) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO app_user (id, username, email) VALUES ($1, $2, $3)
               ON CONFLICT (id) DO UPDATE SET username = EXCLUDED.username,
                                              email = EXCLUDED.email,
                                              updated = NOW()"#,
        )
        .bind(id)
        .bind(username)
        .bind(email)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_settings(&self, id: i64, patch: UserSettingsPatch) -> Result<User> {
        let row = sqlx::query(
            r#"UPDATE app_user
               SET settings = COALESCE(settings, '{}'::jsonb) || $2, updated = NOW()
               WHERE id = $1
               RETURNING id, username, email, name, settings, created, updated"#,
        )
        .bind(id)
        .bind(settings_patch_json(&patch))
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => user_from_row(&row),
            None => Err(Error::NotFound(format!("User {}", id))),
        }
    }
}

fn user_from_row(row: &sqlx::postgres::PgRow) -> Result<User> {
    let settings: JsonValue = row.get("settings");
    let settings: UserSettings = serde_json::from_value(settings)?;
    Ok(User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        name: row.get("name"),
        settings,
        created: row.get("created"),
        updated: row.get("updated"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_patch_only_sets_given_keys() {
        let patch = UserSettingsPatch {
            theme: Some("dark".to_string()),
        };
        assert_eq!(settings_patch_json(&patch), serde_json::json!({ "theme": "dark" }));
        assert_eq!(
            settings_patch_json(&UserSettingsPatch::default()),
            serde_json::json!({})
        );
    }
}
