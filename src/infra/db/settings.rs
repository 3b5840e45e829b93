//! Key/value settings table adapter.

use async_trait::async_trait;
use sqlx::SqlitePool;

use super::map_sqlx_error;
use crate::application::repos::{RepoError, SettingsRepo};

pub(crate) struct SqliteSettingsRepo {
    pool: SqlitePool,
}

impl SqliteSettingsRepo {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SettingsRepo for SqliteSettingsRepo {
    async fn load_value(&self, key: &str) -> Result<Option<String>, RepoError> {
        sqlx::query_scalar("SELECT value FROM blog_settings WHERE name = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }

    async fn store_value(&self, key: &str, value: &str) -> Result<(), RepoError> {
        sqlx::query(
            "INSERT INTO blog_settings (name, value) VALUES (?1, ?2) \
             ON CONFLICT(name) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }
}
