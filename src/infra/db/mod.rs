//! SQLite persistence adapters.
//!
//! Storage layout, three tables:
//!   blog_posts     (name, version) primary key, one row per stored version
//!   blog_comments  (name, number) primary key
//!   blog_settings  plain key/value, also holds the schema version
//! All timestamps are stored as whole unix epoch seconds.

mod comments;
mod posts;
mod settings;

use std::sync::Arc;

use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use time::OffsetDateTime;
use tracing::{debug, info};

use self::comments::SqliteCommentsRepo;
use self::posts::SqlitePostsRepo;
use self::settings::SqliteSettingsRepo;
use crate::application::extensions::AttachmentStore;
use crate::application::repos::{Backend, RepoError};

const SCHEMA_VERSION: i64 = 2;
const SCHEMA_VERSION_KEY: &str = "database_version";

/// Owns the connection pool and hands out the repository adapters.
pub struct SqliteRepositories {
    pool: SqlitePool,
}

impl SqliteRepositories {
    /// Connects to `url` and brings the schema up to date.
    pub async fn connect(url: &str) -> Result<Self, RepoError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .map_err(map_sqlx_error)?;
        let repos = Self { pool };
        repos.ensure_schema().await?;
        Ok(repos)
    }

    /// In-memory database on a single connection, for tests. More than one
    /// connection would each see their own empty database.
    pub async fn connect_in_memory() -> Result<Self, RepoError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(map_sqlx_error)?;
        let repos = Self { pool };
        repos.ensure_schema().await?;
        Ok(repos)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Wires the adapter bundle for entities and the pipeline.
    pub fn backend(&self, attachments: Arc<dyn AttachmentStore>) -> Backend {
        Backend::new(
            Arc::new(SqlitePostsRepo::new(self.pool.clone())),
            Arc::new(SqliteCommentsRepo::new(self.pool.clone())),
            Arc::new(SqliteSettingsRepo::new(self.pool.clone())),
            attachments,
        )
    }

    /// Creates or upgrades the schema, stepping through one version at a
    /// time so old databases pick up later additions.
    async fn ensure_schema(&self) -> Result<(), RepoError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS blog_settings (
                name TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let stored: Option<String> =
            sqlx::query_scalar("SELECT value FROM blog_settings WHERE name = ?1")
                .bind(SCHEMA_VERSION_KEY)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
        let mut current = stored.and_then(|value| value.parse::<i64>().ok()).unwrap_or(0);
        if current == SCHEMA_VERSION {
            return Ok(());
        }
        debug!(from = current, to = SCHEMA_VERSION, "upgrading blog schema");
        while current < SCHEMA_VERSION {
            current = match current {
                0 => self.create_schema().await?,
                1 => self.add_time_indexes().await?,
                other => {
                    return Err(RepoError::Integrity {
                        message: format!("unknown blog schema version {other}"),
                    });
                }
            };
        }
        sqlx::query(
            "INSERT INTO blog_settings (name, value) VALUES (?1, ?2)
             ON CONFLICT(name) DO UPDATE SET value = excluded.value",
        )
        .bind(SCHEMA_VERSION_KEY)
        .bind(SCHEMA_VERSION.to_string())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        info!(version = SCHEMA_VERSION, "blog schema ready");
        Ok(())
    }

    async fn create_schema(&self) -> Result<i64, RepoError> {
        sqlx::query(
            "CREATE TABLE blog_posts (
                name TEXT NOT NULL,
                version INTEGER NOT NULL,
                title TEXT NOT NULL,
                body TEXT NOT NULL,
                publish_time INTEGER NOT NULL,
                version_time INTEGER NOT NULL,
                version_comment TEXT NOT NULL,
                version_author TEXT NOT NULL,
                author TEXT NOT NULL,
                categories TEXT NOT NULL,
                PRIMARY KEY (name, version)
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        sqlx::query(
            "CREATE TABLE blog_comments (
                name TEXT NOT NULL,
                number INTEGER NOT NULL,
                comment TEXT NOT NULL,
                author TEXT NOT NULL,
                time INTEGER NOT NULL,
                PRIMARY KEY (name, number)
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        self.add_time_indexes().await?;
        sqlx::query("INSERT OR IGNORE INTO blog_settings (name, value) VALUES ('infotext', '')")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(SCHEMA_VERSION)
    }

    async fn add_time_indexes(&self) -> Result<i64, RepoError> {
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_blog_posts_version_time
             ON blog_posts (version_time)",
        )
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_blog_comments_time ON blog_comments (time)")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(2)
    }
}

/// Translates driver errors into the repository error vocabulary. SQLite
/// reports constraint violations only through the message text.
pub(crate) fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    match err {
        sqlx::Error::RowNotFound => RepoError::NotFound,
        sqlx::Error::PoolTimedOut => RepoError::Timeout,
        sqlx::Error::Database(db) => {
            let message = db.message().to_string();
            if let Some(constraint) = message.strip_prefix("UNIQUE constraint failed: ") {
                RepoError::Duplicate {
                    constraint: constraint.to_string(),
                }
            } else if message.contains("FOREIGN KEY constraint failed") {
                RepoError::Integrity { message }
            } else {
                RepoError::Persistence(message)
            }
        }
        other => RepoError::Persistence(other.to_string()),
    }
}

pub(crate) fn datetime_from_unix(secs: i64) -> Result<OffsetDateTime, RepoError> {
    OffsetDateTime::from_unix_timestamp(secs).map_err(|err| RepoError::Integrity {
        message: format!("stored timestamp {secs} out of range: {err}"),
    })
}
