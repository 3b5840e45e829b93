//! Comment table adapter.

use async_trait::async_trait;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use super::{datetime_from_unix, map_sqlx_error};
use crate::application::repos::{CommentFilter, CommentsRepo, RepoError};
use crate::domain::comments::CommentRecord;

pub(crate) struct SqliteCommentsRepo {
    pool: SqlitePool,
}

impl SqliteCommentsRepo {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct CommentRow {
    name: String,
    number: i64,
    comment: String,
    author: String,
    time: i64,
}

impl CommentRow {
    fn into_record(self) -> Result<CommentRecord, RepoError> {
        Ok(CommentRecord {
            post_name: self.name,
            number: self.number,
            comment: self.comment,
            author: self.author,
            time: datetime_from_unix(self.time)?,
        })
    }
}

#[async_trait]
impl CommentsRepo for SqliteCommentsRepo {
    async fn find_comments(&self, filter: &CommentFilter) -> Result<Vec<CommentRecord>, RepoError> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT name, number, comment, author, time FROM blog_comments WHERE 1 = 1",
        );
        if let Some(post_name) = &filter.post_name {
            builder.push(" AND name = ").push_bind(post_name.clone());
        }
        if let Some(from) = filter.from {
            builder.push(" AND time > ").push_bind(from.unix_timestamp());
        }
        if let Some(to) = filter.to {
            builder.push(" AND time < ").push_bind(to.unix_timestamp());
        }
        debug!(sql = builder.sql(), "listing blog comments");
        let rows: Vec<CommentRow> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        rows.into_iter().map(CommentRow::into_record).collect()
    }

    async fn search_comments(&self, terms: &[String]) -> Result<Vec<CommentRecord>, RepoError> {
        if terms.is_empty() {
            return Err(RepoError::invalid_input(
                "free text search needs at least one term",
            ));
        }
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT name, number, comment, author, time FROM blog_comments WHERE ",
        );
        let mut first = true;
        for term in terms {
            let pattern = format!("%{}%", term.to_lowercase());
            for column in ["comment", "author"] {
                if !first {
                    builder.push(" OR ");
                }
                first = false;
                builder
                    .push(format_args!("LOWER({column}) LIKE "))
                    .push_bind(pattern.clone());
            }
        }
        builder.push(" ORDER BY time DESC");
        let rows: Vec<CommentRow> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        rows.into_iter().map(CommentRow::into_record).collect()
    }

    async fn max_comment_number(&self, post_name: &str) -> Result<Option<i64>, RepoError> {
        sqlx::query_scalar("SELECT MAX(number) FROM blog_comments WHERE name = ?1")
            .bind(post_name)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }

    async fn fetch_comment(
        &self,
        post_name: &str,
        number: i64,
    ) -> Result<Option<CommentRecord>, RepoError> {
        let row: Option<CommentRow> = sqlx::query_as(
            "SELECT name, number, comment, author, time FROM blog_comments \
             WHERE name = ?1 AND number = ?2",
        )
        .bind(post_name)
        .bind(number)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        row.map(CommentRow::into_record).transpose()
    }

    async fn insert_comment(&self, record: &CommentRecord) -> Result<(), RepoError> {
        sqlx::query(
            "INSERT INTO blog_comments (name, number, comment, author, time) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&record.post_name)
        .bind(record.number)
        .bind(&record.comment)
        .bind(&record.author)
        .bind(record.time.unix_timestamp())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn delete_comment(&self, post_name: &str, number: i64) -> Result<u64, RepoError> {
        let result = sqlx::query("DELETE FROM blog_comments WHERE name = ?1 AND number = ?2")
            .bind(post_name)
            .bind(number)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }

    async fn delete_comments_for_post(&self, post_name: &str) -> Result<u64, RepoError> {
        let result = sqlx::query("DELETE FROM blog_comments WHERE name = ?1")
            .bind(post_name)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }
}
