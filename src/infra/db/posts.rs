//! Post table adapter.

use async_trait::async_trait;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use super::{datetime_from_unix, map_sqlx_error};
use crate::application::repos::{NewPostVersion, PageWindow, PostFilter, PostsRepo, RepoError};
use crate::domain::posts::{PostListing, PostSearchHit, PostSnapshot, category_set, parse_categories};

/// Join clause restricting `bp` to each post's highest version.
const CURRENT_VERSIONS_JOIN: &str = " JOIN (SELECT name, MAX(version) AS version \
     FROM blog_posts GROUP BY name) cur \
     ON bp.name = cur.name AND bp.version = cur.version";

pub(crate) struct SqlitePostsRepo {
    pool: SqlitePool,
}

impl SqlitePostsRepo {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct ListingRow {
    name: String,
    version: i64,
    time: i64,
    author: String,
    title: String,
    body: String,
    categories: String,
}

#[derive(FromRow)]
struct SearchRow {
    name: String,
    version: i64,
    publish_time: i64,
    author: String,
    title: String,
    body: String,
}

#[derive(FromRow)]
struct SnapshotRow {
    version: i64,
    title: String,
    body: String,
    publish_time: i64,
    version_time: i64,
    version_comment: String,
    version_author: String,
    author: String,
    categories: String,
}

#[async_trait]
impl PostsRepo for SqlitePostsRepo {
    async fn find_posts(
        &self,
        filter: &PostFilter,
        window: Option<PageWindow>,
    ) -> Result<Vec<PostListing>, RepoError> {
        let time_column = if filter.all_versions {
            "version_time"
        } else {
            "publish_time"
        };
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT bp.name, bp.version, bp.{time_column} AS time, \
             bp.author, bp.title, bp.body, bp.categories FROM blog_posts bp"
        ));
        if !filter.all_versions {
            builder.push(CURRENT_VERSIONS_JOIN);
        }
        builder.push(" WHERE 1 = 1");
        if let Some(category) = &filter.category {
            // Substring prefilter; exact token membership is re-checked on
            // the parsed field below so 'art' does not match 'article'.
            builder
                .push(" AND bp.categories LIKE ")
                .push_bind(format!("%{category}%"));
        }
        if let Some(author) = &filter.author {
            builder.push(" AND bp.author = ").push_bind(author.clone());
        }
        if let Some(from) = filter.from {
            builder
                .push(format_args!(" AND bp.{time_column} > "))
                .push_bind(from.unix_timestamp());
        }
        if let Some(to) = filter.to {
            builder
                .push(format_args!(" AND bp.{time_column} < "))
                .push_bind(to.unix_timestamp());
        }
        builder.push(format_args!(" ORDER BY bp.{time_column} DESC"));
        if let Some(window) = window {
            builder.push(" LIMIT ").push_bind(i64::from(window.size));
            builder
                .push(" OFFSET ")
                .push_bind(i64::from(window.size) * i64::from(window.number));
        }
        debug!(sql = builder.sql(), "listing blog posts");
        let rows: Vec<ListingRow> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        let mut listings = Vec::with_capacity(rows.len());
        for row in rows {
            let categories = parse_categories(&row.categories);
            if let Some(wanted) = &filter.category
                && !categories.iter().any(|category| category == wanted)
            {
                continue;
            }
            listings.push(PostListing {
                name: row.name,
                version: row.version,
                time: datetime_from_unix(row.time)?,
                author: row.author,
                title: row.title,
                body: row.body,
                categories,
            });
        }
        Ok(listings)
    }

    async fn list_post_names(&self) -> Result<Vec<String>, RepoError> {
        sqlx::query_scalar(
            "SELECT name FROM blog_posts GROUP BY name ORDER BY MAX(publish_time) DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)
    }

    async fn search_posts(&self, terms: &[String]) -> Result<Vec<PostSearchHit>, RepoError> {
        if terms.is_empty() {
            return Err(RepoError::invalid_input(
                "free text search needs at least one term",
            ));
        }
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT bp.name, bp.version, bp.publish_time, bp.author, bp.title, bp.body \
             FROM blog_posts bp",
        );
        builder.push(CURRENT_VERSIONS_JOIN);
        builder.push(" WHERE ");
        let mut first = true;
        for term in terms {
            let pattern = format!("%{}%", term.to_lowercase());
            for column in ["name", "title", "body", "author", "categories"] {
                if !first {
                    builder.push(" OR ");
                }
                first = false;
                builder
                    .push(format_args!("LOWER(bp.{column}) LIKE "))
                    .push_bind(pattern.clone());
            }
        }
        builder.push(" ORDER BY bp.publish_time DESC");
        debug!(sql = builder.sql(), "searching blog posts");
        let rows: Vec<SearchRow> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        rows.into_iter()
            .map(|row| {
                Ok(PostSearchHit {
                    name: row.name,
                    version: row.version,
                    publish_time: datetime_from_unix(row.publish_time)?,
                    author: row.author,
                    title: row.title,
                    body: row.body,
                })
            })
            .collect()
    }

    async fn get_versions(&self, name: &str) -> Result<Vec<i64>, RepoError> {
        sqlx::query_scalar("SELECT version FROM blog_posts WHERE name = ?1 ORDER BY version")
            .bind(name)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }

    async fn fetch_fields(
        &self,
        name: &str,
        version: i64,
    ) -> Result<Option<PostSnapshot>, RepoError> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT version, title, body, publish_time, version_time, \
             version_comment, version_author, author, categories \
             FROM blog_posts WHERE name = ",
        );
        builder.push_bind(name);
        if version > 0 {
            builder.push(" AND version = ").push_bind(version);
        }
        builder.push(" ORDER BY version DESC LIMIT 1");
        let row: Option<SnapshotRow> = builder
            .build_query_as()
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(PostSnapshot {
            version: row.version,
            title: row.title,
            body: row.body,
            publish_time: datetime_from_unix(row.publish_time)?,
            version_time: datetime_from_unix(row.version_time)?,
            version_comment: row.version_comment,
            version_author: row.version_author,
            author: row.author,
            category_list: category_set(&row.categories),
            categories: row.categories,
        }))
    }

    async fn insert_version(&self, row: &NewPostVersion) -> Result<(), RepoError> {
        sqlx::query(
            "INSERT INTO blog_posts (name, version, title, body, publish_time, \
             version_time, version_comment, version_author, author, categories) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .bind(&row.name)
        .bind(row.version)
        .bind(&row.title)
        .bind(&row.body)
        .bind(row.publish_time.unix_timestamp())
        .bind(row.version_time.unix_timestamp())
        .bind(&row.version_comment)
        .bind(&row.version_author)
        .bind(&row.author)
        .bind(&row.categories)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn delete_version(&self, name: &str, version: i64) -> Result<u64, RepoError> {
        let result = sqlx::query("DELETE FROM blog_posts WHERE name = ?1 AND version = ?2")
            .bind(name)
            .bind(version)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }

    async fn delete_all_versions(&self, name: &str) -> Result<u64, RepoError> {
        let result = sqlx::query("DELETE FROM blog_posts WHERE name = ?1")
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }

    async fn list_tagged(&self, tags: &[String]) -> Result<Vec<(String, String)>, RepoError> {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT bp.name, bp.categories FROM blog_posts bp");
        builder.push(CURRENT_VERSIONS_JOIN);
        if tags.is_empty() {
            builder.push(" WHERE bp.categories != ''");
        } else {
            builder.push(" WHERE (");
            let mut first = true;
            for tag in tags {
                if !first {
                    builder.push(" OR ");
                }
                first = false;
                builder
                    .push("bp.categories LIKE ")
                    .push_bind(format!("%{tag}%"));
            }
            builder.push(")");
        }
        builder.push(" ORDER BY bp.name");
        let rows: Vec<(String, String)> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(rows)
    }
}
