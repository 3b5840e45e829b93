//! Repository traits describing persistence adapters, plus the `Backend`
//! bundle entities and services are wired with.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

use crate::application::extensions::AttachmentStore;
use crate::domain::comments::CommentRecord;
use crate::domain::posts::{PostListing, PostSearchHit, PostSnapshot};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }
}

/// Selection criteria for post listings. Empty criteria do not restrict
/// the result. Time bounds are strict (`> from`, `< to`) and apply to the
/// publish time, or to the version time when `all_versions` is set.
#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    pub category: Option<String>,
    pub author: Option<String>,
    pub from: Option<OffsetDateTime>,
    pub to: Option<OffsetDateTime>,
    pub all_versions: bool,
}

/// Fixed-size listing window: rows `[number*size, number*size + size)` of
/// the ordered result.
#[derive(Debug, Clone, Copy)]
pub struct PageWindow {
    pub size: u32,
    pub number: u32,
}

#[derive(Debug, Clone, Default)]
pub struct CommentFilter {
    pub post_name: Option<String>,
    pub from: Option<OffsetDateTime>,
    pub to: Option<OffsetDateTime>,
}

/// Row handed to the store for one new post version. The store never
/// derives any of these values.
#[derive(Debug, Clone)]
pub struct NewPostVersion {
    pub name: String,
    pub version: i64,
    pub title: String,
    pub body: String,
    pub publish_time: OffsetDateTime,
    pub version_time: OffsetDateTime,
    pub version_comment: String,
    pub version_author: String,
    pub author: String,
    pub categories: String,
}

#[async_trait]
pub trait PostsRepo: Send + Sync {
    /// Filtered listing. Current versions only unless
    /// `filter.all_versions`; newest first by the time field in use.
    async fn find_posts(
        &self,
        filter: &PostFilter,
        window: Option<PageWindow>,
    ) -> Result<Vec<PostListing>, RepoError>;

    /// Names of existing posts (current versions), newest publish first.
    async fn list_post_names(&self) -> Result<Vec<String>, RepoError>;

    /// ANY-term free text search over current versions. An empty term list
    /// is a contract violation and fails fast.
    async fn search_posts(&self, terms: &[String]) -> Result<Vec<PostSearchHit>, RepoError>;

    /// Stored version numbers for `name`, ascending. Empty means the post
    /// does not exist.
    async fn get_versions(&self, name: &str) -> Result<Vec<i64>, RepoError>;

    /// Field snapshot of one version; `version == 0` selects the current
    /// one. `None` when the post or version is absent.
    async fn fetch_fields(
        &self,
        name: &str,
        version: i64,
    ) -> Result<Option<PostSnapshot>, RepoError>;

    async fn insert_version(&self, row: &NewPostVersion) -> Result<(), RepoError>;

    /// Deletes one version row; returns the number of rows removed.
    async fn delete_version(&self, name: &str, version: i64) -> Result<u64, RepoError>;

    /// Deletes every version of `name`; returns the number of rows removed.
    async fn delete_all_versions(&self, name: &str) -> Result<u64, RepoError>;

    /// `(name, categories)` of current versions whose categories field
    /// contains any of `tags` as a substring, or any non-empty categories
    /// field when `tags` is empty. Ordered by name. Callers re-check exact
    /// token membership.
    async fn list_tagged(&self, tags: &[String]) -> Result<Vec<(String, String)>, RepoError>;
}

#[async_trait]
pub trait CommentsRepo: Send + Sync {
    /// Comments matching the filter, in store order.
    async fn find_comments(&self, filter: &CommentFilter) -> Result<Vec<CommentRecord>, RepoError>;

    /// ANY-term free text search over comment text and author.
    async fn search_comments(&self, terms: &[String]) -> Result<Vec<CommentRecord>, RepoError>;

    /// Highest comment number used on `post_name`, or `None` when the post
    /// has no comments yet.
    async fn max_comment_number(&self, post_name: &str) -> Result<Option<i64>, RepoError>;

    async fn fetch_comment(
        &self,
        post_name: &str,
        number: i64,
    ) -> Result<Option<CommentRecord>, RepoError>;

    async fn insert_comment(&self, record: &CommentRecord) -> Result<(), RepoError>;

    async fn delete_comment(&self, post_name: &str, number: i64) -> Result<u64, RepoError>;

    async fn delete_comments_for_post(&self, post_name: &str) -> Result<u64, RepoError>;
}

/// Small key/value store for plugin-level settings (info text, schema
/// version). Absence of a key is not an error.
#[async_trait]
pub trait SettingsRepo: Send + Sync {
    async fn load_value(&self, key: &str) -> Result<Option<String>, RepoError>;
    async fn store_value(&self, key: &str, value: &str) -> Result<(), RepoError>;
}

/// Bundle of the persistence adapters an entity or service needs. Cheap to
/// clone; all members are shared.
#[derive(Clone)]
pub struct Backend {
    pub posts: Arc<dyn PostsRepo>,
    pub comments: Arc<dyn CommentsRepo>,
    pub settings: Arc<dyn SettingsRepo>,
    pub attachments: Arc<dyn AttachmentStore>,
}

impl Backend {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        comments: Arc<dyn CommentsRepo>,
        settings: Arc<dyn SettingsRepo>,
        attachments: Arc<dyn AttachmentStore>,
    ) -> Self {
        Self {
            posts,
            comments,
            settings,
            attachments,
        }
    }
}
