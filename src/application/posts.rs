//! The post entity: one logical blog post across its version history.

use std::collections::BTreeSet;

use time::{Duration, OffsetDateTime};
use tracing::debug;

use crate::application::comments::BlogComment;
use crate::application::extensions::PostFields;
use crate::application::repos::{Backend, CommentFilter, NewPostVersion, RepoError};
use crate::domain::posts::{PostSnapshot, PostUpdate, category_set};
use crate::domain::warnings::Warning;

/// A blog post reconstructed from the store. Freshly constructed entities
/// whose `name` has no stored versions are "unloaded": `exists()` is false
/// and all fields hold defaults. A successful `save` re-loads the entity
/// at the version it just wrote.
pub struct BlogPost {
    backend: Backend,
    pub name: String,
    pub version: i64,
    pub title: String,
    pub body: String,
    pub author: String,
    pub version_author: String,
    pub version_comment: String,
    pub categories: String,
    pub category_list: BTreeSet<String>,
    pub publish_time: OffsetDateTime,
    pub version_time: OffsetDateTime,
    pub versions: Vec<i64>,
}

impl BlogPost {
    /// Constructs the entity for `name` and loads the requested version
    /// (`version == 0` means the current one). A name with no stored
    /// versions yields an unloaded entity, not an error.
    pub async fn load(backend: Backend, name: &str, version: i64) -> Result<Self, RepoError> {
        let now = OffsetDateTime::now_utc();
        let mut post = Self {
            backend,
            name: name.trim().to_string(),
            version: 0,
            title: String::new(),
            body: String::new(),
            author: String::new(),
            version_author: String::new(),
            version_comment: String::new(),
            categories: String::new(),
            category_list: BTreeSet::new(),
            publish_time: now,
            version_time: now,
            versions: Vec::new(),
        };
        post.reload(version).await?;
        Ok(post)
    }

    pub fn exists(&self) -> bool {
        !self.versions.is_empty()
    }

    /// Saves the entity as a new version. Basic field checks run first;
    /// any warning (or `verify_only`) returns without touching the store.
    /// On success the entity is re-loaded at the new current version.
    ///
    /// Version numbers are assigned as max(existing) + 1. Two concurrent
    /// writers can compute the same number; the store's `(name, version)`
    /// primary key then fails the loser with [`RepoError::Duplicate`].
    pub async fn save(
        &mut self,
        version_author: &str,
        version_comment: &str,
        verify_only: bool,
    ) -> Result<Vec<Warning>, RepoError> {
        let mut warnings = Vec::new();
        if version_author.is_empty() {
            warnings.push(Warning::field("version_author", "Version author missing"));
        }
        for (field, value) in [
            ("name", &self.name),
            ("title", &self.title),
            ("body", &self.body),
            ("author", &self.author),
        ] {
            if value.is_empty() {
                warnings.push(Warning::empty_field(field));
            }
        }
        if !warnings.is_empty() || verify_only {
            return Ok(warnings);
        }

        self.versions = self.backend.posts.get_versions(&self.name).await?;
        let version = self.versions.last().copied().unwrap_or(0) + 1;
        let mut version_time = OffsetDateTime::now_utc();
        // The wire format stores whole epoch seconds; keep the per-name
        // version_time sequence strictly increasing regardless.
        if self.exists() && version_time.unix_timestamp() <= self.version_time.unix_timestamp() {
            version_time = self.version_time + Duration::seconds(1);
        }
        debug!(
            post = %self.name,
            version,
            author = version_author,
            "saving new blog post version"
        );
        let row = NewPostVersion {
            name: self.name.clone(),
            version,
            title: self.title.clone(),
            body: self.body.clone(),
            publish_time: self.publish_time,
            version_time,
            version_comment: version_comment.to_string(),
            version_author: version_author.to_string(),
            author: self.author.clone(),
            categories: self.categories.clone(),
        };
        self.backend.posts.insert_version(&row).await?;
        self.reload(version).await?;
        Ok(warnings)
    }

    /// Applies a partial update in memory, without writing. Returns whether
    /// any field actually changed, so callers can skip a no-op save.
    pub fn update_fields(&mut self, update: &PostUpdate) -> bool {
        let mut changed = false;
        if let Some(title) = &update.title
            && *title != self.title
        {
            self.title = title.clone();
            changed = true;
        }
        if let Some(body) = &update.body
            && *body != self.body
        {
            self.body = body.clone();
            changed = true;
        }
        if let Some(author) = &update.author
            && *author != self.author
        {
            self.author = author.clone();
            changed = true;
        }
        if let Some(categories) = &update.categories
            && *categories != self.categories
        {
            self.categories = categories.clone();
            self.category_list = category_set(categories);
            changed = true;
        }
        if let Some(publish_time) = update.publish_time
            && publish_time != self.publish_time
        {
            self.publish_time = publish_time;
            changed = true;
        }
        changed
    }

    /// Deletes one version (`version > 0`) or every version (`version ==
    /// 0`). Once no versions remain the post's comments and attachments
    /// are removed as well; the cascade never fires while versions are
    /// left. Returns whether any row was removed.
    pub async fn delete(&mut self, version: i64) -> Result<bool, RepoError> {
        let removed = if version > 0 {
            self.backend.posts.delete_version(&self.name, version).await?
        } else {
            self.backend.posts.delete_all_versions(&self.name).await?
        };
        debug!(post = %self.name, version, removed, "deleted blog post rows");
        self.versions = self.backend.posts.get_versions(&self.name).await?;
        if self.versions.is_empty() {
            self.backend
                .comments
                .delete_comments_for_post(&self.name)
                .await?;
            self.backend.attachments.delete_all(&self.name).await?;
        }
        Ok(removed > 0)
    }

    /// Refreshes and returns the stored version numbers, ascending.
    pub async fn get_versions(&mut self) -> Result<Vec<i64>, RepoError> {
        self.versions = self.backend.posts.get_versions(&self.name).await?;
        Ok(self.versions.clone())
    }

    /// Comment entities attached to this post, ordered by number.
    pub async fn get_comments(&self) -> Result<Vec<BlogComment>, RepoError> {
        let filter = CommentFilter {
            post_name: Some(self.name.clone()),
            ..CommentFilter::default()
        };
        let mut records = self.backend.comments.find_comments(&filter).await?;
        records.sort_by_key(|record| record.number);
        Ok(records
            .into_iter()
            .map(|record| BlogComment::from_record(self.backend.clone(), record))
            .collect())
    }

    /// Field snapshot of a stored version without touching the entity's
    /// own state. `None` when the post or version does not exist.
    pub async fn fetch_fields(&self, version: i64) -> Result<Option<PostSnapshot>, RepoError> {
        self.backend.posts.fetch_fields(&self.name, version).await
    }

    /// The entity's fields as presented to pre-commit validators.
    pub fn validation_fields(&self, version_author: &str, version_comment: &str) -> PostFields {
        PostFields {
            title: self.title.clone(),
            body: self.body.clone(),
            author: self.author.clone(),
            version_comment: version_comment.to_string(),
            version_author: version_author.to_string(),
            categories: self.categories.clone(),
            category_list: self.category_list.clone(),
        }
    }

    async fn reload(&mut self, version: i64) -> Result<bool, RepoError> {
        self.versions = self.backend.posts.get_versions(&self.name).await?;
        let Some(snapshot) = self.backend.posts.fetch_fields(&self.name, version).await? else {
            return Ok(false);
        };
        self.version = snapshot.version;
        self.title = snapshot.title;
        self.body = snapshot.body;
        self.author = snapshot.author;
        self.version_author = snapshot.version_author;
        self.version_comment = snapshot.version_comment;
        self.categories = snapshot.categories;
        self.category_list = snapshot.category_list;
        self.publish_time = snapshot.publish_time;
        self.version_time = snapshot.version_time;
        Ok(true)
    }
}
