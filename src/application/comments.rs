//! The comment entity: one numbered comment attached to a post.

use time::OffsetDateTime;
use tracing::debug;

use crate::application::repos::{Backend, RepoError};
use crate::domain::comments::CommentRecord;
use crate::domain::warnings::Warning;

/// A blog comment. `number == 0` means the entity is not stored yet;
/// `create` assigns the next free number on its post.
pub struct BlogComment {
    backend: Backend,
    pub post_name: String,
    pub number: i64,
    pub comment: String,
    pub author: String,
    pub time: OffsetDateTime,
}

impl BlogComment {
    /// A fresh, unstored comment on `post_name`.
    pub fn new(backend: Backend, post_name: &str) -> Self {
        Self {
            backend,
            post_name: post_name.trim().to_string(),
            number: 0,
            comment: String::new(),
            author: String::new(),
            time: OffsetDateTime::now_utc(),
        }
    }

    /// Loads comment `number` on `post_name`. When the comment does not
    /// exist the entity stays unstored (`number == 0`).
    pub async fn load(backend: Backend, post_name: &str, number: i64) -> Result<Self, RepoError> {
        let mut entity = Self::new(backend, post_name);
        if let Some(record) = entity
            .backend
            .comments
            .fetch_comment(&entity.post_name, number)
            .await?
        {
            entity.apply(record);
        }
        Ok(entity)
    }

    pub(crate) fn from_record(backend: Backend, record: CommentRecord) -> Self {
        let mut entity = Self::new(backend, &record.post_name);
        entity.apply(record);
        entity
    }

    pub fn exists(&self) -> bool {
        self.number > 0
    }

    /// The entity's fields as a plain record, usable after the row is gone.
    pub fn snapshot(&self) -> CommentRecord {
        CommentRecord {
            post_name: self.post_name.clone(),
            number: self.number,
            comment: self.comment.clone(),
            author: self.author.clone(),
            time: self.time,
        }
    }

    /// Stores the comment under the next free number on its post. Field
    /// checks run first; any warning (or `verify_only`) returns without
    /// writing. `comment` and `author` override the entity's fields when
    /// given.
    ///
    /// Numbers are assigned as max(existing) + 1 and are never reused, so
    /// deleting comment 2 of 3 still numbers the next one 4. A post with no
    /// comments and no versions does not exist and cannot be commented.
    pub async fn create(
        &mut self,
        comment: Option<&str>,
        author: Option<&str>,
        verify_only: bool,
    ) -> Result<Vec<Warning>, RepoError> {
        if let Some(comment) = comment {
            self.comment = comment.to_string();
        }
        if let Some(author) = author {
            self.author = author.to_string();
        }
        let mut warnings = Vec::new();
        if self.comment.is_empty() {
            warnings.push(Warning::field("comment", "Comment is empty."));
        }
        if self.author.is_empty() {
            warnings.push(Warning::field("author", "No comment author."));
        }
        if self.post_name.is_empty() {
            warnings.push(Warning::field(
                "post_name",
                "The comment is not attached to a blog post",
            ));
        }
        if self.number != 0 {
            warnings.push(Warning::field("number", "Comment seems to already exist?"));
        }
        let number = match self.next_number().await? {
            Some(number) => number,
            None => {
                warnings.push(Warning::general(format!(
                    "Post '{}' does not exist.",
                    self.post_name
                )));
                0
            }
        };
        if !warnings.is_empty() || verify_only {
            return Ok(warnings);
        }

        debug!(post = %self.post_name, number, "storing new blog comment");
        let record = CommentRecord {
            post_name: self.post_name.clone(),
            number,
            comment: self.comment.clone(),
            author: self.author.clone(),
            time: self.time,
        };
        self.backend.comments.insert_comment(&record).await?;
        if let Some(stored) = self
            .backend
            .comments
            .fetch_comment(&self.post_name, number)
            .await?
        {
            self.apply(stored);
        }
        Ok(warnings)
    }

    /// Removes the stored comment row. Unstored entities return `false`.
    pub async fn delete(&mut self) -> Result<bool, RepoError> {
        if self.post_name.is_empty() || self.number == 0 {
            return Ok(false);
        }
        let removed = self
            .backend
            .comments
            .delete_comment(&self.post_name, self.number)
            .await?;
        debug!(post = %self.post_name, number = self.number, removed, "deleted blog comment");
        Ok(removed > 0)
    }

    /// The number the next comment on this post gets, or `None` when the
    /// post does not exist at all.
    async fn next_number(&self) -> Result<Option<i64>, RepoError> {
        if let Some(max) = self
            .backend
            .comments
            .max_comment_number(&self.post_name)
            .await?
        {
            return Ok(Some(max + 1));
        }
        let versions = self.backend.posts.get_versions(&self.post_name).await?;
        Ok(if versions.is_empty() { None } else { Some(1) })
    }

    fn apply(&mut self, record: CommentRecord) {
        self.post_name = record.post_name;
        self.number = record.number;
        self.comment = record.comment;
        self.author = record.author;
        self.time = record.time;
    }
}
