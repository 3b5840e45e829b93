//! Tag-system adapter exposing post categories as resource tags.
//!
//! Category tokens and tags are the same thing seen from two sides. Reads
//! use the store's substring prefilter and re-check exact token membership;
//! writes go through the entity save directly, since a tag edit is a
//! bookkeeping change, not a content submission.

use std::collections::BTreeSet;

use crate::application::posts::BlogPost;
use crate::application::repos::{Backend, RepoError};
use crate::domain::posts::category_set;
use crate::domain::warnings::Warning;

pub struct BlogTagProvider {
    backend: Backend,
}

impl BlogTagProvider {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }

    /// Posts carrying at least one of `tags` (every tagged post when `tags`
    /// is empty), with their full tag sets. Ordered by post name.
    pub async fn tagged_posts(
        &self,
        tags: &[String],
    ) -> Result<Vec<(String, BTreeSet<String>)>, RepoError> {
        let rows = self.backend.posts.list_tagged(tags).await?;
        let mut matches = Vec::new();
        for (name, categories) in rows {
            let post_tags = category_set(&categories);
            if tags.is_empty() || tags.iter().any(|tag| post_tags.contains(tag)) {
                matches.push((name, post_tags));
            }
        }
        Ok(matches)
    }

    /// Tag set of the current version of `post_name`; empty when the post
    /// does not exist.
    pub async fn resource_tags(&self, post_name: &str) -> Result<BTreeSet<String>, RepoError> {
        Ok(self
            .backend
            .posts
            .fetch_fields(post_name, 0)
            .await?
            .map(|fields| fields.category_list)
            .unwrap_or_default())
    }

    /// Replaces the tag set of `post_name` by saving a new version with the
    /// rewritten categories field. Warnings mean the post could not be
    /// saved (typically: it does not exist) and nothing was written.
    pub async fn set_resource_tags(
        &self,
        actor: &str,
        post_name: &str,
        tags: &BTreeSet<String>,
    ) -> Result<Vec<Warning>, RepoError> {
        let mut post = BlogPost::load(self.backend.clone(), post_name, 0).await?;
        let categories = tags.iter().cloned().collect::<Vec<_>>().join(" ");
        post.categories = categories.clone();
        post.category_list = category_set(&categories);
        post.save(
            actor,
            "Blog post categories changed via tag provider.",
            false,
        )
        .await
    }

    pub async fn clear_resource_tags(
        &self,
        actor: &str,
        post_name: &str,
    ) -> Result<Vec<Warning>, RepoError> {
        self.set_resource_tags(actor, post_name, &BTreeSet::new())
            .await
    }
}
