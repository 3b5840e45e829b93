//! Spam-filter bridge, packaged as a regular manipulator.
//!
//! The actual spam decision lives behind [`SpamCheck`] so hosts can plug in
//! whatever service they run. This adapter's job is assembling the
//! `(old, new)` content pairs a checker wants: unchanged fields are left
//! out so re-saving an old post does not re-test its whole body.

use std::sync::Arc;

use async_trait::async_trait;

use crate::application::extensions::{
    BlogManipulator, CAP_ADMIN, CommentFields, PermissionGate, PostFields,
};
use crate::application::repos::Backend;
use crate::domain::warnings::Warning;

/// Host spam decision over submitted content. `changes` holds `(old, new)`
/// text pairs; a non-empty return vetoes the write.
#[async_trait]
pub trait SpamCheck: Send + Sync {
    async fn test(&self, actor: &str, author: &str, changes: &[(String, String)]) -> Vec<Warning>;
}

pub struct SpamFilterManipulator {
    backend: Backend,
    check: Arc<dyn SpamCheck>,
    gate: Option<Arc<dyn PermissionGate>>,
}

impl SpamFilterManipulator {
    pub fn new(
        backend: Backend,
        check: Arc<dyn SpamCheck>,
        gate: Option<Arc<dyn PermissionGate>>,
    ) -> Self {
        Self {
            backend,
            check,
            gate,
        }
    }

    fn is_admin(&self, actor: &str, post_name: &str) -> bool {
        self.gate
            .as_ref()
            .is_some_and(|gate| gate.allows(actor, CAP_ADMIN, post_name))
    }
}

#[async_trait]
impl BlogManipulator for SpamFilterManipulator {
    async fn validate_post(
        &self,
        actor: &str,
        post_name: &str,
        version: i64,
        fields: &PostFields,
    ) -> Vec<Warning> {
        if self.is_admin(actor, post_name) {
            return Vec::new();
        }
        // `version` is the stored version being superseded; 0 means a new
        // post, diffed against nothing.
        let previous = if version > 0 {
            match self.backend.posts.fetch_fields(post_name, version).await {
                Ok(fields) => fields,
                Err(_) => None,
            }
        } else {
            None
        };
        let (old_title, old_body, old_author, old_categories) = match &previous {
            Some(old) => (
                old.title.clone(),
                old.body.clone(),
                old.author.clone(),
                old.categories.clone(),
            ),
            None => Default::default(),
        };
        let mut changes = Vec::new();
        for (old, new) in [
            (old_title, fields.title.clone()),
            (old_body, fields.body.clone()),
            (old_author, fields.author.clone()),
            (old_categories, fields.categories.clone()),
        ] {
            if !new.is_empty() && old != new {
                changes.push((old, new));
            }
        }
        if changes.is_empty() {
            return Vec::new();
        }
        self.check.test(actor, &fields.author, &changes).await
    }

    async fn validate_comment(
        &self,
        actor: &str,
        post_name: &str,
        fields: &CommentFields,
    ) -> Vec<Warning> {
        if self.is_admin(actor, post_name) {
            return Vec::new();
        }
        let changes = vec![
            (String::new(), fields.comment.clone()),
            (String::new(), fields.author.clone()),
        ];
        self.check.test(actor, &fields.author, &changes).await
    }
}
