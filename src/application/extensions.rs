//! Extension-point capabilities consumed by the pipeline.
//!
//! Manipulators run pre-commit and can veto a write by returning warnings;
//! listeners run post-commit, are best-effort, and cannot abort. The
//! permission gate and attachment store stand in for subsystems the
//! embedding host owns.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::Serialize;

use crate::domain::comments::CommentRecord;
use crate::domain::posts::PostSnapshot;
use crate::domain::warnings::Warning;

/// Capability names checked through [`PermissionGate`].
pub const CAP_VIEW: &str = "view";
pub const CAP_ADMIN: &str = "admin";

/// Post fields as presented to validators. Validators see values, never
/// the entity, so they cannot mutate a submission.
#[derive(Debug, Clone, Serialize)]
pub struct PostFields {
    pub title: String,
    pub body: String,
    pub author: String,
    pub version_comment: String,
    pub version_author: String,
    pub categories: String,
    pub category_list: BTreeSet<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentFields {
    pub comment: String,
    pub author: String,
}

/// Pre-commit content validator. A non-empty return vetoes the write;
/// `version` is the entity's version before the save (0 for a new post).
#[async_trait]
pub trait BlogManipulator: Send + Sync {
    async fn validate_post(
        &self,
        actor: &str,
        post_name: &str,
        version: i64,
        fields: &PostFields,
    ) -> Vec<Warning>;

    async fn validate_comment(
        &self,
        actor: &str,
        post_name: &str,
        fields: &CommentFields,
    ) -> Vec<Warning>;
}

pub type ListenerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Post-commit change observer. Invocations are isolated by the pipeline:
/// a failing listener is logged and the remaining listeners still run.
///
/// Deletion callbacks carry the pre-delete field snapshot so observers can
/// see what was removed without re-querying a row that no longer exists.
/// `version == 0` / `number == 0` mean "all versions" / "all comments".
#[async_trait]
pub trait BlogChangeListener: Send + Sync {
    async fn post_changed(&self, post_name: &str, version: i64) -> ListenerResult;

    async fn post_deleted(
        &self,
        post_name: &str,
        version: i64,
        fields: &PostSnapshot,
    ) -> ListenerResult;

    async fn comment_added(&self, post_name: &str, number: i64) -> ListenerResult;

    async fn comment_deleted(
        &self,
        post_name: &str,
        number: i64,
        fields: Option<&CommentRecord>,
    ) -> ListenerResult;
}

/// Host permission predicate: is `capability` granted to `actor` on the
/// post named `post_name`?
pub trait PermissionGate: Send + Sync {
    fn allows(&self, actor: &str, capability: &str, post_name: &str) -> bool;
}

/// A caller identity paired with the gate that answers for it.
#[derive(Clone, Copy)]
pub struct Viewer<'a> {
    pub actor: &'a str,
    pub gate: &'a dyn PermissionGate,
}

impl Viewer<'_> {
    pub fn can_view(&self, post_name: &str) -> bool {
        self.gate.allows(self.actor, CAP_VIEW, post_name)
    }
}

/// Host attachment subsystem, reduced to the one capability the cascade
/// delete needs.
#[async_trait]
pub trait AttachmentStore: Send + Sync {
    async fn delete_all(&self, post_name: &str) -> Result<(), crate::application::repos::RepoError>;
}

/// Attachment store for hosts without attachments.
pub struct NoopAttachmentStore;

#[async_trait]
impl AttachmentStore for NoopAttachmentStore {
    async fn delete_all(
        &self,
        _post_name: &str,
    ) -> Result<(), crate::application::repos::RepoError> {
        Ok(())
    }
}
