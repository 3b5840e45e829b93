#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use brezza::application::extensions::{
    AttachmentStore, BlogChangeListener, BlogManipulator, CommentFields, ListenerResult,
    NoopAttachmentStore, PermissionGate, PostFields,
};
use brezza::application::pipeline::BlogCore;
use brezza::application::repos::{Backend, RepoError};
use brezza::config::BlogConfig;
use brezza::domain::comments::CommentRecord;
use brezza::domain::posts::{PostSnapshot, PostUpdate};
use brezza::domain::warnings::Warning;
use brezza::infra::db::SqliteRepositories;
use time::OffsetDateTime;

/// Wires the fmt subscriber once so RUST_LOG works under `cargo test`.
fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .init();
    });
}

pub async fn backend() -> Backend {
    backend_with_attachments(Arc::new(NoopAttachmentStore)).await
}

pub async fn backend_with_attachments(attachments: Arc<dyn AttachmentStore>) -> Backend {
    init_tracing();
    let repos = SqliteRepositories::connect_in_memory()
        .await
        .expect("in-memory database");
    repos.backend(attachments)
}

pub async fn core() -> BlogCore {
    BlogCore::new(backend().await, BlogConfig::default())
}

/// Writes a post through the pipeline and asserts it went in clean.
pub async fn write_post(
    core: &BlogCore,
    name: &str,
    author: &str,
    categories: &str,
    publish_time: Option<OffsetDateTime>,
) {
    let mut post = core.get_post(name, 0).await.expect("load post");
    post.update_fields(&PostUpdate {
        title: Some(format!("Title of {name}")),
        body: Some(format!("Body of {name}.")),
        author: Some(author.to_string()),
        categories: Some(categories.to_string()),
        publish_time,
    });
    let warnings = core
        .create_post(author, &mut post, author, "", false)
        .await
        .expect("save post");
    assert!(warnings.is_empty(), "unexpected warnings: {warnings:?}");
}

/// Attaches a comment through the pipeline and asserts it went in clean.
pub async fn write_comment(core: &BlogCore, post_name: &str, author: &str, text: &str) {
    let mut comment = core.get_comment(post_name, 0).await.expect("new comment");
    let warnings = core
        .create_comment(author, &mut comment, Some(text), Some(author), false)
        .await
        .expect("store comment");
    assert!(warnings.is_empty(), "unexpected warnings: {warnings:?}");
}

/// Listener recording every notification as a formatted line.
#[derive(Default)]
pub struct RecordingListener {
    pub events: Mutex<Vec<String>>,
}

impl RecordingListener {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().expect("events lock").clone()
    }

    fn record(&self, event: String) {
        self.events.lock().expect("events lock").push(event);
    }
}

#[async_trait]
impl BlogChangeListener for RecordingListener {
    async fn post_changed(&self, post_name: &str, version: i64) -> ListenerResult {
        self.record(format!("post_changed:{post_name}:{version}"));
        Ok(())
    }

    async fn post_deleted(
        &self,
        post_name: &str,
        version: i64,
        _fields: &PostSnapshot,
    ) -> ListenerResult {
        self.record(format!("post_deleted:{post_name}:{version}"));
        Ok(())
    }

    async fn comment_added(&self, post_name: &str, number: i64) -> ListenerResult {
        self.record(format!("comment_added:{post_name}:{number}"));
        Ok(())
    }

    async fn comment_deleted(
        &self,
        post_name: &str,
        number: i64,
        _fields: Option<&CommentRecord>,
    ) -> ListenerResult {
        self.record(format!("comment_deleted:{post_name}:{number}"));
        Ok(())
    }
}

/// Listener that always fails, for isolation tests.
pub struct FailingListener;

#[async_trait]
impl BlogChangeListener for FailingListener {
    async fn post_changed(&self, _post_name: &str, _version: i64) -> ListenerResult {
        Err("listener down".into())
    }

    async fn post_deleted(
        &self,
        _post_name: &str,
        _version: i64,
        _fields: &PostSnapshot,
    ) -> ListenerResult {
        Err("listener down".into())
    }

    async fn comment_added(&self, _post_name: &str, _number: i64) -> ListenerResult {
        Err("listener down".into())
    }

    async fn comment_deleted(
        &self,
        _post_name: &str,
        _number: i64,
        _fields: Option<&CommentRecord>,
    ) -> ListenerResult {
        Err("listener down".into())
    }
}

/// Manipulator rejecting everything with a fixed warning.
pub struct VetoManipulator;

#[async_trait]
impl BlogManipulator for VetoManipulator {
    async fn validate_post(
        &self,
        _actor: &str,
        _post_name: &str,
        _version: i64,
        _fields: &PostFields,
    ) -> Vec<Warning> {
        vec![Warning::general("Content rejected.")]
    }

    async fn validate_comment(
        &self,
        _actor: &str,
        _post_name: &str,
        _fields: &CommentFields,
    ) -> Vec<Warning> {
        vec![Warning::general("Content rejected.")]
    }
}

/// Attachment store recording which posts had their attachments purged.
#[derive(Default)]
pub struct RecordingAttachments {
    pub purged: Mutex<Vec<String>>,
}

impl RecordingAttachments {
    pub fn purged(&self) -> Vec<String> {
        self.purged.lock().expect("purged lock").clone()
    }
}

#[async_trait]
impl AttachmentStore for RecordingAttachments {
    async fn delete_all(&self, post_name: &str) -> Result<(), RepoError> {
        self.purged
            .lock()
            .expect("purged lock")
            .push(post_name.to_string());
        Ok(())
    }
}

/// Gate granting everything except viewing the posts it is told to hide.
pub struct HidingGate {
    pub hidden: Vec<String>,
}

impl PermissionGate for HidingGate {
    fn allows(&self, _actor: &str, capability: &str, post_name: &str) -> bool {
        capability != "view" || !self.hidden.iter().any(|name| name == post_name)
    }
}
