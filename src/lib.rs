//! brezza is an embeddable blogging core: versioned posts, numbered
//! comments, filtered and paged listings, free text search, and a
//! month/author/category aggregate, all stored in SQLite.
//!
//! Every write runs through a two phase pipeline. Registered manipulators
//! validate first and any warning vetoes the write before the store is
//! touched; once a write commits, change listeners are notified best
//! effort. See [`application::pipeline::BlogCore`] for the entry point.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use brezza::application::extensions::NoopAttachmentStore;
//! use brezza::application::pipeline::BlogCore;
//! use brezza::config::BlogConfig;
//! use brezza::infra::db::SqliteRepositories;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let repos = SqliteRepositories::connect("sqlite://blog.db").await?;
//! let core = BlogCore::new(
//!     repos.backend(Arc::new(NoopAttachmentStore)),
//!     BlogConfig::default(),
//! );
//! let mut post = core.get_post("first-post", 0).await?;
//! post.title = "First post".to_string();
//! post.body = "Hello.".to_string();
//! post.author = "alice".to_string();
//! let warnings = core.create_post("alice", &mut post, "alice", "", false).await?;
//! assert!(warnings.is_empty());
//! # Ok(())
//! # }
//! ```

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;

pub use application::comments::BlogComment;
pub use application::pipeline::BlogCore;
pub use application::posts::BlogPost;
pub use application::repos::{Backend, PageWindow, PostFilter, RepoError};
pub use domain::warnings::Warning;
