//! The write pipeline and query façade.
//!
//! Writes run in two phases. Phase one verifies: the entity's own field
//! checks, the name rules for new posts, then every registered manipulator.
//! Any warning stops the write before the store is touched. Phase two
//! commits and then notifies listeners, each isolated so one failure never
//! starves the rest or the caller.

use std::sync::Arc;

use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::application::comments::BlogComment;
use crate::application::extensions::{
    BlogChangeListener, BlogManipulator, CommentFields, Viewer,
};
use crate::application::posts::BlogPost;
use crate::application::repos::{Backend, CommentFilter, PageWindow, PostFilter, RepoError};
use crate::cache::{StatsCache, stats_key};
use crate::config::BlogConfig;
use crate::domain::comments::CommentRecord;
use crate::domain::naming::check_post_name;
use crate::domain::posts::{BlogStats, PostListing, PostSearchHit, collect_stats};
use crate::domain::warnings::Warning;

const INFOTEXT_KEY: &str = "infotext";

/// Central service owning the extension points and the aggregate cache.
pub struct BlogCore {
    backend: Backend,
    manipulators: Vec<Arc<dyn BlogManipulator>>,
    listeners: Vec<Arc<dyn BlogChangeListener>>,
    stats_cache: StatsCache,
    config: BlogConfig,
}

impl BlogCore {
    pub fn new(backend: Backend, config: BlogConfig) -> Self {
        let stats_cache = StatsCache::new(&config.cache);
        Self {
            backend,
            manipulators: Vec::new(),
            listeners: Vec::new(),
            stats_cache,
            config,
        }
    }

    pub fn with_manipulator(mut self, manipulator: Arc<dyn BlogManipulator>) -> Self {
        self.manipulators.push(manipulator);
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn BlogChangeListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn config(&self) -> &BlogConfig {
        &self.config
    }

    /// Constructs the entity for `name` at `version` (0 for current).
    pub async fn get_post(&self, name: &str, version: i64) -> Result<BlogPost, RepoError> {
        BlogPost::load(self.backend.clone(), name, version).await
    }

    pub async fn get_comment(&self, post_name: &str, number: i64) -> Result<BlogComment, RepoError> {
        BlogComment::load(self.backend.clone(), post_name, number).await
    }

    /// Saves `post` as a new version through the full pipeline. Returned
    /// warnings mean nothing was written; an empty return means the version
    /// is committed and listeners were notified.
    pub async fn create_post(
        &self,
        actor: &str,
        post: &mut BlogPost,
        version_author: &str,
        version_comment: &str,
        verify_only: bool,
    ) -> Result<Vec<Warning>, RepoError> {
        let mut warnings = post.save(version_author, version_comment, true).await?;
        // Name rules apply on every save: a drop-in database can carry a
        // reserved-named post, and edits to it must warn like creates do.
        warnings.extend(check_post_name(&post.name));
        let fields = post.validation_fields(version_author, version_comment);
        for manipulator in &self.manipulators {
            warnings.extend(
                manipulator
                    .validate_post(actor, &post.name, post.version, &fields)
                    .await,
            );
        }
        if !warnings.is_empty() || verify_only {
            return Ok(warnings);
        }

        let warnings = post.save(version_author, version_comment, false).await?;
        if !warnings.is_empty() {
            return Ok(warnings);
        }
        self.stats_cache.invalidate_all();
        for listener in &self.listeners {
            if let Err(err) = listener.post_changed(&post.name, post.version).await {
                warn!(post = %post.name, error = %err, "post change listener failed");
            }
        }
        Ok(Vec::new())
    }

    /// Deletes one version of a post (`version > 0`) or the whole post
    /// (`version == 0`). Listener notifications carry the deleted fields;
    /// when the last version goes, `version` is reported as 0 and a
    /// `comment_deleted(.., 0, None)` follows for the cascaded comments.
    pub async fn delete_post(
        &self,
        post_name: &str,
        version: i64,
    ) -> Result<Vec<Warning>, RepoError> {
        let Some(fields) = self.backend.posts.fetch_fields(post_name, version).await? else {
            return Ok(vec![Warning::general("Post and/or version does not exist.")]);
        };
        let mut post = BlogPost::load(self.backend.clone(), post_name, version).await?;
        if !post.delete(version).await? {
            return Ok(vec![Warning::general("Unknown error. Not deleted.")]);
        }
        self.stats_cache.invalidate_all();
        let fully_deleted = post.versions.is_empty();
        let notified_version = if fully_deleted { 0 } else { fields.version };
        debug!(post = post_name, version = notified_version, "blog post deleted");
        for listener in &self.listeners {
            if let Err(err) = listener
                .post_deleted(post_name, notified_version, &fields)
                .await
            {
                warn!(post = post_name, error = %err, "post delete listener failed");
            }
        }
        if fully_deleted {
            for listener in &self.listeners {
                if let Err(err) = listener.comment_deleted(post_name, 0, None).await {
                    warn!(post = post_name, error = %err, "comment delete listener failed");
                }
            }
        }
        Ok(Vec::new())
    }

    /// Stores `comment` through the full pipeline, same contract as
    /// [`Self::create_post`].
    pub async fn create_comment(
        &self,
        actor: &str,
        comment: &mut BlogComment,
        text: Option<&str>,
        author: Option<&str>,
        verify_only: bool,
    ) -> Result<Vec<Warning>, RepoError> {
        let mut warnings = comment.create(text, author, true).await?;
        let fields = CommentFields {
            comment: comment.comment.clone(),
            author: comment.author.clone(),
        };
        for manipulator in &self.manipulators {
            warnings.extend(
                manipulator
                    .validate_comment(actor, &comment.post_name, &fields)
                    .await,
            );
        }
        if !warnings.is_empty() || verify_only {
            return Ok(warnings);
        }

        let warnings = comment.create(None, None, false).await?;
        if !warnings.is_empty() {
            return Ok(warnings);
        }
        for listener in &self.listeners {
            if let Err(err) = listener
                .comment_added(&comment.post_name, comment.number)
                .await
            {
                warn!(post = %comment.post_name, error = %err, "comment add listener failed");
            }
        }
        Ok(Vec::new())
    }

    pub async fn delete_comment(
        &self,
        post_name: &str,
        number: i64,
    ) -> Result<Vec<Warning>, RepoError> {
        let Some(record) = self.backend.comments.fetch_comment(post_name, number).await? else {
            return Ok(vec![Warning::general("Comment does not exist.")]);
        };
        let mut comment = BlogComment::from_record(self.backend.clone(), record.clone());
        if !comment.delete().await? {
            return Ok(vec![Warning::general("Unknown error. Not deleted.")]);
        }
        for listener in &self.listeners {
            if let Err(err) = listener
                .comment_deleted(post_name, number, Some(&record))
                .await
            {
                warn!(post = post_name, error = %err, "comment delete listener failed");
            }
        }
        Ok(Vec::new())
    }

    pub async fn find_posts(
        &self,
        filter: &PostFilter,
        window: Option<PageWindow>,
    ) -> Result<Vec<PostListing>, RepoError> {
        self.backend.posts.find_posts(filter, window).await
    }

    /// The newest current posts, limited to the configured front page item
    /// count.
    pub async fn front_page(&self) -> Result<Vec<PostListing>, RepoError> {
        let window = PageWindow {
            size: self.config.num_items_front,
            number: 0,
        };
        self.backend
            .posts
            .find_posts(&PostFilter::default(), Some(window))
            .await
    }

    pub async fn list_post_names(&self) -> Result<Vec<String>, RepoError> {
        self.backend.posts.list_post_names().await
    }

    pub async fn search_posts(&self, terms: &[String]) -> Result<Vec<PostSearchHit>, RepoError> {
        self.backend.posts.search_posts(terms).await
    }

    pub async fn find_comments(
        &self,
        filter: &CommentFilter,
    ) -> Result<Vec<CommentRecord>, RepoError> {
        self.backend.comments.find_comments(filter).await
    }

    pub async fn search_comments(&self, terms: &[String]) -> Result<Vec<CommentRecord>, RepoError> {
        self.backend.comments.search_comments(terms).await
    }

    /// Neighbours of `name` in the newest-first post sequence, restricted
    /// to posts the viewer may see. Returns `(newer, older)`; either side
    /// is `None` at the corresponding end of the sequence, and both are
    /// `None` when `name` itself is not listed or not visible to the
    /// viewer.
    pub async fn prev_next_posts(
        &self,
        viewer: Option<Viewer<'_>>,
        name: &str,
    ) -> Result<(Option<String>, Option<String>), RepoError> {
        let names = self.backend.posts.list_post_names().await?;
        let visible = |candidate: &str| match viewer {
            Some(viewer) => viewer.can_view(candidate),
            None => true,
        };
        let mut newer = None;
        let mut older = None;
        let mut seen = false;
        for candidate in &names {
            if !visible(candidate) {
                continue;
            }
            if candidate == name {
                seen = true;
                continue;
            }
            if seen {
                older = Some(candidate.clone());
                break;
            }
            newer = Some(candidate.clone());
        }
        if !seen {
            return Ok((None, None));
        }
        Ok((newer, older))
    }

    /// Month, author and category aggregate over posts published inside the
    /// given window. Unrestricted aggregates are served from the TTL cache;
    /// viewer-restricted ones are always computed fresh, since their
    /// contents depend on the viewer's permissions.
    pub async fn months_authors_categories(
        &self,
        from: Option<OffsetDateTime>,
        to: Option<OffsetDateTime>,
        viewer: Option<Viewer<'_>>,
    ) -> Result<BlogStats, RepoError> {
        let key = stats_key(from, to);
        if viewer.is_none()
            && let Some(stats) = self.stats_cache.get(&key)
        {
            debug!(key = %key, "aggregate served from cache");
            return Ok(stats);
        }
        let filter = PostFilter {
            from,
            to,
            ..PostFilter::default()
        };
        let mut listings = self.backend.posts.find_posts(&filter, None).await?;
        if let Some(viewer) = viewer {
            listings.retain(|listing| viewer.can_view(&listing.name));
        }
        let stats = collect_stats(&listings);
        if viewer.is_none() {
            self.stats_cache.insert(key, stats.clone());
        }
        Ok(stats)
    }

    /// Free-form text shown alongside the blog, stored in the settings
    /// table. Absent means empty.
    pub async fn info_text(&self) -> Result<String, RepoError> {
        Ok(self
            .backend
            .settings
            .load_value(INFOTEXT_KEY)
            .await?
            .unwrap_or_default())
    }

    pub async fn set_info_text(&self, text: &str) -> Result<(), RepoError> {
        self.backend.settings.store_value(INFOTEXT_KEY, text).await
    }

    /// Suggested name for a new post, from the configured template. An
    /// empty template yields an empty suggestion.
    pub fn default_post_name(&self, user: &str) -> String {
        let template = &self.config.default_postname;
        if template.is_empty() {
            return String::new();
        }
        let now = OffsetDateTime::now_utc();
        template
            .replace("%Y", &format!("{:04}", now.year()))
            .replace("%m", &format!("{:02}", now.month() as u8))
            .replace("%d", &format!("{:02}", now.day()))
            .replace("%H", &format!("{:02}", now.hour()))
            .replace("%M", &format!("{:02}", now.minute()))
            .replace("%S", &format!("{:02}", now.second()))
            .replace("$USER", user)
    }
}
