//! End-to-end coverage of the write pipeline: versioning, warnings,
//! vetoes, cascading deletes, and listener notification.

mod common;

use std::sync::Arc;

use brezza::application::extensions::Viewer;
use brezza::application::pipeline::BlogCore;
use brezza::application::repos::{NewPostVersion, RepoError};
use brezza::config::BlogConfig;
use brezza::domain::posts::PostUpdate;
use time::OffsetDateTime;
use time::macros::datetime;

#[tokio::test]
async fn versions_count_up_from_one_and_publish_time_stays_fixed() {
    let core = common::core().await;
    common::write_post(&core, "first", "alice", "", None).await;

    let mut post = core.get_post("first", 0).await.expect("load");
    assert_eq!(post.version, 1);
    post.update_fields(&PostUpdate {
        title: Some("Edited title".to_string()),
        ..PostUpdate::default()
    });
    let warnings = core
        .create_post("alice", &mut post, "alice", "typo fix", false)
        .await
        .expect("edit");
    assert!(warnings.is_empty());
    assert_eq!(post.version, 2);
    assert_eq!(post.versions, vec![1, 2]);

    let v1 = post.fetch_fields(1).await.expect("fetch").expect("v1");
    let v2 = post.fetch_fields(2).await.expect("fetch").expect("v2");
    assert_eq!(v1.publish_time, v2.publish_time);
    assert!(v2.version_time > v1.version_time);
    assert_eq!(v2.version_comment, "typo fix");
    // Version 1 is untouched by the edit.
    assert_eq!(v1.title, "Title of first");
    assert_eq!(v2.title, "Edited title");
}

#[tokio::test]
async fn missing_fields_warn_and_nothing_is_written() {
    let core = common::core().await;
    let mut post = core.get_post("draft", 0).await.expect("load");
    post.update_fields(&PostUpdate {
        body: Some("Body only.".to_string()),
        author: Some("alice".to_string()),
        ..PostUpdate::default()
    });
    let warnings = core
        .create_post("alice", &mut post, "alice", "", false)
        .await
        .expect("verify");
    assert!(
        warnings
            .iter()
            .any(|w| w.field.as_deref() == Some("title") && w.message == "Title is empty.")
    );
    assert!(post.get_versions().await.expect("versions").is_empty());
}

#[tokio::test]
async fn reserved_and_period_shaped_names_are_refused() {
    let core = common::core().await;
    for name in ["archive", "category/rust", "2024/07"] {
        let mut post = core.get_post(name, 0).await.expect("load");
        post.update_fields(&PostUpdate {
            title: Some("T".to_string()),
            body: Some("B".to_string()),
            author: Some("alice".to_string()),
            ..PostUpdate::default()
        });
        let warnings = core
            .create_post("alice", &mut post, "alice", "", false)
            .await
            .expect("verify");
        assert!(!warnings.is_empty(), "name {name} should be refused");
        assert!(post.get_versions().await.expect("versions").is_empty());
    }
}

#[tokio::test]
async fn name_rules_also_veto_edits_of_reserved_named_posts() {
    let core = common::core().await;
    // A drop-in database can already hold a post under a reserved name.
    let now = OffsetDateTime::now_utc();
    let row = NewPostVersion {
        name: "archive".to_string(),
        version: 1,
        title: "Old archive".to_string(),
        body: "Imported.".to_string(),
        publish_time: now,
        version_time: now,
        version_comment: String::new(),
        version_author: "alice".to_string(),
        author: "alice".to_string(),
        categories: String::new(),
    };
    core.backend().posts.insert_version(&row).await.expect("seed");

    let mut post = core.get_post("archive", 0).await.expect("load");
    post.update_fields(&PostUpdate {
        body: Some("Edited.".to_string()),
        ..PostUpdate::default()
    });
    let warnings = core
        .create_post("alice", &mut post, "alice", "", false)
        .await
        .expect("verify");
    assert!(
        warnings.iter().any(|w| w.message.contains("reserved name")),
        "got {warnings:?}"
    );
    assert_eq!(post.get_versions().await.expect("versions"), vec![1]);
}

#[tokio::test]
async fn front_page_honours_the_configured_item_count() {
    let config = BlogConfig {
        num_items_front: 2,
        ..BlogConfig::default()
    };
    let core = BlogCore::new(common::backend().await, config);
    common::write_post(&core, "a", "alice", "", Some(datetime!(2007-11-01 00:00 UTC))).await;
    common::write_post(&core, "b", "alice", "", Some(datetime!(2007-11-02 00:00 UTC))).await;
    common::write_post(&core, "c", "alice", "", Some(datetime!(2007-11-03 00:00 UTC))).await;

    let page = core.front_page().await.expect("front page");
    let names: Vec<&str> = page.iter().map(|post| post.name.as_str()).collect();
    assert_eq!(names, vec!["c", "b"]);
}

#[tokio::test]
async fn verify_only_reports_clean_but_writes_nothing() {
    let core = common::core().await;
    let mut post = core.get_post("preview", 0).await.expect("load");
    post.update_fields(&PostUpdate {
        title: Some("T".to_string()),
        body: Some("B".to_string()),
        author: Some("alice".to_string()),
        ..PostUpdate::default()
    });
    let warnings = core
        .create_post("alice", &mut post, "alice", "", true)
        .await
        .expect("verify");
    assert!(warnings.is_empty());
    assert!(post.get_versions().await.expect("versions").is_empty());
}

#[tokio::test]
async fn manipulator_veto_blocks_posts_and_comments() {
    let core = BlogCore::new(common::backend().await, BlogConfig::default())
        .with_manipulator(Arc::new(common::VetoManipulator));
    let mut post = core.get_post("vetoed", 0).await.expect("load");
    post.update_fields(&PostUpdate {
        title: Some("T".to_string()),
        body: Some("B".to_string()),
        author: Some("alice".to_string()),
        ..PostUpdate::default()
    });
    let warnings = core
        .create_post("alice", &mut post, "alice", "", false)
        .await
        .expect("verify");
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].message, "Content rejected.");
    assert!(post.get_versions().await.expect("versions").is_empty());

    let mut comment = core.get_comment("vetoed", 0).await.expect("new comment");
    let warnings = core
        .create_comment("bob", &mut comment, Some("hi"), Some("bob"), false)
        .await
        .expect("verify");
    assert!(warnings.iter().any(|w| w.message == "Content rejected."));
    assert!(!comment.exists());
}

#[tokio::test]
async fn failing_listener_does_not_starve_the_next_one() {
    let recorder = Arc::new(common::RecordingListener::default());
    let core = BlogCore::new(common::backend().await, BlogConfig::default())
        .with_listener(Arc::new(common::FailingListener))
        .with_listener(recorder.clone());
    common::write_post(&core, "resilient", "alice", "", None).await;
    assert_eq!(recorder.events(), vec!["post_changed:resilient:1"]);
}

#[tokio::test]
async fn deleting_last_version_cascades_to_comments_and_attachments() {
    let attachments = Arc::new(common::RecordingAttachments::default());
    let recorder = Arc::new(common::RecordingListener::default());
    let backend = common::backend_with_attachments(attachments.clone()).await;
    let core = BlogCore::new(backend, BlogConfig::default()).with_listener(recorder.clone());

    common::write_post(&core, "doomed", "alice", "", None).await;
    let mut post = core.get_post("doomed", 0).await.expect("load");
    post.update_fields(&PostUpdate {
        body: Some("Second body.".to_string()),
        ..PostUpdate::default()
    });
    core.create_post("alice", &mut post, "alice", "", false)
        .await
        .expect("edit");
    common::write_comment(&core, "doomed", "bob", "nice post").await;

    // Dropping one version leaves comments alone.
    let warnings = core.delete_post("doomed", 2).await.expect("delete v2");
    assert!(warnings.is_empty());
    let survivor = core.get_post("doomed", 0).await.expect("reload");
    assert_eq!(survivor.versions, vec![1]);
    assert_eq!(survivor.get_comments().await.expect("comments").len(), 1);
    assert!(attachments.purged().is_empty());

    // Dropping the last version removes everything attached.
    let warnings = core.delete_post("doomed", 0).await.expect("delete all");
    assert!(warnings.is_empty());
    let gone = core.get_post("doomed", 0).await.expect("reload");
    assert!(!gone.exists());
    assert!(gone.get_comments().await.expect("comments").is_empty());
    assert_eq!(attachments.purged(), vec!["doomed".to_string()]);

    let events = recorder.events();
    assert!(events.contains(&"post_deleted:doomed:2".to_string()));
    assert!(events.contains(&"post_deleted:doomed:0".to_string()));
    assert!(events.contains(&"comment_deleted:doomed:0".to_string()));
}

#[tokio::test]
async fn deleting_a_missing_post_warns() {
    let core = common::core().await;
    let warnings = core.delete_post("nope", 0).await.expect("delete");
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].message, "Post and/or version does not exist.");
}

#[tokio::test]
async fn comment_numbers_are_never_reused() {
    let recorder = Arc::new(common::RecordingListener::default());
    let core = BlogCore::new(common::backend().await, BlogConfig::default())
        .with_listener(recorder.clone());
    common::write_post(&core, "chatty", "alice", "", None).await;
    for text in ["one", "two", "three"] {
        common::write_comment(&core, "chatty", "bob", text).await;
    }
    let warnings = core.delete_comment("chatty", 2).await.expect("delete");
    assert!(warnings.is_empty());
    common::write_comment(&core, "chatty", "bob", "four").await;

    let post = core.get_post("chatty", 0).await.expect("load");
    let numbers: Vec<i64> = post
        .get_comments()
        .await
        .expect("comments")
        .iter()
        .map(|comment| comment.number)
        .collect();
    assert_eq!(numbers, vec![1, 3, 4]);
    assert!(recorder.events().contains(&"comment_deleted:chatty:2".to_string()));
}

#[tokio::test]
async fn commenting_a_missing_post_warns() {
    let core = common::core().await;
    let mut comment = core.get_comment("ghost", 0).await.expect("new comment");
    let warnings = core
        .create_comment("bob", &mut comment, Some("hi"), Some("bob"), false)
        .await
        .expect("verify");
    assert!(
        warnings
            .iter()
            .any(|w| w.field.is_none() && w.message == "Post 'ghost' does not exist.")
    );
}

#[tokio::test]
async fn concurrent_version_collision_surfaces_as_duplicate() {
    let backend = common::backend().await;
    let row = NewPostVersion {
        name: "race".to_string(),
        version: 1,
        title: "T".to_string(),
        body: "B".to_string(),
        publish_time: OffsetDateTime::now_utc(),
        version_time: OffsetDateTime::now_utc(),
        version_comment: String::new(),
        version_author: "alice".to_string(),
        author: "alice".to_string(),
        categories: String::new(),
    };
    backend.posts.insert_version(&row).await.expect("first write");
    let err = backend
        .posts
        .insert_version(&row)
        .await
        .expect_err("second write must lose");
    assert!(matches!(err, RepoError::Duplicate { .. }), "got {err:?}");
}

#[tokio::test]
async fn aggregate_reflects_writes_despite_caching() {
    let core = common::core().await;
    common::write_post(
        &core,
        "nov-post",
        "alice",
        "rust",
        Some(datetime!(2007-11-02 08:00 UTC)),
    )
    .await;
    let stats = core
        .months_authors_categories(None, None, None)
        .await
        .expect("stats");
    assert_eq!(stats.total, 1);

    common::write_post(
        &core,
        "dec-post",
        "bob",
        "rust ops",
        Some(datetime!(2007-12-24 10:00 UTC)),
    )
    .await;
    let stats = core
        .months_authors_categories(None, None, None)
        .await
        .expect("stats");
    assert_eq!(stats.total, 2);
    assert_eq!(stats.months, vec![((2007, 12), 1), ((2007, 11), 1)]);
}

#[tokio::test]
async fn prev_next_walks_the_publish_order_and_honours_the_viewer() {
    let core = common::core().await;
    common::write_post(&core, "oldest", "alice", "", Some(datetime!(2007-10-01 00:00 UTC))).await;
    common::write_post(&core, "middle", "alice", "", Some(datetime!(2007-11-01 00:00 UTC))).await;
    common::write_post(&core, "newest", "alice", "", Some(datetime!(2007-12-01 00:00 UTC))).await;

    let (newer, older) = core.prev_next_posts(None, "middle").await.expect("walk");
    assert_eq!(newer.as_deref(), Some("newest"));
    assert_eq!(older.as_deref(), Some("oldest"));

    let gate = common::HidingGate {
        hidden: vec!["newest".to_string()],
    };
    let viewer = Viewer {
        actor: "bob",
        gate: &gate,
    };
    let (newer, older) = core
        .prev_next_posts(Some(viewer), "middle")
        .await
        .expect("walk");
    assert_eq!(newer, None);
    assert_eq!(older.as_deref(), Some("oldest"));

    // A target the viewer cannot see yields no neighbours at all.
    let gate = common::HidingGate {
        hidden: vec!["middle".to_string()],
    };
    let viewer = Viewer {
        actor: "bob",
        gate: &gate,
    };
    let (newer, older) = core
        .prev_next_posts(Some(viewer), "middle")
        .await
        .expect("walk");
    assert_eq!((newer, older), (None, None));

    let (newer, older) = core.prev_next_posts(None, "unknown").await.expect("walk");
    assert_eq!((newer, older), (None, None));
}

#[tokio::test]
async fn info_text_round_trips_and_defaults_to_empty() {
    let core = common::core().await;
    assert_eq!(core.info_text().await.expect("load"), "");
    core.set_info_text("Welcome to the blog.")
        .await
        .expect("store");
    assert_eq!(core.info_text().await.expect("load"), "Welcome to the blog.");
}

#[tokio::test]
async fn default_post_name_expands_date_and_user() {
    let config = BlogConfig {
        default_postname: "%Y/%m/%d/$USER".to_string(),
        ..BlogConfig::default()
    };
    let core = BlogCore::new(common::backend().await, config);
    let name = core.default_post_name("carol");
    let year = format!("{:04}", OffsetDateTime::now_utc().year());
    assert!(name.starts_with(&year), "got {name}");
    assert!(name.ends_with("/carol"), "got {name}");

    let bare = BlogCore::new(common::backend().await, BlogConfig::default());
    assert_eq!(bare.default_post_name("carol"), "");
}

mod spam {
    use std::sync::Arc;

    use async_trait::async_trait;
    use brezza::application::pipeline::BlogCore;
    use brezza::application::spam::{SpamCheck, SpamFilterManipulator};
    use brezza::config::BlogConfig;
    use brezza::domain::posts::PostUpdate;
    use brezza::domain::warnings::Warning;

    use crate::common;

    struct KeywordCheck;

    #[async_trait]
    impl SpamCheck for KeywordCheck {
        async fn test(
            &self,
            _actor: &str,
            _author: &str,
            changes: &[(String, String)],
        ) -> Vec<Warning> {
            if changes.iter().any(|(_, new)| new.contains("buy now")) {
                vec![Warning::general("Rejected as spam.")]
            } else {
                Vec::new()
            }
        }
    }

    struct RootIsAdmin;

    impl brezza::application::extensions::PermissionGate for RootIsAdmin {
        fn allows(&self, actor: &str, capability: &str, _post_name: &str) -> bool {
            capability != "admin" || actor == "root"
        }
    }

    async fn spam_guarded_core() -> BlogCore {
        let backend = common::backend().await;
        let manipulator = SpamFilterManipulator::new(
            backend.clone(),
            Arc::new(KeywordCheck),
            Some(Arc::new(RootIsAdmin)),
        );
        BlogCore::new(backend, BlogConfig::default()).with_manipulator(Arc::new(manipulator))
    }

    #[tokio::test]
    async fn spammy_content_is_vetoed_for_ordinary_users() {
        let core = spam_guarded_core().await;
        let mut post = core.get_post("pitch", 0).await.expect("load");
        post.update_fields(&PostUpdate {
            title: Some("Deal".to_string()),
            body: Some("buy now while stocks last".to_string()),
            author: Some("mallory".to_string()),
            ..PostUpdate::default()
        });
        let warnings = core
            .create_post("mallory", &mut post, "mallory", "", false)
            .await
            .expect("verify");
        assert!(warnings.iter().any(|w| w.message == "Rejected as spam."));
        assert!(post.get_versions().await.expect("versions").is_empty());

        common::write_post(&core, "clean", "alice", "", None).await;
        let mut comment = core.get_comment("clean", 0).await.expect("new comment");
        let warnings = core
            .create_comment("mallory", &mut comment, Some("buy now"), Some("mallory"), false)
            .await
            .expect("verify");
        assert!(warnings.iter().any(|w| w.message == "Rejected as spam."));
    }

    #[tokio::test]
    async fn admins_bypass_the_spam_check() {
        let core = spam_guarded_core().await;
        let mut post = core.get_post("announcement", 0).await.expect("load");
        post.update_fields(&PostUpdate {
            title: Some("Sale".to_string()),
            body: Some("buy now".to_string()),
            author: Some("root".to_string()),
            ..PostUpdate::default()
        });
        let warnings = core
            .create_post("root", &mut post, "root", "", false)
            .await
            .expect("save");
        assert!(warnings.is_empty(), "unexpected warnings: {warnings:?}");
        assert_eq!(post.version, 1);
    }

    #[tokio::test]
    async fn unchanged_fields_are_not_retested() {
        let core = spam_guarded_core().await;
        // A body the checker would flag, but stored by an admin.
        let mut post = core.get_post("legacy", 0).await.expect("load");
        post.update_fields(&PostUpdate {
            title: Some("Old deal".to_string()),
            body: Some("buy now".to_string()),
            author: Some("root".to_string()),
            ..PostUpdate::default()
        });
        core.create_post("root", &mut post, "root", "", false)
            .await
            .expect("seed");

        // An ordinary user's edit that leaves the flagged body untouched
        // only submits the changed title for checking.
        let mut post = core.get_post("legacy", 0).await.expect("reload");
        post.update_fields(&PostUpdate {
            title: Some("Renamed deal".to_string()),
            ..PostUpdate::default()
        });
        let warnings = core
            .create_post("alice", &mut post, "alice", "", false)
            .await
            .expect("edit");
        assert!(warnings.is_empty(), "unexpected warnings: {warnings:?}");
        assert_eq!(post.version, 2);
    }
}

#[tokio::test]
async fn warnings_serialize_for_host_handoff() {
    let core = common::core().await;
    let warnings = core.delete_post("nope", 0).await.expect("delete");
    let json = serde_json::to_value(&warnings).expect("serialize");
    assert_eq!(
        json,
        serde_json::json!([
            { "field": null, "message": "Post and/or version does not exist." }
        ])
    );
}
