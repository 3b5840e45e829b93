//! Pure post-side types: listings, version snapshots, category parsing,
//! and the month/author/category aggregate.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use time::{Date, OffsetDateTime};

/// Splits the free-text `categories` field into tokens. Commas and
/// semicolons count as separators alongside whitespace; empty tokens are
/// dropped.
pub fn parse_categories(raw: &str) -> Vec<String> {
    raw.replace([',', ';'], " ")
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Category tokens as a set, for exact-membership checks.
pub fn category_set(raw: &str) -> BTreeSet<String> {
    parse_categories(raw).into_iter().collect()
}

/// One row of a post listing. `time` is the publish time for current-only
/// listings and the version time when all versions were requested.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostListing {
    pub name: String,
    pub version: i64,
    pub time: OffsetDateTime,
    pub author: String,
    pub title: String,
    pub body: String,
    pub categories: Vec<String>,
}

/// One free-text search hit over current post versions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostSearchHit {
    pub name: String,
    pub version: i64,
    pub publish_time: OffsetDateTime,
    pub author: String,
    pub title: String,
    pub body: String,
}

/// Full field snapshot of one stored post version.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostSnapshot {
    pub version: i64,
    pub title: String,
    pub body: String,
    pub publish_time: OffsetDateTime,
    pub version_time: OffsetDateTime,
    pub version_comment: String,
    pub version_author: String,
    pub author: String,
    pub categories: String,
    pub category_list: BTreeSet<String>,
}

/// Partial update over the mutable post fields. Identity fields (`name`,
/// `version`) are deliberately absent.
#[derive(Debug, Clone, Default)]
pub struct PostUpdate {
    pub title: Option<String>,
    pub body: Option<String>,
    pub author: Option<String>,
    pub categories: Option<String>,
    pub publish_time: Option<OffsetDateTime>,
}

/// Aggregate over a set of posts: per-month counts (newest month first),
/// per-author and per-category counts (alphabetical), and the total number
/// of posts considered.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlogStats {
    pub months: Vec<((i32, u8), u64)>,
    pub authors: Vec<(String, u64)>,
    pub categories: Vec<(String, u64)>,
    pub total: u64,
}

/// Folds a newest-first listing into [`BlogStats`]. Months come out in
/// encounter order (newest first for ordered input); author and category
/// counts come out alphabetically.
pub fn collect_stats(posts: &[PostListing]) -> BlogStats {
    let mut months: Vec<((i32, u8), u64)> = Vec::new();
    let mut authors: BTreeMap<String, u64> = BTreeMap::new();
    let mut categories: BTreeMap<String, u64> = BTreeMap::new();
    for post in posts {
        let month = (post.time.year(), post.time.month() as u8);
        match months.last_mut() {
            Some((current, count)) if *current == month => *count += 1,
            _ => months.push((month, 1)),
        }
        *authors.entry(post.author.clone()).or_insert(0) += 1;
        for category in &post.categories {
            *categories.entry(category.clone()).or_insert(0) += 1;
        }
    }
    BlogStats {
        months,
        authors: authors.into_iter().collect(),
        categories: categories.into_iter().collect(),
        total: posts.len() as u64,
    }
}

/// Groups a newest-first listing into `(first-of-month, posts)` buckets,
/// preserving the input order inside each bucket.
pub fn group_posts_by_month(posts: &[PostListing]) -> Vec<(Date, Vec<PostListing>)> {
    let mut grouped: Vec<(Date, Vec<PostListing>)> = Vec::new();
    for post in posts {
        let period = post
            .time
            .date()
            .replace_day(1)
            .expect("day 1 exists in every month");
        match grouped.last_mut() {
            Some((current, bucket)) if *current == period => bucket.push(post.clone()),
            _ => grouped.push((period, vec![post.clone()])),
        }
    }
    grouped
}
