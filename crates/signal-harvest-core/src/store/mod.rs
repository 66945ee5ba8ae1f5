//! Storage abstraction for Signal Harvest.
//!
//! The [`Store`] trait defines every persistence capability the pipelines
//! need, enabling pluggable backends (SQLite in the native package, the
//! in-memory store here for tests).
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{ContentItem, Insight, Scope};

/// Row counts for `harvest stats`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreCounts {
    pub posts: i64,
    pub insights: i64,
    /// Posts with no insight yet.
    pub pending: i64,
    /// Post counts per channel, largest first.
    pub per_channel: Vec<(String, i64)>,
}

/// Abstract storage backend for Signal Harvest.
///
/// Scope matching follows one rule everywhere: an empty [`Scope`] selects
/// background posts only (no query and no user). A scope with a user
/// selects that user's posts, further narrowed by query when one is set.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`insert_post`](Store::insert_post) | Insert a post unless its dedup key exists |
/// | [`post_exists`](Store::post_exists) | Dedup existence predicate |
/// | [`pending_posts`](Store::pending_posts) | Posts in scope with no insight, insertion order |
/// | [`insight_exists`](Store::insight_exists) | Whether a post URL already has an insight |
/// | [`insert_insight`](Store::insert_insight) | Insert an insight unless one exists for its post |
/// | [`delete_posts_before`](Store::delete_posts_before) | Retention delete for posts |
/// | [`delete_insights_before`](Store::delete_insights_before) | Retention delete for insights |
/// | [`delete_orphaned_insights`](Store::delete_orphaned_insights) | Drop insights whose post is gone |
/// | [`recent_insights`](Store::recent_insights) | Newest insights for posts in scope |
/// | [`counts`](Store::counts) | Row counts |
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert a post. Returns `false` when a post with the same URL and
    /// scope query is already stored.
    async fn insert_post(&self, post: &ContentItem) -> Result<bool>;

    /// Whether a post with this URL exists. A non-empty `scope_query`
    /// narrows the match to posts ingested under that query.
    async fn post_exists(&self, url: &str, scope_query: Option<&str>) -> Result<bool>;

    /// Posts matching `scope` that have no insight yet, oldest insertion
    /// first, at most `limit`.
    async fn pending_posts(&self, scope: &Scope, limit: usize) -> Result<Vec<ContentItem>>;

    /// Whether an insight references this post URL.
    async fn insight_exists(&self, post_ref: &str) -> Result<bool>;

    /// Insert an insight. Returns `false` when its post already has one.
    async fn insert_insight(&self, insight: &Insight) -> Result<bool>;

    /// Delete posts whose origin timestamp is older than `cutoff`.
    async fn delete_posts_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;

    /// Delete insights created before `cutoff`.
    async fn delete_insights_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;

    /// Delete insights whose `post_ref` matches no stored post.
    async fn delete_orphaned_insights(&self) -> Result<u64>;

    /// Newest insights whose post matches `scope`, at most `limit`.
    async fn recent_insights(&self, scope: &Scope, limit: usize) -> Result<Vec<Insight>>;

    /// Row counts across both collections.
    async fn counts(&self) -> Result<StoreCounts>;
}

/// Whether a post falls inside `scope` (see [`Store`] for the rule).
pub fn scope_matches(scope: &Scope, post: &ContentItem) -> bool {
    match scope.user_id() {
        None => post.scope_user_id.is_none() && post.scope_query.is_none(),
        Some(user) => {
            post.scope_user_id.as_deref() == Some(user)
                && scope
                    .query()
                    .map_or(true, |q| post.scope_query.as_deref() == Some(q))
        }
    }
}
