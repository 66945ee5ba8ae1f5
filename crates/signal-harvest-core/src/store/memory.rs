//! In-memory [`Store`] implementation for testing.
//!
//! Uses `Vec`s behind `std::sync::RwLock` for thread safety. Insertion
//! order is the vector order, which is what [`Store::pending_posts`]
//! promises.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{ContentItem, Insight, Scope};

use super::{scope_matches, Store, StoreCounts};

/// In-memory store for tests and dry runs.
pub struct InMemoryStore {
    posts: RwLock<Vec<ContentItem>>,
    insights: RwLock<Vec<Insight>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            posts: RwLock::new(Vec::new()),
            insights: RwLock::new(Vec::new()),
        }
    }

    /// Snapshot of all stored posts, in insertion order.
    pub fn posts(&self) -> Vec<ContentItem> {
        self.posts.read().map(|p| p.clone()).unwrap_or_default()
    }

    /// Snapshot of all stored insights, in insertion order.
    pub fn insights(&self) -> Vec<Insight> {
        self.insights.read().map(|i| i.clone()).unwrap_or_default()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("in-memory store lock poisoned")
}

#[async_trait]
impl Store for InMemoryStore {
    async fn insert_post(&self, post: &ContentItem) -> Result<bool> {
        let mut posts = self.posts.write().map_err(poisoned)?;
        let duplicate = posts
            .iter()
            .any(|p| p.url == post.url && p.scope_query == post.scope_query);
        if duplicate {
            return Ok(false);
        }
        posts.push(post.clone());
        Ok(true)
    }

    async fn post_exists(&self, url: &str, scope_query: Option<&str>) -> Result<bool> {
        let posts = self.posts.read().map_err(poisoned)?;
        let scope_query = scope_query.filter(|q| !q.is_empty());
        Ok(posts.iter().any(|p| {
            p.url == url && scope_query.map_or(true, |q| p.scope_query.as_deref() == Some(q))
        }))
    }

    async fn pending_posts(&self, scope: &Scope, limit: usize) -> Result<Vec<ContentItem>> {
        let posts = self.posts.read().map_err(poisoned)?;
        let insights = self.insights.read().map_err(poisoned)?;
        Ok(posts
            .iter()
            .filter(|p| scope_matches(scope, p))
            .filter(|p| !insights.iter().any(|i| i.post_ref == p.url))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn insight_exists(&self, post_ref: &str) -> Result<bool> {
        let insights = self.insights.read().map_err(poisoned)?;
        Ok(insights.iter().any(|i| i.post_ref == post_ref))
    }

    async fn insert_insight(&self, insight: &Insight) -> Result<bool> {
        let mut insights = self.insights.write().map_err(poisoned)?;
        if insights.iter().any(|i| i.post_ref == insight.post_ref) {
            return Ok(false);
        }
        insights.push(insight.clone());
        Ok(true)
    }

    async fn delete_posts_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut posts = self.posts.write().map_err(poisoned)?;
        let before = posts.len();
        posts.retain(|p| p.created_at >= cutoff);
        Ok((before - posts.len()) as u64)
    }

    async fn delete_insights_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut insights = self.insights.write().map_err(poisoned)?;
        let before = insights.len();
        insights.retain(|i| i.created_at >= cutoff);
        Ok((before - insights.len()) as u64)
    }

    async fn delete_orphaned_insights(&self) -> Result<u64> {
        let posts = self.posts.read().map_err(poisoned)?;
        let mut insights = self.insights.write().map_err(poisoned)?;
        let before = insights.len();
        insights.retain(|i| posts.iter().any(|p| p.url == i.post_ref));
        Ok((before - insights.len()) as u64)
    }

    async fn recent_insights(&self, scope: &Scope, limit: usize) -> Result<Vec<Insight>> {
        let posts = self.posts.read().map_err(poisoned)?;
        let insights = self.insights.read().map_err(poisoned)?;
        let mut matching: Vec<Insight> = insights
            .iter()
            .filter(|i| {
                posts
                    .iter()
                    .any(|p| p.url == i.post_ref && scope_matches(scope, p))
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matching.truncate(limit);
        Ok(matching)
    }

    async fn counts(&self) -> Result<StoreCounts> {
        let posts = self.posts.read().map_err(poisoned)?;
        let insights = self.insights.read().map_err(poisoned)?;

        let mut per_channel: HashMap<String, i64> = HashMap::new();
        for p in posts.iter() {
            *per_channel.entry(p.channel.clone()).or_insert(0) += 1;
        }
        let mut per_channel: Vec<(String, i64)> = per_channel.into_iter().collect();
        per_channel.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let pending = posts
            .iter()
            .filter(|p| !insights.iter().any(|i| i.post_ref == p.url))
            .count();

        Ok(StoreCounts {
            posts: posts.len() as i64,
            insights: insights.len() as i64,
            pending: pending as i64,
            per_channel,
        })
    }
}
