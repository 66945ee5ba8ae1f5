//! Core data models used throughout Signal Harvest.
//!
//! These types represent the posts and insights that flow through the
//! ingestion and extraction pipeline.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Source tag for posts ingested by the background channel sweep.
pub const BACKGROUND_SOURCE: &str = "reddit";

/// Source tag for posts ingested on behalf of a user query.
pub const CUSTOM_SOURCE: &str = "custom";

/// Raw item produced by a content source before normalization.
#[derive(Debug, Clone)]
pub struct RawItem {
    pub permalink: String,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub score: i64,
    pub is_text_post: bool,
    pub is_pinned: bool,
}

/// Optional (query, user) pair narrowing ingestion and extraction.
///
/// An empty scope means the default background sweep. Blank strings are
/// normalized to `None` so `""` and "absent" never diverge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    pub query: Option<String>,
    pub user_id: Option<String>,
}

impl Scope {
    pub fn background() -> Self {
        Self::default()
    }

    pub fn custom(query: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            query: non_blank(query.into()),
            user_id: non_blank(user_id.into()),
        }
    }

    /// Scope covering every item ingested for a user, across queries.
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            query: None,
            user_id: non_blank(user_id.into()),
        }
    }

    pub fn is_background(&self) -> bool {
        self.query.is_none() && self.user_id.is_none()
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Source tag for items ingested under this scope.
    pub fn source_tag(&self) -> &'static str {
        if self.is_background() {
            BACKGROUND_SOURCE
        } else {
            CUSTOM_SOURCE
        }
    }
}

fn non_blank(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// A persisted post. Written once by ingestion, never updated.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    pub id: String,
    pub url: String,
    pub title: String,
    pub content: String,
    pub channel: String,
    pub source: String,
    pub created_at: DateTime<Utc>,
    pub score: i64,
    pub scope_query: Option<String>,
    pub scope_user_id: Option<String>,
}

impl ContentItem {
    /// Normalize a raw item into a storable post.
    ///
    /// The URL is canonicalized to `https://{host}{permalink}` and the body
    /// is truncated to `max_chars` characters.
    pub fn from_raw(
        raw: &RawItem,
        channel: &str,
        scope: &Scope,
        canonical_host: &str,
        max_chars: usize,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            url: canonical_url(canonical_host, &raw.permalink),
            title: raw.title.clone(),
            content: truncate_chars(&raw.body, max_chars),
            channel: channel.to_string(),
            source: scope.source_tag().to_string(),
            created_at: raw.created_at,
            score: raw.score,
            scope_query: scope.query.clone(),
            scope_user_id: scope.user_id.clone(),
        }
    }
}

/// Build the canonical URL for a permalink.
pub fn canonical_url(host: &str, permalink: &str) -> String {
    let host = host.trim_end_matches('/');
    if permalink.starts_with('/') {
        format!("https://{}{}", host, permalink)
    } else {
        format!("https://{}/{}", host, permalink)
    }
}

/// Truncate to at most `max_chars` characters (not bytes).
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// Closed set of market sectors an insight can be filed under.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sector {
    SaaS,
    Ecommerce,
    #[serde(rename = "Creator Tools")]
    CreatorTools,
    Health,
    AI,
    Education,
    Finance,
    Consumer,
    Other,
}

impl Sector {
    pub const ALL: [Sector; 9] = [
        Sector::SaaS,
        Sector::Ecommerce,
        Sector::CreatorTools,
        Sector::Health,
        Sector::AI,
        Sector::Education,
        Sector::Finance,
        Sector::Consumer,
        Sector::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Sector::SaaS => "SaaS",
            Sector::Ecommerce => "Ecommerce",
            Sector::CreatorTools => "Creator Tools",
            Sector::Health => "Health",
            Sector::AI => "AI",
            Sector::Education => "Education",
            Sector::Finance => "Finance",
            Sector::Consumer => "Consumer",
            Sector::Other => "Other",
        }
    }
}

impl fmt::Display for Sector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Sector::ALL
            .iter()
            .copied()
            .find(|sector| sector.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("unknown sector: {}", wanted))
    }
}

/// Closed set of tones the author of a post can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tone {
    Curious,
    Frustrated,
    Excited,
    Reflective,
    Skeptical,
    Hopeful,
    Sarcastic,
}

impl Tone {
    pub const ALL: [Tone; 7] = [
        Tone::Curious,
        Tone::Frustrated,
        Tone::Excited,
        Tone::Reflective,
        Tone::Skeptical,
        Tone::Hopeful,
        Tone::Sarcastic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tone::Curious => "Curious",
            Tone::Frustrated => "Frustrated",
            Tone::Excited => "Excited",
            Tone::Reflective => "Reflective",
            Tone::Skeptical => "Skeptical",
            Tone::Hopeful => "Hopeful",
            Tone::Sarcastic => "Sarcastic",
        }
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Tone::ALL
            .iter()
            .copied()
            .find(|tone| tone.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("unknown tone: {}", wanted))
    }
}

/// The validated fields of a model reply, before it is tied to a post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsightDraft {
    pub signal: String,
    pub why_it_matters: String,
    pub action_angle: String,
    pub sector: Sector,
    pub tone: Tone,
    pub urgency_score: u8,
    pub novelty_score: u8,
    pub interesting_score: u8,
}

/// A persisted insight, at most one per post URL.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Insight {
    pub id: String,
    pub post_ref: String,
    pub signal: String,
    pub why_it_matters: String,
    pub action_angle: String,
    pub sector: Sector,
    pub tone: Tone,
    pub urgency_score: u8,
    pub novelty_score: u8,
    pub interesting_score: u8,
    pub created_at: DateTime<Utc>,
}

impl Insight {
    pub fn from_draft(draft: InsightDraft, post_ref: &str, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            post_ref: post_ref.to_string(),
            signal: draft.signal,
            why_it_matters: draft.why_it_matters,
            action_angle: draft.action_angle,
            sector: draft.sector,
            tone: draft.tone,
            urgency_score: draft.urgency_score,
            novelty_score: draft.novelty_score,
            interesting_score: draft.interesting_score,
            created_at,
        }
    }
}
