//! Reddit content source.
//!
//! Implements [`ContentSource`] over Reddit's JSON API:
//!
//! - `GET /r/{channel}/about.json`: availability probe
//! - `GET /r/{channel}/top.json?t={window}&limit={n}&raw_json=1`: top listing,
//!   following the `after` cursor until `limit` items are collected
//!
//! When `REDDIT_CLIENT_ID` and `REDDIT_CLIENT_SECRET` are set, requests go
//! to `source.oauth_base_url` with an application-only bearer token
//! (client-credentials grant). Otherwise the public endpoints under
//! `source.base_url` are used.
//!
//! HTTP 429 and 5xx are retried with exponential backoff (1s, 2s, 4s, ...)
//! up to `source.max_retries`; other statuses are returned to the caller.

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use signal_harvest_core::models::RawItem;

use crate::config::SourceConfig;
use crate::source::{ChannelStatus, ContentSource};

/// Largest page Reddit serves per listing request.
const MAX_PAGE_SIZE: usize = 100;

/// Tokens are refreshed this long before they expire.
const TOKEN_SLACK: Duration = Duration::from_secs(60);

struct Credentials {
    client_id: String,
    client_secret: String,
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

pub struct RedditSource {
    client: reqwest::Client,
    base_url: String,
    oauth_base_url: String,
    max_retries: u32,
    credentials: Option<Credentials>,
    token: Mutex<Option<CachedToken>>,
}

impl RedditSource {
    /// Build a source from config, picking up OAuth credentials from the
    /// environment when both are present.
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let credentials = match (
            std::env::var("REDDIT_CLIENT_ID"),
            std::env::var("REDDIT_CLIENT_SECRET"),
        ) {
            (Ok(client_id), Ok(client_secret))
                if !client_id.is_empty() && !client_secret.is_empty() =>
            {
                Some(Credentials {
                    client_id,
                    client_secret,
                })
            }
            _ => None,
        };
        Self::build(config, credentials)
    }

    /// Build a source that only uses the public endpoints.
    pub fn anonymous(config: &SourceConfig) -> Result<Self> {
        Self::build(config, None)
    }

    fn build(config: &SourceConfig, credentials: Option<Credentials>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        tracing::debug!(
            oauth = credentials.is_some(),
            "reddit source configured"
        );

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            oauth_base_url: config.oauth_base_url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
            credentials,
            token: Mutex::new(None),
        })
    }

    fn api_base(&self) -> &str {
        if self.credentials.is_some() {
            &self.oauth_base_url
        } else {
            &self.base_url
        }
    }

    /// Current bearer token, fetching a fresh one when the cache is empty
    /// or about to expire.
    async fn bearer_token(&self) -> Result<Option<String>> {
        let Some(creds) = &self.credentials else {
            return Ok(None);
        };

        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() + TOKEN_SLACK < token.expires_at {
                return Ok(Some(token.access_token.clone()));
            }
        }

        let response = self
            .client
            .post(format!("{}/api/v1/access_token", self.base_url))
            .basic_auth(&creds.client_id, Some(&creds.client_secret))
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body("grant_type=client_credentials")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Reddit token request failed {}: {}", status, body_text);
        }

        let token: TokenResponse = response.json().await?;
        let access_token = token.access_token.clone();
        *cached = Some(CachedToken {
            access_token: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        });
        tracing::debug!(expires_in = token.expires_in, "refreshed reddit token");

        Ok(Some(access_token))
    }

    /// GET `{api_base}{path}` with retry on 429/5xx and network errors.
    /// Any other status is handed back to the caller.
    async fn get(&self, path: &str) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.api_base(), path);
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tracing::debug!(%url, attempt, delay_secs = delay.as_secs(), "retrying reddit request");
                tokio::time::sleep(delay).await;
            }

            let mut request = self.client.get(&url);
            if let Some(token) = self.bearer_token().await? {
                request = request.bearer_auth(token);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                        last_err = Some(anyhow::anyhow!("Reddit API error {} for {}", status, url));
                        continue;
                    }
                    return Ok(response);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Reddit request failed after retries")))
    }
}

#[async_trait]
impl ContentSource for RedditSource {
    async fn list_top(&self, channel: &str, window: &str, limit: usize) -> Result<Vec<RawItem>> {
        let mut items = Vec::with_capacity(limit);
        let mut after: Option<String> = None;

        while items.len() < limit {
            let page_size = (limit - items.len()).min(MAX_PAGE_SIZE);
            let mut path = format!(
                "/r/{}/top.json?t={}&limit={}&raw_json=1",
                channel, window, page_size
            );
            if let Some(cursor) = &after {
                path.push_str("&after=");
                path.push_str(cursor);
            }

            let response = self.get(&path).await?;
            let status = response.status();
            if !status.is_success() {
                bail!("Reddit listing r/{} failed with {}", channel, status);
            }

            let listing: Listing = response.json().await?;
            let page = parse_listing(listing)?;
            let exhausted = page.items.is_empty() || page.after.is_none();
            items.extend(page.items);
            after = page.after;

            if exhausted {
                break;
            }
        }

        items.truncate(limit);
        Ok(items)
    }

    async fn channel_status(&self, channel: &str) -> ChannelStatus {
        let response = match self.get(&format!("/r/{}/about.json", channel)).await {
            Ok(response) => response,
            Err(e) => return ChannelStatus::Unreachable(e.to_string()),
        };

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return ChannelStatus::NotFound;
        }
        if status == StatusCode::FORBIDDEN {
            return ChannelStatus::Restricted;
        }
        if !status.is_success() {
            return ChannelStatus::Unreachable(format!("HTTP {}", status));
        }

        match response.json::<serde_json::Value>().await {
            Ok(json) => classify_about(&json),
            Err(e) => ChannelStatus::Unreachable(e.to_string()),
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_token_lifetime")]
    expires_in: u64,
}

fn default_token_lifetime() -> u64 {
    3600
}

#[derive(Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Thing>,
    after: Option<String>,
}

#[derive(Deserialize)]
struct Thing {
    kind: String,
    data: serde_json::Value,
}

#[derive(Deserialize)]
struct PostData {
    permalink: String,
    title: String,
    #[serde(default)]
    selftext: String,
    created_utc: f64,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    is_self: bool,
    #[serde(default)]
    stickied: bool,
    #[serde(default)]
    pinned: bool,
}

struct Page {
    items: Vec<RawItem>,
    after: Option<String>,
}

fn parse_listing(listing: Listing) -> Result<Page> {
    let mut items = Vec::with_capacity(listing.data.children.len());

    for thing in listing.data.children {
        if thing.kind != "t3" {
            continue;
        }
        let post: PostData = serde_json::from_value(thing.data)?;
        let created_at = DateTime::<Utc>::from_timestamp(post.created_utc as i64, 0)
            .ok_or_else(|| anyhow::anyhow!("invalid created_utc {}", post.created_utc))?;

        items.push(RawItem {
            permalink: post.permalink,
            title: post.title,
            body: post.selftext,
            created_at,
            score: post.score,
            is_text_post: post.is_self,
            is_pinned: post.stickied || post.pinned,
        });
    }

    Ok(Page {
        items,
        after: listing.data.after.filter(|a| !a.is_empty()),
    })
}

fn classify_about(json: &serde_json::Value) -> ChannelStatus {
    if json.get("kind").and_then(|k| k.as_str()) != Some("t5") {
        return ChannelStatus::NotFound;
    }
    let Some(data) = json.get("data") else {
        return ChannelStatus::NotFound;
    };

    let flag = |key: &str| data.get(key).and_then(|v| v.as_bool()).unwrap_or(false);

    match data.get("subreddit_type").and_then(|t| t.as_str()) {
        Some("public") | Some("restricted") | Some("archived") | None => {}
        Some(_) => return ChannelStatus::Restricted,
    }
    if flag("quarantine") || flag("over18") {
        return ChannelStatus::Sensitive;
    }
    if data.get("subscribers").and_then(|s| s.as_i64()) == Some(0) {
        return ChannelStatus::Empty;
    }

    ChannelStatus::Available
}
