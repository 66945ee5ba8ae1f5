//! Ingestion pipeline.
//!
//! Walks the requested channels in order: probe → list top items →
//! filter → normalize → dedup → insert. A failing channel is recorded as
//! skipped and never stops the walk; only a run where every channel was
//! skipped and nothing was inserted fails as a whole.

use serde::Serialize;
use std::sync::Arc;

use signal_harvest_core::decode::is_valid_channel_name;
use signal_harvest_core::models::{ContentItem, Scope};
use signal_harvest_core::store::Store;

use crate::config::Config;
use crate::dedup::Deduplicator;
use crate::error::PipelineError;
use crate::source::ContentSource;

/// Listing and normalization parameters for one pipeline.
#[derive(Debug, Clone)]
pub struct IngestSettings {
    pub window: String,
    pub limit: usize,
    pub max_content_chars: usize,
    pub canonical_host: String,
}

impl IngestSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            window: config.ingest.window.clone(),
            limit: config.ingest.limit,
            max_content_chars: config.ingest.max_content_chars,
            canonical_host: config.source.canonical_host.clone(),
        }
    }
}

/// Per-run outcome. `scraped_channels` is every requested channel not in
/// `skipped_channels`, in request order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub inserted_count: u64,
    pub skipped_channels: Vec<String>,
    pub scraped_channels: Vec<String>,
}

pub struct IngestionPipeline {
    source: Arc<dyn ContentSource>,
    store: Arc<dyn Store>,
    dedup: Deduplicator,
    settings: IngestSettings,
}

impl IngestionPipeline {
    pub fn new(
        source: Arc<dyn ContentSource>,
        store: Arc<dyn Store>,
        settings: IngestSettings,
    ) -> Self {
        Self {
            source,
            dedup: Deduplicator::new(store.clone()),
            store,
            settings,
        }
    }

    /// Ingest `channels` under `scope`.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::NoChannels`] for an empty channel list.
    /// - [`PipelineError::AllSourcesFailed`] when every channel was skipped
    ///   and nothing was inserted.
    pub async fn run(
        &self,
        channels: &[String],
        scope: &Scope,
    ) -> Result<IngestReport, PipelineError> {
        if channels.is_empty() {
            return Err(PipelineError::NoChannels);
        }

        let mut report = IngestReport::default();

        for channel in channels {
            match self.ingest_channel(channel, scope).await {
                Some(inserted) => {
                    report.inserted_count += inserted;
                    report.scraped_channels.push(channel.clone());
                }
                None => report.skipped_channels.push(channel.clone()),
            }
        }

        if report.inserted_count == 0 && report.scraped_channels.is_empty() {
            tracing::error!(
                channels = %report.skipped_channels.join(","),
                "all sources unavailable"
            );
            return Err(PipelineError::AllSourcesFailed {
                channels: report.skipped_channels,
            });
        }

        tracing::info!(
            inserted = report.inserted_count,
            scraped = report.scraped_channels.len(),
            skipped = report.skipped_channels.len(),
            scope_query = scope.query().unwrap_or(""),
            scope_user = scope.user_id().unwrap_or(""),
            "ingestion complete"
        );
        Ok(report)
    }

    /// Ingest one channel. `None` means the channel was skipped.
    async fn ingest_channel(&self, channel: &str, scope: &Scope) -> Option<u64> {
        // Malformed names never reach a request path.
        if !is_valid_channel_name(channel) {
            tracing::info!(%channel, "invalid channel name, skipping");
            return None;
        }

        let status = self.source.channel_status(channel).await;
        if !status.is_available() {
            if status.is_expected() {
                tracing::info!(%channel, %status, "skipping channel");
            } else {
                tracing::warn!(%channel, %status, "channel probe failed, skipping");
            }
            return None;
        }

        let items = match self
            .source
            .list_top(channel, &self.settings.window, self.settings.limit)
            .await
        {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(%channel, error = %e, "listing failed, skipping channel");
                return None;
            }
        };

        let mut inserted = 0;
        for raw in items.iter().filter(|r| r.is_text_post && !r.is_pinned) {
            let post = ContentItem::from_raw(
                raw,
                channel,
                scope,
                &self.settings.canonical_host,
                self.settings.max_content_chars,
            );
            if self.insert_if_new(&post, scope).await {
                inserted += 1;
            }
        }

        tracing::debug!(%channel, fetched = items.len(), inserted, "channel ingested");
        Some(inserted)
    }

    async fn insert_if_new(&self, post: &ContentItem, scope: &Scope) -> bool {
        match self.dedup.exists(&post.url, scope.query()).await {
            Ok(true) => {
                tracing::debug!(url = %post.url, "duplicate post");
                return false;
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(url = %post.url, error = %e, "dedup check failed, skipping post");
                return false;
            }
        }

        match self.store.insert_post(post).await {
            Ok(written) => {
                if !written {
                    tracing::debug!(url = %post.url, "post inserted concurrently");
                }
                written
            }
            Err(e) => {
                tracing::warn!(url = %post.url, error = %e, "failed to store post");
                false
            }
        }
    }
}
