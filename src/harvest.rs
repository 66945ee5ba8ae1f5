//! Pipeline orchestration.
//!
//! A [`Harvester`] owns the injected store, content source and completion
//! service, and wires them into the ingestion, insight, retention and
//! discovery components. The CLI and the HTTP server both drive it.

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

use signal_harvest_core::models::{Insight, Scope};
use signal_harvest_core::store::{Store, StoreCounts};

use crate::completion::{self, CompletionService};
use crate::config::Config;
use crate::discover::ChannelDiscovery;
use crate::error::PipelineError;
use crate::extract::{ExtractorSettings, InsightExtractor};
use crate::ingest::{IngestReport, IngestSettings, IngestionPipeline};
use crate::insights::{InsightPipeline, InsightReport};
use crate::reddit::RedditSource;
use crate::retention::{RetentionSweeper, SweepReport};
use crate::source::ContentSource;

/// Outcome of one end-to-end run.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    /// `None` when the sweep failed; the run continues regardless.
    pub sweep: Option<SweepReport>,
    pub ingest: IngestReport,
    /// `None` when the insight batch could not be read.
    pub insights: Option<InsightReport>,
}

pub struct Harvester {
    store: Arc<dyn Store>,
    background_channels: Vec<String>,
    ingestion: IngestionPipeline,
    insights: InsightPipeline,
    sweeper: RetentionSweeper,
    discovery: ChannelDiscovery,
}

impl Harvester {
    pub fn new(
        config: &Config,
        store: Arc<dyn Store>,
        source: Arc<dyn ContentSource>,
        completion: Arc<dyn CompletionService>,
    ) -> Self {
        let extractor = InsightExtractor::new(
            completion.clone(),
            ExtractorSettings::from_config(&config.extraction),
        );

        Self {
            ingestion: IngestionPipeline::new(
                source.clone(),
                store.clone(),
                IngestSettings::from_config(config),
            ),
            insights: InsightPipeline::new(store.clone(), extractor, config.extraction.batch_size),
            sweeper: RetentionSweeper::new(store.clone(), config.retention.days),
            discovery: ChannelDiscovery::new(completion, config.discovery.clone()),
            background_channels: config.ingest.channels.clone(),
            store,
        }
    }

    /// Build a harvester over the Reddit source and the configured
    /// completion provider.
    pub fn from_config(config: &Config, store: Arc<dyn Store>) -> Result<Self> {
        let source: Arc<dyn ContentSource> = Arc::new(RedditSource::new(&config.source)?);
        let completion = completion::create_completion(&config.completion)?;
        tracing::info!(model = completion.model_name(), "completion service ready");
        Ok(Self::new(config, store, source, completion))
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub async fn ingest(
        &self,
        channels: &[String],
        scope: &Scope,
    ) -> Result<IngestReport, PipelineError> {
        self.ingestion.run(channels, scope).await
    }

    pub async fn extract_insights(&self, scope: &Scope) -> Result<InsightReport, PipelineError> {
        self.insights.run(scope).await
    }

    pub async fn sweep(&self) -> Result<SweepReport> {
        self.sweeper.sweep(Utc::now()).await
    }

    pub async fn discover(&self, query: &str) -> Vec<String> {
        self.discovery.discover(query).await
    }

    pub async fn recent_insights(&self, scope: &Scope, limit: usize) -> Result<Vec<Insight>> {
        self.store.recent_insights(scope, limit).await
    }

    pub async fn counts(&self) -> Result<StoreCounts> {
        self.store.counts().await
    }

    /// Sweep, ingest `channels` under `scope`, then extract insights for
    /// the same scope.
    ///
    /// # Errors
    ///
    /// Only ingestion failures are returned. A failed sweep or insight
    /// run is logged and reported as `None`.
    pub async fn run_request(
        &self,
        scope: &Scope,
        channels: &[String],
    ) -> Result<RunReport, PipelineError> {
        let sweep = match self.sweep().await {
            Ok(report) => Some(report),
            Err(e) => {
                tracing::warn!(error = %e, "retention sweep failed");
                None
            }
        };

        let ingest = self.ingest(channels, scope).await?;

        let insights = match self.extract_insights(scope).await {
            Ok(report) => Some(report),
            Err(e) => {
                tracing::warn!(error = %e, "insight run failed");
                None
            }
        };

        Ok(RunReport {
            sweep,
            ingest,
            insights,
        })
    }

    /// [`run_request`](Self::run_request) over the configured background
    /// channels with an empty scope.
    pub async fn run_background(&self) -> Result<RunReport, PipelineError> {
        self.run_request(&Scope::background(), &self.background_channels)
            .await
    }
}
