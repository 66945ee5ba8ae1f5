//! CLI command implementations.
//!
//! Each command opens the database, builds only the components it needs,
//! runs once, and prints a report to stdout.

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;

use signal_harvest_core::models::Scope;

use crate::completion::create_completion;
use crate::config::Config;
use crate::db;
use crate::extract::{ExtractorSettings, InsightExtractor};
use crate::harvest::{Harvester, RunReport};
use crate::ingest::{IngestReport, IngestSettings, IngestionPipeline};
use crate::insights::{InsightPipeline, InsightReport};
use crate::migrate;
use crate::reddit::RedditSource;
use crate::retention::{RetentionSweeper, SweepReport};
use crate::sqlite_store::SqliteStore;

async fn open_store(config: &Config) -> Result<Arc<SqliteStore>> {
    let pool = db::connect(config).await?;
    migrate::apply(&pool).await?;
    Ok(Arc::new(SqliteStore::new(pool)))
}

/// Scope from optional CLI flags. A query without a user is rejected.
pub fn scope_from_flags(query: Option<String>, user: Option<String>) -> Result<Scope> {
    let scope = Scope::custom(query.unwrap_or_default(), user.unwrap_or_default());
    if scope.query().is_some() && scope.user_id().is_none() {
        anyhow::bail!("--query requires --user");
    }
    Ok(scope)
}

pub async fn run_ingest(
    config: &Config,
    channels: Vec<String>,
    query: Option<String>,
    user: Option<String>,
) -> Result<()> {
    let scope = scope_from_flags(query, user)?;
    let channels = if channels.is_empty() {
        config.ingest.channels.clone()
    } else {
        channels
    };

    let store = open_store(config).await?;
    let source = Arc::new(RedditSource::new(&config.source)?);
    let pipeline = IngestionPipeline::new(source, store.clone(), IngestSettings::from_config(config));

    let report = pipeline.run(&channels, &scope).await?;
    print_ingest(&report);

    store.pool().close().await;
    Ok(())
}

pub async fn run_insights(
    config: &Config,
    query: Option<String>,
    user: Option<String>,
) -> Result<()> {
    let scope = scope_from_flags(query, user)?;

    let store = open_store(config).await?;
    let completion = create_completion(&config.completion)?;
    let extractor = InsightExtractor::new(
        completion,
        ExtractorSettings::from_config(&config.extraction),
    );
    let pipeline = InsightPipeline::new(store.clone(), extractor, config.extraction.batch_size);

    let report = pipeline.run(&scope).await?;
    print_insights(&report);

    store.pool().close().await;
    Ok(())
}

pub async fn run_sweep(config: &Config) -> Result<()> {
    let store = open_store(config).await?;
    let sweeper = RetentionSweeper::new(store.clone(), config.retention.days);

    let report = sweeper.sweep(Utc::now()).await?;
    print_sweep(&report);

    store.pool().close().await;
    Ok(())
}

/// Full background run: sweep, ingest the configured channels, extract.
pub async fn run_background(config: &Config) -> Result<()> {
    let store = open_store(config).await?;
    let harvester = Harvester::from_config(config, store.clone())?;

    let report = harvester.run_background().await?;
    print_run(&report);

    store.pool().close().await;
    Ok(())
}

pub async fn run_discover(config: &Config, query: &str) -> Result<()> {
    let completion = create_completion(&config.completion)?;
    let discovery = crate::discover::ChannelDiscovery::new(completion, config.discovery.clone());

    for channel in discovery.discover(query).await {
        println!("{}", channel);
    }
    Ok(())
}

fn print_ingest(report: &IngestReport) {
    println!("Ingest complete:");
    println!("  inserted: {}", report.inserted_count);
    println!("  scraped:  {}", report.scraped_channels.join(", "));
    if !report.skipped_channels.is_empty() {
        println!("  skipped:  {}", report.skipped_channels.join(", "));
    }
}

fn print_insights(report: &InsightReport) {
    println!("Insights complete:");
    println!("  examined:   {}", report.examined);
    println!("  created:    {}", report.created);
    println!("  no insight: {}", report.no_insight);
    println!("  failed:     {}", report.failed);
}

fn print_sweep(report: &SweepReport) {
    println!("Sweep complete:");
    println!("  posts deleted:    {}", report.posts_deleted);
    println!("  insights deleted: {}", report.insights_deleted + report.orphans_deleted);
}

fn print_run(report: &RunReport) {
    match &report.sweep {
        Some(sweep) => print_sweep(sweep),
        None => println!("Sweep failed (see log)"),
    }
    print_ingest(&report.ingest);
    match &report.insights {
        Some(insights) => print_insights(insights),
        None => println!("Insight run failed (see log)"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_from_flags() {
        assert!(scope_from_flags(None, None).unwrap().is_background());
        let scope = scope_from_flags(Some("focus".into()), Some("u1".into())).unwrap();
        assert_eq!(scope.query(), Some("focus"));
        assert_eq!(scope.user_id(), Some("u1"));
        assert!(scope_from_flags(None, Some("u1".into())).unwrap().query().is_none());
        assert!(scope_from_flags(Some("focus".into()), None).is_err());
    }
}
