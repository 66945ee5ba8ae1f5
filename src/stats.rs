//! Database statistics.
//!
//! Used by `harvest stats`: post and insight counts, the insight backlog,
//! and a per-channel breakdown.

use anyhow::Result;
use std::fmt::Write as _;

use signal_harvest_core::store::{Store, StoreCounts};

use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::sqlite_store::SqliteStore;

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate::apply(&pool).await?;

    let last_ingest: Option<i64> = sqlx::query_scalar("SELECT MAX(ingested_at) FROM posts")
        .fetch_one(&pool)
        .await?;

    let store = SqliteStore::new(pool);
    let counts = store.counts().await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    print!(
        "{}",
        render_stats(&config.db.path.display().to_string(), db_size, &counts, last_ingest)
    );

    store.pool().close().await;
    Ok(())
}

fn render_stats(db_path: &str, db_size: u64, counts: &StoreCounts, last_ingest: Option<i64>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Signal Harvest: Database Stats");
    let _ = writeln!(out, "==============================");
    let _ = writeln!(out);
    let _ = writeln!(out, "  Database:    {}", db_path);
    let _ = writeln!(out, "  Size:        {}", format_bytes(db_size));
    let _ = writeln!(
        out,
        "  Last ingest: {}",
        last_ingest
            .map(format_ts_relative)
            .unwrap_or_else(|| "never".to_string())
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "  Posts:       {}", counts.posts);
    let _ = writeln!(out, "  Insights:    {}", counts.insights);
    let _ = writeln!(out, "  Pending:     {}", counts.pending);

    if !counts.per_channel.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "  By channel:");
        let _ = writeln!(out, "  {:<24} {:>6}", "CHANNEL", "POSTS");
        let _ = writeln!(out, "  {}", "-".repeat(31));
        for (channel, posts) in &counts.per_channel {
            let _ = writeln!(out, "  {:<24} {:>6}", channel, posts);
        }
    }

    let _ = writeln!(out);
    out
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format a Unix timestamp as a relative time string (e.g. "3 hours ago").
fn format_ts_relative(ts: i64) -> String {
    let delta = chrono::Utc::now().timestamp() - ts;

    if delta < 0 {
        format_ts_iso(ts)
    } else if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn test_render_lists_channels() {
        let counts = StoreCounts {
            posts: 12,
            insights: 4,
            pending: 8,
            per_channel: vec![("SaaS".to_string(), 9), ("ADHD".to_string(), 3)],
        };
        let text = render_stats("./data/harvest.sqlite", 4096, &counts, None);
        assert!(text.contains("Posts:       12"));
        assert!(text.contains("Pending:     8"));
        assert!(text.contains("Last ingest: never"));
        assert!(text.lines().any(|l| l.trim_start().starts_with("SaaS") && l.ends_with('9')));
    }

    #[test]
    fn test_relative_time() {
        let now = chrono::Utc::now().timestamp();
        assert_eq!(format_ts_relative(now), "just now");
        assert_eq!(format_ts_relative(now - 7200), "2 hours ago");
        assert_eq!(format_ts_relative(now - 86400), "1 day ago");
    }
}
