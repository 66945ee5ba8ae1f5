//! Retention sweep.
//!
//! Deletes posts and insights older than the retention horizon, then any
//! insight whose post is gone, so insights never outlive their source.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;

use signal_harvest_core::store::Store;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub posts_deleted: u64,
    pub insights_deleted: u64,
    pub orphans_deleted: u64,
}

pub struct RetentionSweeper {
    store: Arc<dyn Store>,
    horizon: Duration,
}

impl RetentionSweeper {
    pub fn new(store: Arc<dyn Store>, days: i64) -> Self {
        Self {
            store,
            horizon: Duration::days(days),
        }
    }

    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.horizon
    }

    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let cutoff = self.cutoff(now);

        let report = SweepReport {
            posts_deleted: self.store.delete_posts_before(cutoff).await?,
            insights_deleted: self.store.delete_insights_before(cutoff).await?,
            orphans_deleted: self.store.delete_orphaned_insights().await?,
        };

        tracing::info!(
            %cutoff,
            posts = report.posts_deleted,
            insights = report.insights_deleted,
            orphans = report.orphans_deleted,
            "retention sweep complete"
        );
        Ok(report)
    }
}
