//! Insight pipeline: runs extraction over a batch of stored posts.
//!
//! The batch is the oldest posts in scope that have no insight yet. Each
//! post is handled independently; a failed completion call or a failed
//! write is logged and counted, and the batch moves on.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

use signal_harvest_core::models::{ContentItem, Insight, Scope};
use signal_harvest_core::store::Store;

use crate::error::PipelineError;
use crate::extract::InsightExtractor;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightReport {
    pub examined: u64,
    pub created: u64,
    /// Posts that already had an insight.
    pub already_done: u64,
    /// Posts the model judged not worth an insight, or whose reply was malformed.
    pub no_insight: u64,
    pub failed: u64,
}

enum Outcome {
    Created,
    AlreadyDone,
    NoInsight,
    Failed,
}

pub struct InsightPipeline {
    store: Arc<dyn Store>,
    extractor: InsightExtractor,
    batch_size: usize,
}

impl InsightPipeline {
    pub fn new(store: Arc<dyn Store>, extractor: InsightExtractor, batch_size: usize) -> Self {
        Self {
            store,
            extractor,
            batch_size,
        }
    }

    /// Process up to `batch_size` pending posts in `scope`.
    ///
    /// # Errors
    ///
    /// Only fails when the batch itself cannot be read.
    pub async fn run(&self, scope: &Scope) -> Result<InsightReport, PipelineError> {
        let batch = self
            .store
            .pending_posts(scope, self.batch_size)
            .await
            .map_err(PipelineError::Store)?;

        let mut report = InsightReport::default();
        for post in &batch {
            report.examined += 1;
            match self.process(post).await {
                Outcome::Created => report.created += 1,
                Outcome::AlreadyDone => report.already_done += 1,
                Outcome::NoInsight => report.no_insight += 1,
                Outcome::Failed => report.failed += 1,
            }
        }

        tracing::info!(
            examined = report.examined,
            created = report.created,
            no_insight = report.no_insight,
            failed = report.failed,
            "insight run complete"
        );
        Ok(report)
    }

    async fn process(&self, post: &ContentItem) -> Outcome {
        match self.store.insight_exists(&post.url).await {
            Ok(true) => return Outcome::AlreadyDone,
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(url = %post.url, error = %e, "insight lookup failed");
                return Outcome::Failed;
            }
        }

        let draft = match self.extractor.extract(post).await {
            Ok(Some(draft)) => draft,
            Ok(None) => return Outcome::NoInsight,
            Err(e) => {
                tracing::warn!(url = %post.url, error = %e, "extraction failed");
                return Outcome::Failed;
            }
        };

        let insight = Insight::from_draft(draft, &post.url, Utc::now());
        match self.store.insert_insight(&insight).await {
            Ok(true) => {
                tracing::debug!(url = %post.url, sector = %insight.sector, "insight stored");
                Outcome::Created
            }
            Ok(false) => Outcome::AlreadyDone,
            Err(e) => {
                tracing::warn!(url = %post.url, error = %e, "failed to store insight");
                Outcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use signal_harvest_core::models::RawItem;
    use signal_harvest_core::store::memory::InMemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::completion::CompletionService;
    use crate::extract::ExtractorSettings;

    const GOOD: &str = r#"{"signal":"s","whyItMatters":"w","actionAngle":"a","sector":"Health","tone":"Curious","urgencyScore":7,"noveltyScore":6,"interestingScore":40}"#;

    struct Counting(AtomicUsize);

    #[async_trait]
    impl CompletionService for Counting {
        fn model_name(&self) -> &str {
            "counting"
        }
        async fn complete(&self, _prompt: &str, _temperature: f32) -> Result<String> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(GOOD.to_string())
        }
    }

    fn post(id: &str, scope: &Scope) -> ContentItem {
        let raw = RawItem {
            permalink: format!("/r/Biohackers/comments/{}/", id),
            title: "t".to_string(),
            body: "b".to_string(),
            created_at: Utc::now(),
            score: 1,
            is_text_post: true,
            is_pinned: false,
        };
        ContentItem::from_raw(&raw, "Biohackers", scope, "reddit.com", 5000)
    }

    #[tokio::test]
    async fn test_second_run_sends_nothing() {
        let store = Arc::new(InMemoryStore::new());
        store.insert_post(&post("1", &Scope::background())).await.unwrap();
        store.insert_post(&post("2", &Scope::background())).await.unwrap();

        let completion = Arc::new(Counting(AtomicUsize::new(0)));
        let extractor = InsightExtractor::new(
            completion.clone(),
            ExtractorSettings {
                temperature: 0.7,
                thresholds: None,
            },
        );
        let pipeline = InsightPipeline::new(store.clone(), extractor, 100);

        let first = pipeline.run(&Scope::background()).await.unwrap();
        assert_eq!(first.created, 2);
        let second = pipeline.run(&Scope::background()).await.unwrap();
        assert_eq!(second.examined, 0);
        assert_eq!(completion.0.load(Ordering::SeqCst), 2);
        assert_eq!(store.insights().len(), 2);
    }

    #[tokio::test]
    async fn test_batch_size_caps_examined_posts() {
        let store = Arc::new(InMemoryStore::new());
        for i in 0..5 {
            store
                .insert_post(&post(&i.to_string(), &Scope::background()))
                .await
                .unwrap();
        }
        let extractor = InsightExtractor::new(
            Arc::new(Counting(AtomicUsize::new(0))),
            ExtractorSettings {
                temperature: 0.7,
                thresholds: None,
            },
        );
        let pipeline = InsightPipeline::new(store.clone(), extractor, 3);

        let report = pipeline.run(&Scope::background()).await.unwrap();
        assert_eq!(report.examined, 3);
        let insights = store.insights();
        assert!(insights[0].post_ref.ends_with("/comments/0/"));
    }
}
