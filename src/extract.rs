//! Insight extraction for a single post.
//!
//! One completion call per post. The reply is decoded by
//! [`signal_harvest_core::decode::decode_insight`]; malformed replies and
//! "no insight" replies both come back as `Ok(None)`. Only a transport
//! failure of the completion call is an error.

use std::sync::Arc;

use signal_harvest_core::decode::{decode_insight, passes_thresholds, Decoded};
use signal_harvest_core::models::{ContentItem, InsightDraft};
use signal_harvest_core::prompt::build_extraction_prompt;

use crate::completion::CompletionService;
use crate::config::ExtractionConfig;
use crate::error::ExtractionError;

/// Longest slice of a malformed reply written to the log.
const LOGGED_REPLY_CHARS: usize = 500;

#[derive(Debug, Clone)]
pub struct ExtractorSettings {
    pub temperature: f32,
    /// `Some((min_novelty, min_urgency))` to drop low-value replies locally.
    pub thresholds: Option<(u8, u8)>,
}

impl ExtractorSettings {
    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self {
            temperature: config.temperature,
            thresholds: config
                .enforce_thresholds
                .then_some((config.min_novelty, config.min_urgency)),
        }
    }
}

pub struct InsightExtractor {
    completion: Arc<dyn CompletionService>,
    settings: ExtractorSettings,
}

impl InsightExtractor {
    pub fn new(completion: Arc<dyn CompletionService>, settings: ExtractorSettings) -> Self {
        Self {
            completion,
            settings,
        }
    }

    pub async fn extract(&self, item: &ContentItem) -> Result<Option<InsightDraft>, ExtractionError> {
        let prompt = build_extraction_prompt(item);
        let reply = self
            .completion
            .complete(&prompt, self.settings.temperature)
            .await
            .map_err(ExtractionError::Transport)?;

        match decode_insight(&reply) {
            Decoded::Insight(draft) => {
                if let Some((min_novelty, min_urgency)) = self.settings.thresholds {
                    if !passes_thresholds(&draft, min_novelty, min_urgency) {
                        tracing::info!(
                            url = %item.url,
                            novelty = draft.novelty_score,
                            urgency = draft.urgency_score,
                            "insight below thresholds, dropped"
                        );
                        return Ok(None);
                    }
                }
                Ok(Some(draft))
            }
            Decoded::Skip => {
                tracing::debug!(url = %item.url, "model returned no insight");
                Ok(None)
            }
            Decoded::Malformed { raw, reason } => {
                tracing::warn!(
                    url = %item.url,
                    %reason,
                    reply = %signal_harvest_core::models::truncate_chars(&raw, LOGGED_REPLY_CHARS),
                    "malformed model output"
                );
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::Utc;
    use signal_harvest_core::models::Sector;

    struct Canned(String);

    #[async_trait]
    impl CompletionService for Canned {
        fn model_name(&self) -> &str {
            "canned"
        }
        async fn complete(&self, _prompt: &str, _temperature: f32) -> Result<String> {
            Ok(self.0.clone())
        }
    }

    fn post() -> ContentItem {
        ContentItem {
            id: "1".to_string(),
            url: "https://reddit.com/r/SaaS/comments/1/".to_string(),
            title: "Churn is killing us".to_string(),
            content: "Any tips?".to_string(),
            channel: "SaaS".to_string(),
            source: "reddit".to_string(),
            created_at: Utc::now(),
            score: 10,
            scope_query: None,
            scope_user_id: None,
        }
    }

    fn reply(novelty: u8, urgency: u8) -> String {
        format!(
            r#"```json
{{"signal":"s","whyItMatters":"w","actionAngle":"a","sector":"SaaS","tone":"Frustrated","urgencyScore":{},"noveltyScore":{},"interestingScore":70}}
```"#,
            urgency, novelty
        )
    }

    fn extractor(text: &str, enforce: bool) -> InsightExtractor {
        InsightExtractor::new(
            Arc::new(Canned(text.to_string())),
            ExtractorSettings {
                temperature: 0.7,
                thresholds: enforce.then_some((3, 5)),
            },
        )
    }

    #[tokio::test]
    async fn test_fenced_reply_is_decoded() {
        let draft = extractor(&reply(6, 8), true).extract(&post()).await.unwrap().unwrap();
        assert_eq!(draft.sector, Sector::SaaS);
        assert_eq!(draft.urgency_score, 8);
    }

    #[tokio::test]
    async fn test_prose_reply_is_no_insight() {
        let result = extractor("Sure! Here's the analysis: ...", true)
            .extract(&post())
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_null_reply_is_no_insight() {
        assert!(extractor("null", true).extract(&post()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_threshold_enforcement_is_configurable() {
        let text = reply(2, 9);
        assert!(extractor(&text, true).extract(&post()).await.unwrap().is_none());

        let kept = extractor(&text, false).extract(&post()).await.unwrap().unwrap();
        assert_eq!(kept.novelty_score, 2);
    }

    #[tokio::test]
    async fn test_transport_failure_is_an_error() {
        let extractor = InsightExtractor::new(
            Arc::new(crate::completion::DisabledCompletion),
            ExtractorSettings::from_config(&ExtractionConfig::default()),
        );
        let err = extractor.extract(&post()).await.unwrap_err();
        assert!(matches!(err, ExtractionError::Transport(_)));
    }
}
