//! Text completion service abstraction and implementations.
//!
//! Defines the [`CompletionService`] trait and concrete implementations:
//! - **[`DisabledCompletion`]**: always fails, used when `completion.provider = "disabled"`.
//! - **[`OpenAiCompletion`]**: calls the OpenAI chat completions API with retry and backoff.
//!
//! Use [`create_completion`] to instantiate the configured service.
//!
//! # Retry Strategy
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::CompletionConfig;

/// Prompt in, free text out. The service offers no schema enforcement;
/// callers decode and validate the reply themselves.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Model identifier, for logging.
    fn model_name(&self) -> &str;

    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String>;
}

/// Build the completion service named by `config.provider`.
pub fn create_completion(config: &CompletionConfig) -> Result<Arc<dyn CompletionService>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledCompletion)),
        "openai" => Ok(Arc::new(OpenAiCompletion::new(config)?)),
        other => bail!("Unknown completion provider: {}", other),
    }
}

// ============ Disabled ============

pub struct DisabledCompletion;

#[async_trait]
impl CompletionService for DisabledCompletion {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn complete(&self, _prompt: &str, _temperature: f32) -> Result<String> {
        bail!("Completion provider is disabled")
    }
}

// ============ OpenAI ============

/// Completion service using `POST {base_url}/chat/completions`.
///
/// Requires the `OPENAI_API_KEY` environment variable.
pub struct OpenAiCompletion {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    max_retries: u32,
}

impl OpenAiCompletion {
    /// # Errors
    ///
    /// Returns an error if `OPENAI_API_KEY` is not in the environment or
    /// the HTTP client cannot be built.
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: &CompletionConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl CompletionService for OpenAiCompletion {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": temperature,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tracing::debug!(attempt, delay_secs = delay.as_secs(), "retrying completion");
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return parse_chat_response(&json);
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(anyhow::anyhow!(
                            "OpenAI API error {}: {}",
                            status,
                            body_text
                        ));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    bail!("OpenAI API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Completion failed after retries")))
    }
}

/// Extract `choices[0].message.content`. A `null` content is returned as
/// an empty string so the decoder treats it as "no insight".
fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    let message = json
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing choices[0].message"))?;

    match message.get("content") {
        Some(serde_json::Value::String(text)) => Ok(text.clone()),
        Some(serde_json::Value::Null) | None => Ok(String::new()),
        Some(other) => bail!("Invalid OpenAI response: unexpected content {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chat_response_content() {
        let json = serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "{\"signal\":\"x\"}" } }]
        });
        assert_eq!(parse_chat_response(&json).unwrap(), "{\"signal\":\"x\"}");
    }

    #[test]
    fn test_parse_chat_response_null_content() {
        let json = serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": null } }]
        });
        assert_eq!(parse_chat_response(&json).unwrap(), "");
    }

    #[test]
    fn test_parse_chat_response_missing_choices() {
        let json = serde_json::json!({ "error": "nope" });
        assert!(parse_chat_response(&json).is_err());
    }

    #[tokio::test]
    async fn test_disabled_completion_fails() {
        let config = CompletionConfig {
            provider: "disabled".to_string(),
            ..CompletionConfig::default()
        };
        let service = create_completion(&config).unwrap();
        assert_eq!(service.model_name(), "disabled");
        assert!(service.complete("prompt", 0.7).await.is_err());
    }
}
