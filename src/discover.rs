//! Channel discovery for free-text queries.
//!
//! Asks the completion service for the channels most relevant to a query
//! and decodes the reply as a strict JSON array. Any failure yields the
//! configured fallback list.

use std::sync::Arc;

use signal_harvest_core::decode::decode_channel_list;
use signal_harvest_core::prompt::build_discovery_prompt;

use crate::completion::CompletionService;
use crate::config::DiscoveryConfig;

pub struct ChannelDiscovery {
    completion: Arc<dyn CompletionService>,
    config: DiscoveryConfig,
}

impl ChannelDiscovery {
    pub fn new(completion: Arc<dyn CompletionService>, config: DiscoveryConfig) -> Self {
        Self { completion, config }
    }

    pub fn fallback(&self) -> Vec<String> {
        self.config.fallback_channels.clone()
    }

    /// Channels to search for `query`. Never empty.
    pub async fn discover(&self, query: &str) -> Vec<String> {
        let prompt = build_discovery_prompt(query, self.config.count);

        let reply = match self
            .completion
            .complete(&prompt, self.config.temperature)
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(%query, error = %e, "channel discovery failed, using fallback");
                return self.fallback();
            }
        };

        match decode_channel_list(&reply, self.config.count) {
            Some(channels) => {
                tracing::info!(%query, channels = %channels.join(","), "discovered channels");
                channels
            }
            None => {
                tracing::warn!(%query, %reply, "unusable discovery reply, using fallback");
                self.fallback()
            }
        }
    }
}
