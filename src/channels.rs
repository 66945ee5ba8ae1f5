use anyhow::Result;

use crate::config::Config;
use crate::reddit::RedditSource;
use crate::source::{ChannelStatus, ContentSource};

/// Probe each channel in order.
pub async fn probe_channels(
    source: &dyn ContentSource,
    channels: &[String],
) -> Vec<(String, ChannelStatus)> {
    let mut statuses = Vec::with_capacity(channels.len());
    for channel in channels {
        statuses.push((channel.clone(), source.channel_status(channel).await));
    }
    statuses
}

pub async fn list_channels(config: &Config) -> Result<()> {
    let source = RedditSource::new(&config.source)?;
    let statuses = probe_channels(&source, &config.ingest.channels).await;

    println!("{:<24} {:<10} STATUS", "CHANNEL", "AVAILABLE");
    for (channel, status) in &statuses {
        println!("{:<24} {:<10} {}", channel, status.is_available(), status);
    }

    let available = statuses.iter().filter(|(_, s)| s.is_available()).count();
    println!();
    println!("{} of {} channels available", available, statuses.len());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use signal_harvest_core::models::RawItem;

    struct Fixed;

    #[async_trait]
    impl ContentSource for Fixed {
        async fn list_top(&self, _: &str, _: &str, _: usize) -> Result<Vec<RawItem>> {
            Ok(Vec::new())
        }
        async fn channel_status(&self, channel: &str) -> ChannelStatus {
            match channel {
                "startups" => ChannelStatus::Available,
                "private_club" => ChannelStatus::Restricted,
                _ => ChannelStatus::Unreachable("timeout".to_string()),
            }
        }
    }

    #[tokio::test]
    async fn test_probe_keeps_order() {
        let channels: Vec<String> = ["private_club", "startups", "flaky"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let statuses = probe_channels(&Fixed, &channels).await;
        assert_eq!(statuses[0], ("private_club".to_string(), ChannelStatus::Restricted));
        assert_eq!(statuses[1].1, ChannelStatus::Available);
        assert!(!statuses[2].1.is_expected());
        assert!(Fixed.is_channel_available("startups").await);
        assert!(!Fixed.is_channel_available("private_club").await);
    }
}
