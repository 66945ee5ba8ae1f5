//! Content source abstraction.
//!
//! A [`ContentSource`] lists the top items of a channel and answers a
//! per-channel availability probe. Implementations: [`crate::reddit::RedditSource`].

use anyhow::Result;
use async_trait::async_trait;
use std::fmt;

use signal_harvest_core::models::RawItem;

/// Outcome of probing a channel before listing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelStatus {
    Available,
    NotFound,
    Restricted,
    /// Quarantined or flagged as adult content.
    Sensitive,
    /// Zero subscribers.
    Empty,
    /// Transport failure while probing.
    Unreachable(String),
}

impl ChannelStatus {
    pub fn is_available(&self) -> bool {
        matches!(self, ChannelStatus::Available)
    }

    /// Expected conditions, as opposed to a transient network failure.
    pub fn is_expected(&self) -> bool {
        !matches!(self, ChannelStatus::Unreachable(_))
    }
}

impl fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelStatus::Available => f.write_str("available"),
            ChannelStatus::NotFound => f.write_str("not found"),
            ChannelStatus::Restricted => f.write_str("restricted"),
            ChannelStatus::Sensitive => f.write_str("sensitive"),
            ChannelStatus::Empty => f.write_str("empty"),
            ChannelStatus::Unreachable(reason) => write!(f, "unreachable: {}", reason),
        }
    }
}

#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Top items of `channel` over `window`, in source ranking order.
    /// Every call re-fetches.
    async fn list_top(&self, channel: &str, window: &str, limit: usize) -> Result<Vec<RawItem>>;

    /// Probe a channel. Never fails; transport errors become
    /// [`ChannelStatus::Unreachable`].
    async fn channel_status(&self, channel: &str) -> ChannelStatus;

    async fn is_channel_available(&self, channel: &str) -> bool {
        self.channel_status(channel).await.is_available()
    }
}
