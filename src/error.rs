//! Pipeline-visible error types.
//!
//! Everything that is recovered locally (an unavailable channel, a
//! malformed model reply, a failed insight write) is logged and counted
//! instead of surfacing here.

use thiserror::Error;

/// Terminal failures of an ingestion run.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("no channels requested")]
    NoChannels,

    #[error("all sources unavailable: {}", .channels.join(", "))]
    AllSourcesFailed { channels: Vec<String> },

    #[error("store error: {0}")]
    Store(anyhow::Error),
}

/// Failure of a single extraction call.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("completion transport error: {0}")]
    Transport(anyhow::Error),
}
