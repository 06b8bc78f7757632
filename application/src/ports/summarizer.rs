//! Summarizer port
//!
//! The engine decides *when* history is compacted; what the condensed text
//! says is up to the summarizer behind this trait.

use async_trait::async_trait;
use chorus_domain::Message;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SummarizerError {
    #[error("Summarizer unavailable: {0}")]
    Unavailable(String),

    #[error("Summarizer returned an empty summary")]
    Empty,

    #[error("Summarizer did not answer within {0:?}")]
    TimedOut(Duration),
}

/// Condenses a history prefix into a single text.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Summarize `prefix`, which may start with an earlier summary.
    async fn summarize(&self, prefix: &[Message]) -> Result<String, SummarizerError>;
}
