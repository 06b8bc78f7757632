//! Events streamed while a round runs

use super::mode::DiscussionMode;
use crate::conversation::{ContextStats, Seq};
use crate::member::MemberId;
use serde::{Deserialize, Serialize};

/// One observable step of a round. Transient: streamed, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DiscussionEvent {
    /// A message was appended to the ledger (member turn or engine notice).
    Message {
        sender: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sender_id: Option<MemberId>,
        content: String,
        mode: DiscussionMode,
        seq: Seq,
        /// Roster position of the sender, for aggregating concurrent output.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        slot: Option<usize>,
    },
    /// A member's turn failed. Nothing was appended for it.
    Error {
        sender: String,
        message: String,
        retryable: bool,
    },
    /// Ledger usage; token counts are estimates.
    Stats {
        current_tokens: usize,
        max_tokens: usize,
        threshold_ratio: f64,
        approximate: bool,
    },
}

impl DiscussionEvent {
    pub fn stats(stats: &ContextStats) -> Self {
        DiscussionEvent::Stats {
            current_tokens: stats.current_tokens,
            max_tokens: stats.max_tokens,
            threshold_ratio: stats.threshold_ratio,
            approximate: stats.approximate,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            DiscussionEvent::Message { .. } => "message",
            DiscussionEvent::Error { .. } => "error",
            DiscussionEvent::Stats { .. } => "stats",
        }
    }

    pub fn sender(&self) -> Option<&str> {
        match self {
            DiscussionEvent::Message { sender, .. } | DiscussionEvent::Error { sender, .. } => {
                Some(sender)
            }
            DiscussionEvent::Stats { .. } => None,
        }
    }

    pub fn is_stats(&self) -> bool {
        matches!(self, DiscussionEvent::Stats { .. })
    }
}

/// An event as delivered to a consumer, numbered in emission order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamFrame {
    pub index: u64,
    #[serde(flatten)]
    pub event: DiscussionEvent,
}

impl StreamFrame {
    pub fn new(index: u64, event: DiscussionEvent) -> Self {
        Self { index, event }
    }

    /// One JSON object on a single line.
    pub fn to_json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// A server-sent-events `data:` record.
    pub fn to_sse(&self) -> serde_json::Result<String> {
        Ok(format!("data: {}\n\n", self.to_json_line()?))
    }
}
