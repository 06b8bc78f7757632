//! Context ledger: the session's message log and its token accounting.
//!
//! The log is append-only and positions are gapless. Compaction never
//! rewrites the log; it records a marker (`compressed_through`) and a
//! summary message. The *active context* handed to models is the summary
//! followed by every message logged after the marker.

use super::message::{Message, NewMessage, Seq};
use super::tokens;
use crate::core::model::DEFAULT_CONTEXT_WINDOW;
use crate::discussion::threshold::ThresholdRatio;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Token usage of a ledger. The token figures are heuristic estimates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextStats {
    pub current_tokens: usize,
    pub max_tokens: usize,
    pub threshold_ratio: f64,
    pub threshold_tokens: usize,
    pub message_count: usize,
    pub compressed_through: Option<Seq>,
    pub approximate: bool,
}

impl ContextStats {
    pub fn usage_ratio(&self) -> f64 {
        if self.max_tokens == 0 {
            return 0.0;
        }
        self.current_tokens as f64 / self.max_tokens as f64
    }
}

/// Immutable view of the active context at one point in time.
///
/// Cheap to clone; concurrent turns share one snapshot.
#[derive(Debug, Clone)]
pub struct LedgerSnapshot {
    messages: Arc<[Message]>,
    estimate: usize,
    compressed_through: Option<Seq>,
    last_seq: Option<Seq>,
}

impl LedgerSnapshot {
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn estimate_tokens(&self) -> usize {
        self.estimate
    }

    pub fn compressed_through(&self) -> Option<Seq> {
        self.compressed_through
    }

    pub fn last_seq(&self) -> Option<Seq> {
        self.last_seq
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Reasons a fold request is refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FoldError {
    #[error("fold point {through} is not after the current marker")]
    NotAdvancing { through: Seq },
    #[error("fold point {through} is beyond the last message {last:?}")]
    OutOfRange { through: Seq, last: Option<Seq> },
    #[error("summary would not shrink the context ({before} -> {after} tokens)")]
    NotSmaller { before: usize, after: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextLedger {
    log: Vec<Message>,
    compressed_through: Option<Seq>,
    summary: Option<Message>,
    max_tokens: usize,
    threshold: ThresholdRatio,
    #[serde(skip)]
    estimate: usize,
}

impl Default for ContextLedger {
    fn default() -> Self {
        Self::new(DEFAULT_CONTEXT_WINDOW, ThresholdRatio::default())
    }
}

impl ContextLedger {
    pub fn new(max_tokens: usize, threshold: ThresholdRatio) -> Self {
        Self {
            log: Vec::new(),
            compressed_through: None,
            summary: None,
            max_tokens,
            threshold,
            estimate: 0,
        }
    }

    // ==================== Mutation ====================

    /// Append a message, assigning it the next position.
    pub fn append(&mut self, draft: NewMessage) -> Message {
        let seq = self.next_seq();
        let message = Message::stamp(seq, draft);
        self.estimate += tokens::estimate_message(&message);
        self.log.push(message.clone());
        message
    }

    /// Replace the active prefix up to and including `through` with one
    /// summary message and recompute the estimate.
    ///
    /// The fold only happens when it strictly lowers the estimate; otherwise
    /// the ledger is left as it was.
    pub fn fold(&mut self, through: Seq, summary: impl Into<String>) -> Result<Message, FoldError> {
        if self.compressed_through.is_some_and(|marker| through <= marker) {
            return Err(FoldError::NotAdvancing { through });
        }
        let last = self.last_seq();
        if last.is_none_or(|last| through > last) || through == 0 {
            return Err(FoldError::OutOfRange { through, last });
        }

        let summary = Message::summary(through, summary);
        let before = tokens::estimate_messages(self.summary.iter().chain(self.unfolded()));
        // Positions are gapless from 1, so everything after `through` starts at that index.
        let after = tokens::estimate_message(&summary)
            + tokens::estimate_messages(&self.log[through as usize..]);
        if after >= before {
            return Err(FoldError::NotSmaller { before, after });
        }

        self.compressed_through = Some(through);
        self.summary = Some(summary.clone());
        self.estimate = after;
        Ok(summary)
    }

    pub fn set_max_tokens(&mut self, max_tokens: usize) {
        self.max_tokens = max_tokens;
    }

    /// Change the compaction threshold. Takes effect at the next check; the
    /// estimate and marker are untouched.
    pub fn set_threshold(&mut self, threshold: ThresholdRatio) {
        self.threshold = threshold;
    }

    /// Rebuild cached state after deserialization.
    pub fn recompute_estimate(&mut self) {
        self.estimate = tokens::estimate_messages(self.summary.iter().chain(self.unfolded()));
    }

    // ==================== Queries ====================

    pub fn estimate_tokens(&self) -> usize {
        self.estimate
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    pub fn threshold(&self) -> ThresholdRatio {
        self.threshold
    }

    pub fn compressed_through(&self) -> Option<Seq> {
        self.compressed_through
    }

    pub fn summary(&self) -> Option<&Message> {
        self.summary.as_ref()
    }

    /// The full append-only log.
    pub fn messages(&self) -> &[Message] {
        &self.log
    }

    /// The last `limit` messages of the log.
    pub fn tail(&self, limit: usize) -> &[Message] {
        let start = self.log.len().saturating_sub(limit);
        &self.log[start..]
    }

    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    pub fn last_seq(&self) -> Option<Seq> {
        self.log.last().map(Message::seq)
    }

    pub fn next_seq(&self) -> Seq {
        self.last_seq().map_or(1, |seq| seq + 1)
    }

    /// Messages logged after the compaction marker.
    pub fn unfolded(&self) -> &[Message] {
        // Positions start at 1 and are gapless, so seq N sits at index N-1.
        let start = self.compressed_through.map_or(0, |seq| seq as usize);
        &self.log[start.min(self.log.len())..]
    }

    /// Summary (if any) followed by the unfolded messages.
    pub fn active_context(&self) -> Vec<Message> {
        self.summary
            .iter()
            .chain(self.unfolded())
            .cloned()
            .collect()
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            messages: self.active_context().into(),
            estimate: self.estimate,
            compressed_through: self.compressed_through,
            last_seq: self.last_seq(),
        }
    }

    pub fn is_over_threshold(&self) -> bool {
        self.threshold.is_reached(self.estimate, self.max_tokens)
    }

    pub fn stats(&self) -> ContextStats {
        ContextStats {
            current_tokens: self.estimate,
            max_tokens: self.max_tokens,
            threshold_ratio: self.threshold.value(),
            threshold_tokens: self.threshold.tokens_for(self.max_tokens),
            message_count: self.log.len(),
            compressed_through: self.compressed_through,
            approximate: true,
        }
    }
}
