//! Compression trigger
//!
//! Decides from ledger state whether history must be compacted and, when it
//! must, asks the [`Summarizer`] for the condensed text. Compaction folds
//! everything past the current marker (minus the most recent `keep_recent`
//! messages) together with the previous summary into one new summary.
//!
//! Work is split into [`CompressionTrigger::plan`] (sync, under the session
//! lock), the summarizer call (async, lock released) and
//! [`CompressionTrigger::apply`] (sync, under the lock again).

use crate::config::CompressionParams;
use crate::ports::summarizer::{Summarizer, SummarizerError};
use chorus_domain::{ContextLedger, Message, Seq, ThresholdRatio};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A compaction that should run: fold `prefix` into a summary through `through`.
///
/// `marker` is the ledger's compression marker when the plan was made; a plan
/// only applies to a ledger still at that marker.
#[derive(Debug, Clone)]
pub struct CompactionPlan {
    pub through: Seq,
    pub marker: Option<Seq>,
    pub prefix: Vec<Message>,
    pub tokens_before: usize,
}

/// Result of [`CompressionTrigger::maybe_compress`].
#[derive(Debug)]
pub enum CompressionOutcome {
    /// Below threshold or nothing left to fold.
    Skipped,
    /// The replacement ledger with the prefix folded into one summary.
    Compacted(Box<ContextLedger>),
    /// The summarizer failed; the ledger is unchanged.
    Failed(SummarizerError),
}

impl CompressionOutcome {
    pub fn is_compacted(&self) -> bool {
        matches!(self, CompressionOutcome::Compacted(_))
    }
}

/// Figures reported after a compaction was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactionReport {
    pub through: Seq,
    pub tokens_before: usize,
    pub tokens_after: usize,
}

pub struct CompressionTrigger {
    summarizer: Arc<dyn Summarizer>,
    params: CompressionParams,
}

impl CompressionTrigger {
    pub fn new(summarizer: Arc<dyn Summarizer>, params: CompressionParams) -> Self {
        Self { summarizer, params }
    }

    /// Decide whether `ledger` needs compaction at `threshold`.
    pub fn plan(&self, ledger: &ContextLedger, threshold: ThresholdRatio) -> Option<CompactionPlan> {
        let estimate = ledger.estimate_tokens();
        if !threshold.is_reached(estimate, ledger.max_tokens()) {
            return None;
        }

        let unfolded = ledger.unfolded();
        let foldable = unfolded.len().saturating_sub(self.params.keep_recent);
        if foldable == 0 {
            debug!(
                "Context at {}/{} tokens but nothing past the marker to fold",
                estimate,
                ledger.max_tokens()
            );
            return None;
        }

        let folded = &unfolded[..foldable];
        let through = folded.last()?.seq();
        let prefix = ledger
            .summary()
            .into_iter()
            .chain(folded)
            .cloned()
            .collect();

        Some(CompactionPlan {
            through,
            marker: ledger.compressed_through(),
            prefix,
            tokens_before: estimate,
        })
    }

    /// Ask the summarizer for the plan's condensed text, giving up after
    /// the configured timeout.
    pub async fn summarize(&self, plan: &CompactionPlan) -> Result<String, SummarizerError> {
        let call = self.summarizer.summarize(&plan.prefix);
        let summary = match self.params.summarize_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| SummarizerError::TimedOut(limit))??,
            None => call.await?,
        };
        if summary.trim().is_empty() {
            return Err(SummarizerError::Empty);
        }
        Ok(summary)
    }

    /// Fold `summary` into `ledger` as planned.
    ///
    /// Returns `None` and leaves the ledger alone when the plan is stale (the
    /// marker moved since planning) or when the summary would not strictly
    /// lower the estimate. Appends after planning are fine: they sit past
    /// `plan.through` and stay verbatim.
    pub fn apply(
        &self,
        ledger: &mut ContextLedger,
        plan: &CompactionPlan,
        summary: String,
    ) -> Option<CompactionReport> {
        if ledger.compressed_through() != plan.marker {
            warn!(
                "Discarding stale compaction plan: marker moved from {:?} to {:?}",
                plan.marker,
                ledger.compressed_through()
            );
            return None;
        }

        let tokens_before = ledger.estimate_tokens();
        match ledger.fold(plan.through, summary) {
            Ok(_) => {
                let report = CompactionReport {
                    through: plan.through,
                    tokens_before,
                    tokens_after: ledger.estimate_tokens(),
                };
                info!(
                    "Compacted history through #{}: {} -> {} tokens (approx.)",
                    report.through, report.tokens_before, report.tokens_after
                );
                Some(report)
            }
            Err(e) => {
                warn!("Discarding compaction: {}", e);
                None
            }
        }
    }

    /// Compact a copy of `ledger` if its usage reached `threshold`.
    ///
    /// Summarizer failures are non-fatal: they are reported as
    /// [`CompressionOutcome::Failed`] and the caller keeps its ledger.
    pub async fn maybe_compress(
        &self,
        ledger: &ContextLedger,
        threshold: ThresholdRatio,
    ) -> CompressionOutcome {
        let Some(plan) = self.plan(ledger, threshold) else {
            return CompressionOutcome::Skipped;
        };
        match self.summarize(&plan).await {
            Ok(summary) => {
                let mut replacement = ledger.clone();
                match self.apply(&mut replacement, &plan, summary) {
                    Some(_) => CompressionOutcome::Compacted(Box::new(replacement)),
                    None => CompressionOutcome::Skipped,
                }
            }
            Err(e) => {
                warn!("Compression skipped, summarizer failed: {}", e);
                CompressionOutcome::Failed(e)
            }
        }
    }
}
