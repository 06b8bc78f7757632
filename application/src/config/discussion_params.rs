//! Discussion parameters: round loop control.
//!
//! [`DiscussionParams`] groups the static parameters that control how
//! [`DiscussionService`](crate::use_cases::service::DiscussionService) runs
//! rounds. These are application-layer concerns, not domain policy.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What `start_round` does when the session already has a round running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActiveRoundPolicy {
    /// Cancel the running round and wait for it to settle.
    #[default]
    Preempt,
    /// Refuse the new round.
    Reject,
}

impl std::str::FromStr for ActiveRoundPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "preempt" => Ok(ActiveRoundPolicy::Preempt),
            "reject" => Ok(ActiveRoundPolicy::Reject),
            other => Err(format!("unknown active round policy: {other}")),
        }
    }
}

/// Round loop control parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscussionParams {
    /// Passes over the roster in free mode when the caller gives none.
    pub default_max_rounds: usize,
    /// Display name used for the user's messages.
    pub user_name: String,
    /// Upper bound on a single model call.
    pub turn_timeout: Option<Duration>,
    /// Extra attempts for a turn that failed with a retryable error.
    pub turn_retries: usize,
    /// Pause between attempts.
    pub retry_delay: Duration,
    /// How long a new round waits for a cancelled one to finish.
    pub settle_timeout: Duration,
    /// Capacity of the engine and outbound event channels.
    pub event_buffer: usize,
    pub on_active_round: ActiveRoundPolicy,
}

impl Default for DiscussionParams {
    fn default() -> Self {
        Self {
            default_max_rounds: 1,
            user_name: "user".to_string(),
            turn_timeout: Some(Duration::from_secs(120)),
            turn_retries: 2,
            retry_delay: Duration::from_secs(1),
            settle_timeout: Duration::from_secs(5),
            event_buffer: 64,
            on_active_round: ActiveRoundPolicy::default(),
        }
    }
}

impl DiscussionParams {
    // ==================== Builder Methods ====================

    pub fn with_default_max_rounds(mut self, rounds: usize) -> Self {
        self.default_max_rounds = rounds.max(1);
        self
    }

    pub fn with_user_name(mut self, name: impl Into<String>) -> Self {
        self.user_name = name.into();
        self
    }

    pub fn with_turn_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.turn_timeout = timeout;
        self
    }

    pub fn with_turn_retries(mut self, retries: usize) -> Self {
        self.turn_retries = retries;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_settle_timeout(mut self, timeout: Duration) -> Self {
        self.settle_timeout = timeout;
        self
    }

    pub fn with_event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity.max(1);
        self
    }

    pub fn with_active_round_policy(mut self, policy: ActiveRoundPolicy) -> Self {
        self.on_active_round = policy;
        self
    }
}

/// Default bound on one summarizer call.
pub const DEFAULT_SUMMARIZE_TIMEOUT: Duration = Duration::from_secs(120);

/// When and how much history is compacted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionParams {
    /// Most recent messages that always stay verbatim.
    pub keep_recent: usize,
    /// Upper bound on a summarizer call; `None` waits forever.
    pub summarize_timeout: Option<Duration>,
}

impl Default for CompressionParams {
    fn default() -> Self {
        Self {
            keep_recent: 0,
            summarize_timeout: Some(DEFAULT_SUMMARIZE_TIMEOUT),
        }
    }
}

impl CompressionParams {
    pub fn with_keep_recent(mut self, keep: usize) -> Self {
        self.keep_recent = keep;
        self
    }

    pub fn with_summarize_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.summarize_timeout = timeout;
        self
    }
}
