//! Model invocation port
//!
//! Defines how the engine obtains a single member's reply. Provider clients
//! (authentication, HTTP, streaming) live behind this trait in the
//! infrastructure layer.

use async_trait::async_trait;
use chorus_domain::{DiscussionMode, LedgerSnapshot, Member};
use std::time::Duration;
use thiserror::Error;

/// A single member call failed.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct ProviderError {
    /// Whether trying the same call again may succeed (rate limit, timeout).
    pub retryable: bool,
    pub message: String,
}

impl ProviderError {
    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            retryable: true,
            message: message.into(),
        }
    }

    pub fn terminal(message: impl Into<String>) -> Self {
        Self {
            retryable: false,
            message: message.into(),
        }
    }

    pub fn timeout(after: Duration) -> Self {
        Self::retryable(format!("no response within {}s", after.as_secs_f32()))
    }
}

/// Provider-reported token usage for one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TokenUsage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
}

/// A member's reply.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Completion {
    pub content: String,
    /// Exact usage when the provider reports it. Logged, not used for budgeting.
    pub usage: Option<TokenUsage>,
    /// The provider signalled that the discussion should end.
    pub consensus: bool,
}

impl Completion {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            usage: None,
            consensus: false,
        }
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }

    pub fn with_consensus(mut self) -> Self {
        self.consensus = true;
        self
    }
}

/// Everything a member needs to produce one turn.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub system_prompt: String,
    /// Active context at the moment the turn was scheduled.
    pub history: LedgerSnapshot,
    /// Mode-specific instruction for this turn.
    pub instruction: String,
    pub mode: DiscussionMode,
}

/// Port for invoking one member's model
#[async_trait]
pub trait ModelInvoker: Send + Sync {
    /// Produce `member`'s reply to `request`.
    async fn invoke(&self, request: &TurnRequest, member: &Member) -> Result<Completion, ProviderError>;
}
