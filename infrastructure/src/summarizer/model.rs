//! Summarizer that asks a model (normally the session manager) to condense
//! old history.

use async_trait::async_trait;
use chorus_application::ports::model_invoker::{ModelInvoker, TurnRequest};
use chorus_application::ports::summarizer::{Summarizer, SummarizerError};
use chorus_domain::{ContextLedger, Member, Message, MessageKind, PromptTemplate};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

pub struct ModelSummarizer<M: ModelInvoker + 'static> {
    invoker: Arc<M>,
    speaker: Member,
    attempts: u32,
    retry_delay: Duration,
    attempt_timeout: Option<Duration>,
}

impl<M: ModelInvoker + 'static> ModelSummarizer<M> {
    pub fn new(invoker: Arc<M>, speaker: Member) -> Self {
        Self {
            invoker,
            speaker,
            attempts: DEFAULT_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
            attempt_timeout: None,
        }
    }

    /// Bound each model call; an attempt that runs out counts as a
    /// retryable failure.
    pub fn with_attempt_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    fn request(&self, prefix: &[Message]) -> TurnRequest {
        let transcript = prefix
            .iter()
            .filter(|m| m.kind() != MessageKind::Notice)
            .map(|m| format!("{}: {}", m.sender(), m.content()))
            .collect::<Vec<_>>()
            .join("\n\n");
        TurnRequest {
            system_prompt: PromptTemplate::compaction_system().to_string(),
            history: ContextLedger::default().snapshot(),
            instruction: PromptTemplate::compaction_turn(&transcript),
            mode: prefix.iter().rev().find_map(Message::mode).unwrap_or_default(),
        }
    }
}

#[async_trait]
impl<M: ModelInvoker + 'static> Summarizer for ModelSummarizer<M> {
    async fn summarize(&self, prefix: &[Message]) -> Result<String, SummarizerError> {
        let request = self.request(prefix);
        let mut last_error = SummarizerError::Empty;

        for attempt in 1..=self.attempts {
            let call = self.invoker.invoke(&request, &self.speaker);
            let result = match self.attempt_timeout {
                Some(limit) => match tokio::time::timeout(limit, call).await {
                    Ok(result) => result,
                    Err(_) => {
                        warn!("Summary attempt {}/{} timed out", attempt, self.attempts);
                        last_error = SummarizerError::TimedOut(limit);
                        if attempt < self.attempts {
                            tokio::time::sleep(self.retry_delay).await;
                        }
                        continue;
                    }
                },
                None => call.await,
            };
            match result {
                Ok(completion) if !completion.content.trim().is_empty() => {
                    debug!(
                        "{} condensed {} message(s) on attempt {}",
                        self.speaker.name(),
                        prefix.len(),
                        attempt
                    );
                    return Ok(completion.content.trim().to_string());
                }
                Ok(_) => {
                    warn!("Summary attempt {}/{} came back empty", attempt, self.attempts);
                    last_error = SummarizerError::Empty;
                }
                Err(e) => {
                    warn!("Summary attempt {}/{} failed: {}", attempt, self.attempts, e);
                    let retryable = e.retryable;
                    last_error = SummarizerError::Unavailable(e.message);
                    if !retryable {
                        break;
                    }
                }
            }
            if attempt < self.attempts {
                tokio::time::sleep(self.retry_delay).await;
            }
        }

        Err(last_error)
    }
}
