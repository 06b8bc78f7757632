//! Offline model invoker.
//!
//! Answers every turn locally from the request itself, so discussions can be
//! run, streamed and compacted without any provider configured. Replies are
//! deterministic: the same history and member always produce the same text.

use async_trait::async_trait;
use chorus_application::ports::model_invoker::{
    Completion, ModelInvoker, ProviderError, TokenUsage, TurnRequest,
};
use chorus_domain::conversation::tokens;
use chorus_domain::core::string::{collapse_whitespace, truncate_chars};
use chorus_domain::{CONSENSUS_MARKER, DiscussionMode, Member, Role};
use std::time::Duration;

const TOPIC_CHARS: usize = 120;

pub struct LoopbackInvoker {
    latency: Duration,
    /// Members whose replies close a free-mode discussion early.
    agreeable: Vec<String>,
}

impl Default for LoopbackInvoker {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackInvoker {
    pub fn new() -> Self {
        Self {
            latency: Duration::ZERO,
            agreeable: Vec::new(),
        }
    }

    /// Simulated response time per call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Make `member` (by name) signal consensus whenever it speaks in free mode.
    pub fn with_agreeable(mut self, member: impl Into<String>) -> Self {
        self.agreeable.push(member.into());
        self
    }

    fn topic(request: &TurnRequest) -> String {
        let last_user = request
            .history
            .messages()
            .iter()
            .rev()
            .find(|m| m.role() == Role::User)
            .map(|m| m.content().to_string());
        let topic = last_user.unwrap_or_else(|| request.instruction.clone());
        truncate_chars(&collapse_whitespace(&topic), TOPIC_CHARS)
    }

    fn reply(&self, request: &TurnRequest, member: &Member) -> String {
        let topic = Self::topic(request);
        let heard = request
            .history
            .messages()
            .iter()
            .filter(|m| m.role() == Role::Assistant)
            .count();
        let voice = member
            .persona()
            .map(|p| format!(" ({})", truncate_chars(&collapse_whitespace(p), 40)))
            .unwrap_or_default();

        let body = match request.mode {
            DiscussionMode::Task => {
                let task = member.task().unwrap_or("the assignment");
                format!("Working on \"{task}\" for \"{topic}\".")
            }
            DiscussionMode::Qa => format!("My independent answer to \"{topic}\"."),
            DiscussionMode::Free | DiscussionMode::Leader if heard > 0 => {
                format!("Building on {heard} earlier contribution(s) about \"{topic}\".")
            }
            DiscussionMode::Free | DiscussionMode::Leader => {
                format!("Opening thoughts on \"{topic}\".")
            }
        };

        let mut content = format!("{}{}: {}", member.name(), voice, body);
        if request.mode == DiscussionMode::Free && self.agreeable.iter().any(|n| n == member.name()) {
            content.push(' ');
            content.push_str(CONSENSUS_MARKER);
        }
        content
    }
}

#[async_trait]
impl ModelInvoker for LoopbackInvoker {
    async fn invoke(&self, request: &TurnRequest, member: &Member) -> Result<Completion, ProviderError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let content = self.reply(request, member);
        let usage = TokenUsage {
            prompt_tokens: tokens::estimate_text(&request.system_prompt)
                + request.history.estimate_tokens()
                + tokens::estimate_text(&request.instruction),
            completion_tokens: tokens::estimate_text(&content),
        };
        Ok(Completion::text(content).with_usage(usage))
    }
}
