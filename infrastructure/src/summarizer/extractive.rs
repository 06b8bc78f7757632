//! Deterministic summarizer: no model call.
//!
//! Keeps the first sentence of every turn, prefixed by its speaker, and the
//! gist of any earlier summary. Output never exceeds `max_chars` characters.

use async_trait::async_trait;
use chorus_application::ports::summarizer::{Summarizer, SummarizerError};
use chorus_domain::core::string::{collapse_whitespace, truncate_chars};
use chorus_domain::{Message, MessageKind};

/// Longest sentence kept from a single turn.
const MAX_SENTENCE_CHARS: usize = 200;

pub struct ExtractiveSummarizer {
    max_chars: usize,
}

impl ExtractiveSummarizer {
    pub fn new(max_chars: usize) -> Self {
        Self {
            max_chars: max_chars.max(16),
        }
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    fn condense(&self, prefix: &[Message]) -> String {
        let mut lines: Vec<String> = Vec::new();
        let mut used = 0;

        for message in prefix {
            let line = match message.kind() {
                MessageKind::Summary => {
                    let earlier = collapse_whitespace(message.content());
                    format!("Earlier: {}", truncate_chars(&earlier, self.max_chars / 2))
                }
                MessageKind::Notice => continue,
                MessageKind::Turn => {
                    let sentence = first_sentence(message.content());
                    if sentence.is_empty() {
                        continue;
                    }
                    format!("{}: {}", message.sender(), sentence)
                }
            };

            used += line.chars().count() + 1;
            lines.push(line);
            if used >= self.max_chars {
                break;
            }
        }

        truncate_chars(&lines.join("\n"), self.max_chars)
    }
}

#[async_trait]
impl Summarizer for ExtractiveSummarizer {
    async fn summarize(&self, prefix: &[Message]) -> Result<String, SummarizerError> {
        let summary = self.condense(prefix);
        if summary.trim().is_empty() {
            return Err(SummarizerError::Empty);
        }
        Ok(summary)
    }
}

/// Text up to and including the first sentence terminator.
fn first_sentence(text: &str) -> String {
    let text = collapse_whitespace(text);
    let end = text
        .char_indices()
        .find(|(_, c)| matches!(c, '.' | '!' | '?' | '。' | '！' | '？'))
        .map_or(text.len(), |(i, c)| i + c.len_utf8());
    truncate_chars(&text[..end], MAX_SENTENCE_CHARS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chorus_domain::{ContextLedger, DiscussionMode, MemberId, NewMessage};

    fn ledger() -> ContextLedger {
        let mut ledger = ContextLedger::default();
        ledger.append(NewMessage::user(
            "user",
            "Should we adopt Rust? Our C++ service keeps crashing.",
            DiscussionMode::Free,
        ));
        ledger.append(NewMessage::assistant(
            "Alice",
            MemberId::new("a"),
            "Yes, the borrow checker prevents this class of bug. It costs ramp-up time.",
            DiscussionMode::Free,
        ));
        ledger.append(NewMessage::notice("Discussion interrupted.", Some(DiscussionMode::Free)));
        ledger.append(NewMessage::assistant(
            "Bob",
            MemberId::new("b"),
            "我同意。迁移需要计划。",
            DiscussionMode::Free,
        ));
        ledger
    }

    #[tokio::test]
    async fn test_keeps_first_sentence_per_turn() {
        let summarizer = ExtractiveSummarizer::new(1_000);
        let summary = summarizer.summarize(ledger().messages()).await.unwrap();

        assert_eq!(
            summary,
            "user: Should we adopt Rust?\nAlice: Yes, the borrow checker prevents this class of bug.\nBob: 我同意。"
        );
    }

    #[tokio::test]
    async fn test_never_exceeds_max_chars() {
        let summarizer = ExtractiveSummarizer::new(40);
        let summary = summarizer.summarize(ledger().messages()).await.unwrap();

        assert!(summary.chars().count() <= 40);
        assert!(summary.starts_with("user: Should we adopt Rust?"));
    }

    #[tokio::test]
    async fn test_folds_previous_summary() {
        let mut ledger = ledger();
        let last = ledger.last_seq().unwrap();
        ledger.fold(last, "Team leans towards Rust.".to_string()).unwrap();
        ledger.append(NewMessage::user("user", "Timeline?", DiscussionMode::Free));

        let mut prefix: Vec<Message> = ledger.summary().into_iter().cloned().collect();
        prefix.extend(ledger.unfolded().iter().cloned());
        let summary = ExtractiveSummarizer::new(500).summarize(&prefix).await.unwrap();

        assert_eq!(summary, "Earlier: Team leans towards Rust.\nuser: Timeline?");
    }

    #[tokio::test]
    async fn test_only_notices_is_empty() {
        let mut ledger = ContextLedger::default();
        ledger.append(NewMessage::notice("stopped", None));

        let err = ExtractiveSummarizer::new(100)
            .summarize(ledger.messages())
            .await
            .unwrap_err();
        assert_eq!(err, SummarizerError::Empty);
    }

    #[test]
    fn test_first_sentence_without_terminator() {
        assert_eq!(first_sentence("  no   terminator here "), "no terminator here");
    }
}
