//! Approximate token accounting.
//!
//! The estimate is a policy input for compression timing, not a provider
//! count. Every stat derived from it is flagged as approximate.

use super::message::Message;

/// Framing tokens charged once per message.
pub const MESSAGE_OVERHEAD: usize = 4;

/// Extra framing tokens charged when a message carries a sender name.
pub const SENDER_OVERHEAD: usize = 4;

/// Characters per token for non-CJK text.
const CHARS_PER_TOKEN: usize = 4;

fn is_dense_script(c: char) -> bool {
    matches!(c as u32,
        0x3040..=0x30FF      // hiragana, katakana
        | 0x3400..=0x4DBF    // CJK extension A
        | 0x4E00..=0x9FFF    // CJK unified ideographs
        | 0xAC00..=0xD7AF    // hangul syllables
        | 0xF900..=0xFAFF    // CJK compatibility ideographs
        | 0xFF00..=0xFFEF    // full-width forms
    )
}

/// Estimate tokens in free text: one per CJK character, one per four
/// other characters (rounded up).
pub fn estimate_text(text: &str) -> usize {
    let (dense, other) = text.chars().fold((0usize, 0usize), |(dense, other), c| {
        if is_dense_script(c) {
            (dense + 1, other)
        } else {
            (dense, other + 1)
        }
    });
    dense + other.div_ceil(CHARS_PER_TOKEN)
}

/// Estimate tokens for one message including framing overhead.
pub fn estimate_message(message: &Message) -> usize {
    let sender = if message.sender().is_empty() {
        0
    } else {
        estimate_text(message.sender()) + SENDER_OVERHEAD
    };
    estimate_text(message.content()) + sender + MESSAGE_OVERHEAD
}

pub fn estimate_messages<'a>(messages: impl IntoIterator<Item = &'a Message>) -> usize {
    messages.into_iter().map(estimate_message).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::message::{Message, NewMessage};
    use crate::discussion::mode::DiscussionMode;

    #[test]
    fn test_ascii_rounds_up() {
        assert_eq!(estimate_text(""), 0);
        assert_eq!(estimate_text("abcd"), 1);
        assert_eq!(estimate_text("abcde"), 2);
    }

    #[test]
    fn test_cjk_counts_per_character() {
        assert_eq!(estimate_text("你好世界"), 4);
        assert_eq!(estimate_text("こんにちは"), 5);
        assert_eq!(estimate_text("hi你好"), 3);
    }

    #[test]
    fn test_message_overhead() {
        let message = Message::stamp(1, NewMessage::user("bob", "abcd", DiscussionMode::Free));
        // content 1 + sender (1 + 4) + framing 4
        assert_eq!(estimate_message(&message), 10);
    }

    #[test]
    fn test_estimate_is_deterministic() {
        let text = "The quick brown fox 跳过 the lazy dog";
        assert_eq!(estimate_text(text), estimate_text(text));
    }
}
