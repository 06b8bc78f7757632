//! Conversation messages

use crate::discussion::mode::DiscussionMode;
use crate::member::MemberId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Position of a message in a session's log. Starts at 1 and has no gaps.
pub type Seq = u64;

/// Sender name carried by compaction summaries.
pub const SUMMARY_SENDER: &str = "history summary";

/// Sender name carried by engine notices.
pub const SYSTEM_SENDER: &str = "system";

/// Role of a message in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// What produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// A user message or a member's reply.
    #[default]
    Turn,
    /// An engine notice, such as an interruption or a consensus stop.
    Notice,
    /// A synthetic message standing in for a compacted prefix.
    Summary,
}

/// A message that has not been appended yet, so it has no position.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub role: Role,
    pub sender: String,
    pub sender_id: Option<MemberId>,
    pub content: String,
    pub mode: Option<DiscussionMode>,
    pub kind: MessageKind,
}

impl NewMessage {
    pub fn user(sender: impl Into<String>, content: impl Into<String>, mode: DiscussionMode) -> Self {
        Self {
            role: Role::User,
            sender: sender.into(),
            sender_id: None,
            content: content.into(),
            mode: Some(mode),
            kind: MessageKind::Turn,
        }
    }

    pub fn assistant(
        sender: impl Into<String>,
        sender_id: MemberId,
        content: impl Into<String>,
        mode: DiscussionMode,
    ) -> Self {
        Self {
            role: Role::Assistant,
            sender: sender.into(),
            sender_id: Some(sender_id),
            content: content.into(),
            mode: Some(mode),
            kind: MessageKind::Turn,
        }
    }

    pub fn notice(content: impl Into<String>, mode: Option<DiscussionMode>) -> Self {
        Self {
            role: Role::System,
            sender: SYSTEM_SENDER.to_string(),
            sender_id: None,
            content: content.into(),
            mode,
            kind: MessageKind::Notice,
        }
    }
}

/// An appended message (Entity). Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    seq: Seq,
    role: Role,
    sender: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sender_id: Option<MemberId>,
    content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mode: Option<DiscussionMode>,
    #[serde(default)]
    kind: MessageKind,
    created_at: DateTime<Utc>,
}

impl Message {
    pub(crate) fn stamp(seq: Seq, draft: NewMessage) -> Self {
        Self {
            seq,
            role: draft.role,
            sender: draft.sender,
            sender_id: draft.sender_id,
            content: draft.content,
            mode: draft.mode,
            kind: draft.kind,
            created_at: Utc::now(),
        }
    }

    /// Synthetic summary covering everything up to and including `through`.
    pub(crate) fn summary(through: Seq, content: impl Into<String>) -> Self {
        Self {
            seq: through,
            role: Role::System,
            sender: SUMMARY_SENDER.to_string(),
            sender_id: None,
            content: content.into(),
            mode: None,
            kind: MessageKind::Summary,
            created_at: Utc::now(),
        }
    }

    pub fn seq(&self) -> Seq {
        self.seq
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn sender_id(&self) -> Option<&MemberId> {
        self.sender_id.as_ref()
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn mode(&self) -> Option<DiscussionMode> {
        self.mode
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_summary(&self) -> bool {
        self.kind == MessageKind::Summary
    }
}
