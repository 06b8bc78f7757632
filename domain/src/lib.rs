//! Domain layer for chorus
//!
//! This crate contains the core entities and value objects of a group
//! discussion. It has no dependencies on infrastructure or presentation
//! concerns.
//!
//! # Core Concepts
//!
//! - **Session**: a group of [`Member`]s, an optional manager, a default
//!   [`DiscussionMode`] and the [`ContextLedger`] holding its history.
//! - **Round**: one run of a discussion protocol for a single user message.
//! - **Compaction**: folding an old history prefix into one summary message
//!   once the estimated token usage reaches the session's [`ThresholdRatio`].

pub mod config;
pub mod conversation;
pub mod core;
pub mod discussion;
pub mod member;
pub mod prompt;

// Re-export commonly used types
pub use config::{ConfigIssue, ConfigIssueCode, OutputFormat, Severity};
pub use conversation::{
    ContextLedger, ContextStats, FoldError, LedgerSnapshot, Message, MessageKind, NewMessage, Role,
    Seq,
};
pub use core::{
    error::ValidationError,
    model::{DEFAULT_CONTEXT_WINDOW, Model, ModelCatalog},
};
pub use discussion::{
    DEFAULT_THRESHOLD_RATIO, DiscussionEvent, DiscussionMode, Session, SessionId, StreamFrame,
    ThresholdRatio,
};
pub use member::{GenerationParams, Member, MemberId, Roster};
pub use prompt::{CONSENSUS_MARKER, PromptTemplate};
