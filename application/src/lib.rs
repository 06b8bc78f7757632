//! Application layer for chorus
//!
//! This crate contains use cases, port definitions, and application configuration.
//! It depends only on the domain layer.

pub mod config;
pub mod ports;
pub mod use_cases;

// Re-export commonly used types
pub use config::{ActiveRoundPolicy, CompressionParams, DiscussionParams};
pub use ports::{
    conversation_logger::{ConversationEvent, ConversationLogger, NoConversationLogger},
    model_invoker::{Completion, ModelInvoker, ProviderError, TokenUsage, TurnRequest},
    session_store::{SessionStore, StoreError},
    summarizer::{Summarizer, SummarizerError},
};
pub use use_cases::compression::{CompactionPlan, CompactionReport, CompressionOutcome, CompressionTrigger};
pub use use_cases::engine::{DiscussionEngine, RoundInput, RoundReport, SessionHandle};
pub use use_cases::multiplexer::{EventStream, StreamMultiplexer};
pub use use_cases::service::{DiscussionError, DiscussionService, NewSession, RoundRequest};
