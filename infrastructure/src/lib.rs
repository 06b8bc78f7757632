//! Infrastructure layer for chorus
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer, including configuration file loading.

pub mod config;
pub mod invoker;
pub mod logging;
pub mod store;
pub mod summarizer;

// Re-export commonly used types
pub use config::{
    ConfigError, ConfigLoader, FileCompressionConfig, FileConfig, FileDiscussionConfig,
    FileLoggingConfig, FileMemberConfig, FileModelsConfig, FileOutputConfig,
    FileReplConfig, FileStorageConfig, StorageBackend, SummarizerKind,
};
pub use invoker::LoopbackInvoker;
pub use logging::JsonlConversationLogger;
pub use store::{InMemorySessionStore, JsonFileSessionStore};
pub use summarizer::{ExtractiveSummarizer, ModelSummarizer};
