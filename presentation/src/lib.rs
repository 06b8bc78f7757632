//! Presentation layer for chorus
//!
//! This crate contains CLI definitions, output formatters,
//! progress reporters, and the interactive chat interface.

pub mod chat;
pub mod cli;
pub mod output;
pub mod progress;

// Re-export commonly used types
pub use chat::{ChatCommand, ChatRepl, RoundOutcome, present_round};
pub use cli::commands::{Cli, ModeArg, OutputFormat, parse_member_arg, parse_task_arg};
pub use output::console::ConsoleFormatter;
pub use output::formatter::{FrameFormatter, JsonLinesFormatter, SseFormatter, formatter_for};
pub use progress::reporter::RoundProgress;
