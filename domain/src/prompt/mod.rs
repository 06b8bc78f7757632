//! Prompt domain
//!
//! Templates for the system prompts and per-turn instructions of each discussion mode.

mod template;

pub use template::{CONSENSUS_MARKER, PromptTemplate};
