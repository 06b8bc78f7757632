//! Interactive chat module
//!
//! Provides a readline-based group chat on top of a discussion session.

mod command;
mod repl;
mod round;

pub use command::ChatCommand;
pub use repl::ChatRepl;
pub use round::{RoundOutcome, present_round};
