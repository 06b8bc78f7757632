//! Conversation history: messages, the context ledger and token estimates.

pub mod ledger;
pub mod message;
pub mod tokens;

pub use ledger::{ContextLedger, ContextStats, FoldError, LedgerSnapshot};
pub use message::{Message, MessageKind, NewMessage, Role, SUMMARY_SENDER, SYSTEM_SENDER, Seq};
