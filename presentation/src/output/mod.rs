//! Output formatting for streamed rounds and session state

pub mod console;
pub mod formatter;
