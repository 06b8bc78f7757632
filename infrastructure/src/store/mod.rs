//! Session store adapters
//!
//! Implementations of the [`SessionStore`](chorus_application::SessionStore)
//! port: a process-local map and a directory of JSON documents.

mod json_file;
mod memory;

pub use json_file::JsonFileSessionStore;
pub use memory::InMemorySessionStore;
