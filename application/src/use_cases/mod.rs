//! Use cases
//!
//! Application-level operations that orchestrate domain logic.

pub mod compression;
pub mod engine;
pub mod multiplexer;
pub mod service;
pub(crate) mod shared;

#[cfg(test)]
pub(crate) mod test_support;
