//! Application-level configuration.
//!
//! - [`DiscussionParams`] : round loop control (timeouts, retries, buffering, overlap policy)
//! - [`CompressionParams`] : compaction tuning

pub mod discussion_params;

pub use discussion_params::{ActiveRoundPolicy, CompressionParams, DiscussionParams};
