//! Summarizer adapters for history compaction.

mod extractive;
mod model;

pub use extractive::ExtractiveSummarizer;
pub use model::ModelSummarizer;
