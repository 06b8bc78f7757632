//! Core domain concepts shared across all subdomains.
//!
//! - [`model::Model`] / [`model::ModelCatalog`]: model identifiers and their context windows
//! - [`error::ValidationError`]: rejected input
//! - [`string`]: UTF-8 safe truncation helpers

pub mod error;
pub mod model;
pub mod string;
