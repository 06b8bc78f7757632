//! Logging configuration from TOML (`[logging]` section)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// # Example
///
/// ```toml
/// [logging]
/// conversation_log = "~/.local/share/chorus/transcript.jsonl"
/// directory = "/var/log/chorus"   # daily rotated diagnostic log
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLoggingConfig {
    /// JSONL transcript of round events; disabled when unset
    pub conversation_log: Option<PathBuf>,
    /// Directory for the diagnostic log file; stderr only when unset
    pub directory: Option<PathBuf>,
}
