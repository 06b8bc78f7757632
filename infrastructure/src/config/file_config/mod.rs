//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! They are deserialized directly and converted into domain and
//! application types by the `to_*` / `parse_*` helpers, which fall back to
//! defaults and report [`ConfigIssue`]s instead of failing.

mod compression;
mod discussion;
mod logging;
mod members;
mod models;
mod output;
mod repl;
mod storage;

pub use compression::{DEFAULT_SUMMARY_MAX_CHARS, FileCompressionConfig, SummarizerKind};
pub use discussion::FileDiscussionConfig;
pub use logging::FileLoggingConfig;
pub use members::{FileMemberConfig, parse_roster};
pub use models::FileModelsConfig;
pub use output::FileOutputConfig;
pub use repl::FileReplConfig;
pub use storage::{FileStorageConfig, StorageBackend};

use chorus_domain::{ConfigIssue, ConfigIssueCode, DiscussionMode};
use serde::{Deserialize, Serialize};

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Round loop settings
    pub discussion: FileDiscussionConfig,
    /// Context compaction settings
    pub compression: FileCompressionConfig,
    /// Context windows per model
    pub models: FileModelsConfig,
    /// Default roster for new sessions
    pub members: Vec<FileMemberConfig>,
    /// Manager used in leader mode and for conclusions
    pub manager: Option<FileMemberConfig>,
    /// Session persistence
    pub storage: FileStorageConfig,
    /// Transcript and diagnostic log locations
    pub logging: FileLoggingConfig,
    /// Output settings
    pub output: FileOutputConfig,
    /// Chat REPL settings
    pub repl: FileReplConfig,
}

impl FileConfig {
    /// Validate the entire configuration, returning all detected issues.
    ///
    /// This is the single entry point for config validation. It checks:
    /// 1. Enum-like strings (mode, overlap policy, backend, summarizer)
    /// 2. Numeric ranges (threshold, zero counts, context windows)
    /// 3. Member definitions and the manager
    /// 4. Leader mode configured without a manager
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        // 1. Enum parse validation
        let (mode, mode_issues) = self.discussion.parse_mode();
        issues.extend(mode_issues);
        issues.extend(self.storage.parse_backend().1);
        issues.extend(self.compression.parse_summarizer().1);

        // 2. Numeric validation
        issues.extend(self.discussion.to_params().1);
        issues.extend(self.compression.to_threshold().1);
        issues.extend(self.compression.summary_max_chars().1);
        issues.extend(self.models.to_catalog().1);

        // 3. Members
        issues.extend(parse_roster(&self.members).1);
        let manager = self.manager.as_ref().map(|m| m.to_member("manager"));
        if let Some(Err(issue)) = &manager {
            issues.push(issue.clone());
        }

        // 4. Leader mode needs a usable manager
        if mode == DiscussionMode::Leader && !matches!(manager, Some(Ok(_))) {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::LeaderWithoutManager,
                "discussion.mode is 'leader' but no [manager] is configured",
            ));
        }

        issues
    }
}
