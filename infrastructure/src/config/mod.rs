//! Configuration file loading for chorus
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `CHORUS_`-prefixed environment variables (`CHORUS_COMPRESSION__THRESHOLD=0.7`)
//! 2. `--config <path>` specified file
//! 3. Project root: `./chorus.toml` or `./.chorus.toml`
//! 4. XDG config: `$XDG_CONFIG_HOME/chorus/config.toml`
//! 5. Default values

mod file_config;
mod loader;

pub use file_config::{
    DEFAULT_SUMMARY_MAX_CHARS, FileCompressionConfig, FileConfig, FileDiscussionConfig,
    FileLoggingConfig, FileMemberConfig, FileModelsConfig, FileOutputConfig,
    FileReplConfig, FileStorageConfig, StorageBackend, SummarizerKind, parse_roster,
};
pub use loader::{ConfigError, ConfigLoader};
