//! Session storage configuration from TOML (`[storage]` section)

use chorus_domain::{ConfigIssue, ConfigIssueCode};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where sessions live between runs.
///
/// # Example
///
/// ```toml
/// [storage]
/// backend = "json"                 # memory | json
/// directory = "~/.local/share/chorus/sessions"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileStorageConfig {
    pub backend: String,
    pub directory: Option<PathBuf>,
}

impl Default for FileStorageConfig {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            directory: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Json,
}

impl FileStorageConfig {
    pub fn parse_backend(&self) -> (StorageBackend, Vec<ConfigIssue>) {
        match self.backend.trim().to_ascii_lowercase().as_str() {
            "memory" => (StorageBackend::Memory, vec![]),
            "json" | "file" => (StorageBackend::Json, vec![]),
            other => (
                StorageBackend::Memory,
                vec![ConfigIssue::warning(
                    ConfigIssueCode::UnknownBackend,
                    format!("storage.backend: unknown value '{other}', using 'memory'"),
                )],
            ),
        }
    }

    /// Session directory for the JSON backend.
    pub fn sessions_dir(&self) -> PathBuf {
        self.directory.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("chorus")
                .join("sessions")
        })
    }
}
