//! Model catalog configuration from TOML (`[models]` section)

use chorus_domain::{ConfigIssue, ConfigIssueCode, DEFAULT_CONTEXT_WINDOW, ModelCatalog};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Context windows per model.
///
/// The session budget is the smallest window among its members, so a
/// catalog entry only matters when it is below the default.
///
/// # Example
///
/// ```toml
/// [models]
/// default_context_window = 128000
///
/// [models.context_windows]
/// "qwen-flash" = 1000000
/// "deepseek-chat" = 64000
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileModelsConfig {
    pub default_context_window: usize,
    pub context_windows: BTreeMap<String, usize>,
}

impl Default for FileModelsConfig {
    fn default() -> Self {
        Self {
            default_context_window: DEFAULT_CONTEXT_WINDOW,
            context_windows: BTreeMap::new(),
        }
    }
}

impl FileModelsConfig {
    /// Build the domain catalog, skipping unusable entries with warnings.
    pub fn to_catalog(&self) -> (ModelCatalog, Vec<ConfigIssue>) {
        let mut issues = Vec::new();

        let default_window = if self.default_context_window == 0 {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::ZeroValue,
                format!("models.default_context_window cannot be 0, using {DEFAULT_CONTEXT_WINDOW}"),
            ));
            DEFAULT_CONTEXT_WINDOW
        } else {
            self.default_context_window
        };

        let mut catalog = ModelCatalog::new().with_default_window(default_window);
        for (model, window) in &self.context_windows {
            if model.trim().is_empty() || *window == 0 {
                issues.push(ConfigIssue::warning(
                    ConfigIssueCode::ZeroValue,
                    format!("models.context_windows: ignoring entry '{model}' = {window}"),
                ));
                continue;
            }
            catalog.insert(model.trim(), *window);
        }

        (catalog, issues)
    }
}
