//! Model value object and the context-window catalog

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;

/// Context window assumed for models missing from the catalog.
pub const DEFAULT_CONTEXT_WINDOW: usize = 128_000;

/// Identifier of a language model a member speaks through (Value Object).
///
/// Provider wiring is outside the domain, so any identifier is accepted.
/// A handful of well-known identifiers get named constructors.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Model(String);

impl Model {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the string identifier for this model
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn qwen_flash() -> Self {
        Self::new("qwen-flash")
    }

    pub fn qwen_plus() -> Self {
        Self::new("qwen-plus")
    }

    pub fn deepseek_chat() -> Self {
        Self::new("deepseek-chat")
    }

    /// Get the default roster models used when nothing is configured
    pub fn default_models() -> Vec<Model> {
        vec![Self::qwen_plus(), Self::deepseek_chat()]
    }
}

impl Default for Model {
    /// Returns the default manager model
    fn default() -> Self {
        Self::qwen_flash()
    }
}

impl std::fmt::Display for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Model {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Model::new(s.trim()))
    }
}

impl Serialize for Model {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Model {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Model::new(s))
    }
}

/// Maps model identifiers to their context windows (in tokens).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCatalog {
    windows: HashMap<String, usize>,
    default_window: usize,
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self {
            windows: HashMap::new(),
            default_window: DEFAULT_CONTEXT_WINDOW,
        }
    }
}

impl ModelCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_window(mut self, model: impl Into<String>, window: usize) -> Self {
        self.windows.insert(model.into(), window);
        self
    }

    pub fn with_default_window(mut self, window: usize) -> Self {
        self.default_window = window;
        self
    }

    pub fn insert(&mut self, model: impl Into<String>, window: usize) {
        self.windows.insert(model.into(), window);
    }

    /// Context window for `model`, falling back to the catalog default.
    pub fn context_window(&self, model: &Model) -> usize {
        self.windows
            .get(model.as_str())
            .copied()
            .unwrap_or(self.default_window)
    }

    pub fn default_window(&self) -> usize {
        self.default_window
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}
