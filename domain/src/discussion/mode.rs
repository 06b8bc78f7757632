//! Discussion protocols

use crate::core::error::ValidationError;
use serde::{Deserialize, Serialize};

/// The protocol a round runs under.
///
/// Closed set: the engine has exactly one handler per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscussionMode {
    /// Sequential round-robin over the roster, every turn sees the ones before it.
    #[default]
    Free,
    /// Manager answers first, then the other members run concurrently.
    Leader,
    /// Every member works its own task description concurrently.
    Task,
    /// Identical prompt, fully concurrent, no visibility into each other.
    #[serde(alias = "race")]
    Qa,
}

impl DiscussionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscussionMode::Free => "free",
            DiscussionMode::Leader => "leader",
            DiscussionMode::Task => "task",
            DiscussionMode::Qa => "qa",
        }
    }

    /// Whether turns run one after another and see each other's output.
    pub fn is_sequential(&self) -> bool {
        matches!(self, DiscussionMode::Free)
    }

    pub fn all() -> [DiscussionMode; 4] {
        [
            DiscussionMode::Free,
            DiscussionMode::Leader,
            DiscussionMode::Task,
            DiscussionMode::Qa,
        ]
    }
}

impl std::fmt::Display for DiscussionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for DiscussionMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" => Ok(DiscussionMode::Free),
            "leader" | "manager" => Ok(DiscussionMode::Leader),
            "task" => Ok(DiscussionMode::Task),
            "qa" | "race" => Ok(DiscussionMode::Qa),
            other => Err(ValidationError::UnknownMode(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!("race".parse::<DiscussionMode>().unwrap(), DiscussionMode::Qa);
        assert_eq!("Leader".parse::<DiscussionMode>().unwrap(), DiscussionMode::Leader);
        assert_eq!(
            "debate".parse::<DiscussionMode>().unwrap_err(),
            ValidationError::UnknownMode("debate".into())
        );
    }

    #[test]
    fn test_display_roundtrip() {
        for mode in DiscussionMode::all() {
            assert_eq!(mode.to_string().parse::<DiscussionMode>().unwrap(), mode);
        }
    }

    #[test]
    fn test_serde_lowercase() {
        assert_eq!(serde_json::to_string(&DiscussionMode::Qa).unwrap(), "\"qa\"");
        let mode: DiscussionMode = serde_json::from_str("\"race\"").unwrap();
        assert_eq!(mode, DiscussionMode::Qa);
    }

    #[test]
    fn test_only_free_is_sequential() {
        assert!(DiscussionMode::Free.is_sequential());
        assert!(!DiscussionMode::Leader.is_sequential());
        assert!(!DiscussionMode::Qa.is_sequential());
    }
}
