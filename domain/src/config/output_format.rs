//! Output format value object

use serde::{Deserialize, Serialize};

/// How streamed round events are rendered for the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Colored, human-readable transcript (default)
    #[default]
    Text,
    /// One JSON object per event
    Json,
    /// Server-sent-events records
    Sse,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_text() {
        assert_eq!(OutputFormat::default(), OutputFormat::Text);
    }

    #[test]
    fn test_deserialize_lowercase() {
        let format: OutputFormat = serde_json::from_str("\"sse\"").unwrap();
        assert_eq!(format, OutputFormat::Sse);
    }
}
