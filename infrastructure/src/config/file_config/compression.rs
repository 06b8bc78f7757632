//! Compression configuration from TOML (`[compression]` section)

use chorus_application::CompressionParams;
use chorus_domain::{ConfigIssue, ConfigIssueCode, DEFAULT_THRESHOLD_RATIO, ThresholdRatio};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default length cap for extractive summaries.
pub const DEFAULT_SUMMARY_MAX_CHARS: usize = 2_000;

/// Compression configuration from TOML.
///
/// # Example
///
/// ```toml
/// [compression]
/// threshold = 0.8          # fraction of the context window, in (0, 1]
/// keep_recent = 4          # newest messages never folded
/// summary_max_chars = 2000
/// summarizer = "manager"   # manager | extractive
/// summarize_timeout_secs = 120  # 0 waits for the summarizer indefinitely
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileCompressionConfig {
    pub threshold: f64,
    pub keep_recent: usize,
    pub summary_max_chars: usize,
    pub summarizer: String,
    pub summarize_timeout_secs: u64,
}

impl Default for FileCompressionConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD_RATIO,
            keep_recent: CompressionParams::default().keep_recent,
            summary_max_chars: DEFAULT_SUMMARY_MAX_CHARS,
            summarizer: "manager".to_string(),
            summarize_timeout_secs: CompressionParams::default()
                .summarize_timeout
                .map_or(0, |d| d.as_secs()),
        }
    }
}

/// Which summarizer adapter condenses old history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummarizerKind {
    /// Ask the manager model, falling back to extractive when there is none.
    Manager,
    /// Deterministic first-sentence extraction, no model call.
    Extractive,
}

impl FileCompressionConfig {
    /// Validate the threshold, falling back to the default ratio.
    pub fn to_threshold(&self) -> (ThresholdRatio, Vec<ConfigIssue>) {
        match ThresholdRatio::new(self.threshold) {
            Ok(ratio) => (ratio, vec![]),
            Err(e) => (
                ThresholdRatio::default(),
                vec![ConfigIssue::warning(
                    ConfigIssueCode::InvalidThreshold,
                    format!("compression.threshold: {e}, using {DEFAULT_THRESHOLD_RATIO}"),
                )],
            ),
        }
    }

    pub fn to_params(&self) -> CompressionParams {
        let timeout = (self.summarize_timeout_secs > 0)
            .then(|| Duration::from_secs(self.summarize_timeout_secs));
        CompressionParams::default()
            .with_keep_recent(self.keep_recent)
            .with_summarize_timeout(timeout)
    }

    pub fn parse_summarizer(&self) -> (SummarizerKind, Vec<ConfigIssue>) {
        match self.summarizer.trim().to_ascii_lowercase().as_str() {
            "manager" | "model" => (SummarizerKind::Manager, vec![]),
            "extractive" => (SummarizerKind::Extractive, vec![]),
            other => (
                SummarizerKind::Manager,
                vec![ConfigIssue::warning(
                    ConfigIssueCode::UnknownBackend,
                    format!("compression.summarizer: unknown value '{other}', using 'manager'"),
                )],
            ),
        }
    }

    pub fn summary_max_chars(&self) -> (usize, Vec<ConfigIssue>) {
        if self.summary_max_chars == 0 {
            (
                DEFAULT_SUMMARY_MAX_CHARS,
                vec![ConfigIssue::warning(
                    ConfigIssueCode::ZeroValue,
                    format!("compression.summary_max_chars cannot be 0, using {DEFAULT_SUMMARY_MAX_CHARS}"),
                )],
            )
        } else {
            (self.summary_max_chars, vec![])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_threshold_is_valid() {
        let (ratio, issues) = FileCompressionConfig::default().to_threshold();
        assert!(issues.is_empty());
        assert_eq!(ratio.value(), 0.8);
    }

    #[test]
    fn test_out_of_range_threshold_falls_back() {
        for bad in [0.0, -0.2, 1.01] {
            let config = FileCompressionConfig {
                threshold: bad,
                ..Default::default()
            };
            let (ratio, issues) = config.to_threshold();
            assert_eq!(ratio.value(), DEFAULT_THRESHOLD_RATIO);
            assert_eq!(issues[0].code, ConfigIssueCode::InvalidThreshold);
        }
    }

    #[test]
    fn test_summarize_timeout_zero_disables() {
        let config = FileCompressionConfig {
            summarize_timeout_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.to_params().summarize_timeout, None);

        let config: FileCompressionConfig = toml::from_str("summarize_timeout_secs = 30").unwrap();
        assert_eq!(config.to_params().summarize_timeout, Some(Duration::from_secs(30)));
        assert_eq!(
            FileCompressionConfig::default().to_params().summarize_timeout,
            Some(Duration::from_secs(120))
        );
    }

    #[test]
    fn test_parse_summarizer() {
        let config = FileCompressionConfig {
            summarizer: "Extractive".to_string(),
            ..Default::default()
        };
        assert_eq!(config.parse_summarizer().0, SummarizerKind::Extractive);

        let config = FileCompressionConfig {
            summarizer: "magic".to_string(),
            ..Default::default()
        };
        let (kind, issues) = config.parse_summarizer();
        assert_eq!(kind, SummarizerKind::Manager);
        assert_eq!(issues.len(), 1);
    }
}
