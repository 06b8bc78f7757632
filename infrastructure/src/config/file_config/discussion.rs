//! Discussion configuration from TOML (`[discussion]` section)

use chorus_application::{ActiveRoundPolicy, DiscussionParams};
use chorus_domain::{ConfigIssue, ConfigIssueCode, DiscussionMode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Round loop configuration from TOML.
///
/// # Example
///
/// ```toml
/// [discussion]
/// mode = "leader"          # free | leader | task | qa
/// max_rounds = 2           # passes over the roster in free mode
/// user_name = "alice"
/// turn_timeout_secs = 120  # 0 disables the per-turn timeout
/// turn_retries = 2
/// retry_delay_ms = 1000
/// settle_timeout_ms = 5000
/// event_buffer = 64
/// on_active_round = "preempt"  # preempt | reject
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileDiscussionConfig {
    pub mode: String,
    pub max_rounds: usize,
    pub user_name: String,
    pub turn_timeout_secs: u64,
    pub turn_retries: usize,
    pub retry_delay_ms: u64,
    pub settle_timeout_ms: u64,
    pub event_buffer: usize,
    pub on_active_round: String,
}

impl Default for FileDiscussionConfig {
    fn default() -> Self {
        let params = DiscussionParams::default();
        Self {
            mode: DiscussionMode::default().as_str().to_string(),
            max_rounds: params.default_max_rounds,
            user_name: params.user_name,
            turn_timeout_secs: params.turn_timeout.map_or(0, |d| d.as_secs()),
            turn_retries: params.turn_retries,
            retry_delay_ms: params.retry_delay.as_millis() as u64,
            settle_timeout_ms: params.settle_timeout.as_millis() as u64,
            event_buffer: params.event_buffer,
            on_active_round: "preempt".to_string(),
        }
    }
}

impl FileDiscussionConfig {
    /// Parse the default mode, falling back to `free`.
    pub fn parse_mode(&self) -> (DiscussionMode, Vec<ConfigIssue>) {
        match self.mode.parse::<DiscussionMode>() {
            Ok(mode) => (mode, vec![]),
            Err(e) => (
                DiscussionMode::default(),
                vec![ConfigIssue::warning(
                    ConfigIssueCode::InvalidMode,
                    format!("discussion.mode: {e}, falling back to 'free'"),
                )],
            ),
        }
    }

    /// Convert to application `DiscussionParams`, returning validation issues.
    pub fn to_params(&self) -> (DiscussionParams, Vec<ConfigIssue>) {
        let mut issues = Vec::new();
        let defaults = DiscussionParams::default();

        let max_rounds = if self.max_rounds == 0 {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::ZeroValue,
                format!(
                    "discussion.max_rounds cannot be 0, using {}",
                    defaults.default_max_rounds
                ),
            ));
            defaults.default_max_rounds
        } else {
            self.max_rounds
        };

        let event_buffer = if self.event_buffer == 0 {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::ZeroValue,
                format!("discussion.event_buffer cannot be 0, using {}", defaults.event_buffer),
            ));
            defaults.event_buffer
        } else {
            self.event_buffer
        };

        let policy = match self.on_active_round.parse::<ActiveRoundPolicy>() {
            Ok(policy) => policy,
            Err(e) => {
                issues.push(ConfigIssue::warning(
                    ConfigIssueCode::InvalidMode,
                    format!("discussion.on_active_round: {e}, falling back to 'preempt'"),
                ));
                ActiveRoundPolicy::default()
            }
        };

        let turn_timeout = (self.turn_timeout_secs > 0).then(|| Duration::from_secs(self.turn_timeout_secs));

        let params = DiscussionParams::default()
            .with_default_max_rounds(max_rounds)
            .with_user_name(self.user_name.clone())
            .with_turn_timeout(turn_timeout)
            .with_turn_retries(self.turn_retries)
            .with_retry_delay(Duration::from_millis(self.retry_delay_ms))
            .with_settle_timeout(Duration::from_millis(self.settle_timeout_ms))
            .with_event_buffer(event_buffer)
            .with_active_round_policy(policy);

        (params, issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_params() {
        let (params, issues) = FileDiscussionConfig::default().to_params();
        assert!(issues.is_empty());
        assert_eq!(params.default_max_rounds, 1);
        assert_eq!(params.turn_timeout, Some(Duration::from_secs(120)));
        assert_eq!(params.on_active_round, ActiveRoundPolicy::Preempt);
    }

    #[test]
    fn test_zero_timeout_disables_it() {
        let config = FileDiscussionConfig {
            turn_timeout_secs: 0,
            on_active_round: "reject".to_string(),
            ..Default::default()
        };
        let (params, issues) = config.to_params();
        assert!(issues.is_empty());
        assert_eq!(params.turn_timeout, None);
        assert_eq!(params.on_active_round, ActiveRoundPolicy::Reject);
    }

    #[test]
    fn test_invalid_values_fall_back_with_warnings() {
        let config = FileDiscussionConfig {
            max_rounds: 0,
            event_buffer: 0,
            on_active_round: "queue".to_string(),
            ..Default::default()
        };
        let (params, issues) = config.to_params();
        assert_eq!(issues.len(), 3);
        assert_eq!(params.default_max_rounds, 1);
        assert_eq!(params.event_buffer, 64);
        assert_eq!(params.on_active_round, ActiveRoundPolicy::Preempt);
    }

    #[test]
    fn test_parse_mode_aliases_and_errors() {
        let config = FileDiscussionConfig {
            mode: "race".to_string(),
            ..Default::default()
        };
        assert_eq!(config.parse_mode().0, DiscussionMode::Qa);

        let config = FileDiscussionConfig {
            mode: "debate".to_string(),
            ..Default::default()
        };
        let (mode, issues) = config.parse_mode();
        assert_eq!(mode, DiscussionMode::Free);
        assert_eq!(issues[0].code, ConfigIssueCode::InvalidMode);
    }
}
