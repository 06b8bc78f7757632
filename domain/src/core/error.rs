//! Domain error types

use thiserror::Error;

/// Rejected input, raised before any model turn runs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("threshold ratio must be within (0, 1], got {0}")]
    InvalidThreshold(f64),

    #[error("temperature must be within [0, 2], got {0}")]
    InvalidTemperature(f32),

    #[error("unknown discussion mode: {0}")]
    UnknownMode(String),

    #[error("unknown member: {0}")]
    UnknownMember(String),

    #[error("member id already in roster: {0}")]
    DuplicateMember(String),

    #[error("session has no members")]
    EmptyRoster,

    #[error("leader mode requires a manager")]
    MissingManager,

    #[error("task mode requires a task for every member (missing: {})", .0.join(", "))]
    MissingTask(Vec<String>),

    #[error("message content is empty")]
    EmptyMessage,

    #[error("max rounds must be at least 1")]
    InvalidMaxRounds,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_task_lists_members() {
        let error = ValidationError::MissingTask(vec!["alice".into(), "bob".into()]);
        assert_eq!(
            error.to_string(),
            "task mode requires a task for every member (missing: alice, bob)"
        );
    }

    #[test]
    fn test_threshold_display() {
        let error = ValidationError::InvalidThreshold(1.5);
        assert_eq!(error.to_string(), "threshold ratio must be within (0, 1], got 1.5");
    }
}
