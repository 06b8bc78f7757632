//! Structured configuration issues.
//!
//! Config parsing never fails hard on a single bad value. It falls back to
//! the default and reports a [`ConfigIssue`] so the caller decides whether
//! to warn or abort.

/// Severity level of a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Fatal: the configuration cannot work at all.
    Error,
    /// Non-fatal: a default was used instead.
    Warning,
}

/// Identifies a specific configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigIssueCode {
    /// A discussion mode name did not parse.
    InvalidMode,
    /// Threshold ratio outside (0, 1].
    InvalidThreshold,
    /// A member definition is unusable (bad temperature, duplicate id).
    InvalidMember,
    /// Leader mode is the default but no manager is configured.
    LeaderWithoutManager,
    /// A numeric setting is zero where at least one is required.
    ZeroValue,
    /// Unknown storage backend name.
    UnknownBackend,
}

/// A detected issue in the configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigIssue {
    pub severity: Severity,
    pub code: ConfigIssueCode,
    pub message: String,
}

impl ConfigIssue {
    pub fn warning(code: ConfigIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            message: message.into(),
        }
    }

    pub fn error(code: ConfigIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_set_severity() {
        assert!(ConfigIssue::error(ConfigIssueCode::InvalidMember, "x").is_error());
        assert!(!ConfigIssue::warning(ConfigIssueCode::InvalidMode, "x").is_error());
    }
}
