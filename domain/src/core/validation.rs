//! Structured configuration issues.
//!
//! Configuration sections report problems as [`ConfigIssue`]s instead of
//! failing on the first one, so a `config validate` run can show them all.
//!
//! # Examples
//!
//! ```
//! use orchestra_domain::core::validation::{ConfigIssue, ConfigIssueCode, Severity};
//!
//! let issue = ConfigIssue::error(ConfigIssueCode::ZeroLimit, "max_parallel must be > 0");
//! assert_eq!(issue.severity, Severity::Error);
//! assert!(ConfigIssue::has_errors(&[issue]));
//! ```

/// Severity level of a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Fatal: the configuration cannot work at all.
    Error,
    /// Non-fatal: the configuration works but may not behave as expected.
    Warning,
}

/// Identifies a specific configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigIssueCode {
    /// A limit that must be positive is zero.
    ZeroLimit,
    /// A burst is smaller than the per-minute rate it should absorb.
    BurstBelowRate,
    /// A threshold or factor lies outside its valid range.
    OutOfRange,
    /// A lower bound exceeds its upper bound.
    InvertedBounds,
    /// A strategy or algorithm name is not recognised.
    UnknownName,
    /// The fallback chain contains no strategy.
    EmptyChain,
}

/// A detected issue in a configuration section.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigIssue {
    pub severity: Severity,
    pub code: ConfigIssueCode,
    pub message: String,
}

impl ConfigIssue {
    pub fn error(code: ConfigIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
        }
    }

    pub fn warning(code: ConfigIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            message: message.into(),
        }
    }

    pub fn has_errors(issues: &[ConfigIssue]) -> bool {
        issues.iter().any(|i| i.severity == Severity::Error)
    }
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let level = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {}", level, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warnings_are_not_errors() {
        let issues = vec![ConfigIssue::warning(ConfigIssueCode::BurstBelowRate, "burst")];
        assert!(!ConfigIssue::has_errors(&issues));
        assert_eq!(issues[0].to_string(), "warning: burst");
    }
}
