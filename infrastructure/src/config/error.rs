//! Configuration loading errors

use orchestra_domain::ConfigIssue;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    /// A file could not be read or did not match the expected shape
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("invalid configuration: {}", summarize(.0))]
    Invalid(Vec<ConfigIssue>),
}

fn summarize(issues: &[ConfigIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestra_domain::ConfigIssueCode;

    #[test]
    fn test_invalid_lists_every_issue() {
        let err = ConfigError::Invalid(vec![
            ConfigIssue::error(ConfigIssueCode::ZeroLimit, "max_parallel must be at least 1"),
            ConfigIssue::warning(ConfigIssueCode::EmptyChain, "no strategies"),
        ]);
        let text = err.to_string();
        assert!(text.contains("error: max_parallel"));
        assert!(text.contains("warning: no strategies"));
    }
}
