//! TOML file configuration
//!
//! Each section is a plain serde struct that mirrors the file layout and
//! converts into the application-layer config for its subsystem. Enum-like
//! settings are kept as strings here and parsed during conversion, so an
//! unknown name degrades to a default with a warning instead of rejecting
//! the whole file.

mod agent;
mod collaboration;
mod execution;
mod governor;
mod logging;
mod recovery;

pub use agent::FileAgentConfig;
pub use collaboration::FileCollaborationConfig;
pub use execution::{
    FileCacheConfig, FileCircuitBreakerConfig, FileExecutionConfig, FileRateLimitConfig,
    FileToolRateLimit,
};
pub use governor::FileGovernorConfig;
pub use logging::FileLoggingConfig;
pub use recovery::FileRecoveryConfig;

use orchestra_application::EngineConfig;
use orchestra_domain::core::validation::{ConfigIssue, ConfigIssueCode};
use orchestra_domain::TaskContext;
use serde::{Deserialize, Serialize};

pub(super) fn unknown_value(field: &str, value: &str, fallback: &str) -> ConfigIssue {
    ConfigIssue::warning(
        ConfigIssueCode::UnknownName,
        format!("{}: unknown value '{}', falling back to {}", field, value, fallback),
    )
}

/// Root of the configuration file
///
/// # Example
///
/// ```toml
/// [agent]
/// max_iterations = 12
///
/// [governor]
/// tokens_per_minute = 60000
///
/// [execution]
/// max_parallel = 4
///
/// [recovery]
/// strategies = ["retry", "simplify", "fallback", "delegate"]
///
/// [collaboration]
/// enabled = true
/// algorithm = "majority"
///
/// [logging]
/// transcript_path = "transcript.jsonl"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub agent: FileAgentConfig,
    pub governor: FileGovernorConfig,
    pub execution: FileExecutionConfig,
    pub recovery: FileRecoveryConfig,
    pub collaboration: FileCollaborationConfig,
    pub logging: FileLoggingConfig,
}

impl FileConfig {
    fn build(&self) -> (EngineConfig, Vec<ConfigIssue>) {
        let mut issues = Vec::new();

        let (governor, more) = self
            .governor
            .to_governor_config(self.agent.task_timeout_secs);
        issues.extend(more);
        let (execution, more) = self.execution.to_execution_config();
        issues.extend(more);
        let (recovery, more) = self.recovery.to_recovery_config();
        issues.extend(more);
        let (_, more) = self.recovery.planners();
        issues.extend(more);
        let (collaboration, more) = self.collaboration.to_collaboration_config();
        issues.extend(more);

        let config = EngineConfig {
            agent: self.agent.to_loop_params(),
            governor,
            execution,
            recovery,
            collaboration,
        };
        (config, issues)
    }

    /// Application configuration; unknown names have already fallen back.
    pub fn to_engine_config(&self) -> EngineConfig {
        self.build().0
    }

    /// Every problem found, parse warnings first.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let (config, mut issues) = self.build();
        issues.extend(config.validate());
        issues
    }

    /// Default context for tasks started from this configuration
    pub fn task_context(&self) -> TaskContext {
        match self.execution.tenant.as_deref().map(str::trim) {
            Some(tenant) if !tenant.is_empty() => TaskContext::new().with_tenant(tenant),
            _ => TaskContext::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestra_domain::Severity;

    #[test]
    fn test_default_config_is_clean() {
        let issues = FileConfig::default().validate();
        assert!(issues.is_empty(), "{:?}", issues);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: FileConfig = toml::from_str(
            r#"
            [agent]
            max_iterations = 4

            [execution.cache]
            enabled = false
            "#,
        )
        .unwrap();
        let engine = config.to_engine_config();
        assert_eq!(engine.agent.max_iterations, 4);
        assert!(!engine.execution.cache.enabled);
        assert_eq!(engine.execution.max_parallel, 4);
        assert!(config.logging.transcript_path.is_none());
    }

    #[test]
    fn test_validate_collects_parse_and_semantic_issues() {
        let config: FileConfig = toml::from_str(
            r#"
            [agent]
            max_iterations = 0

            [governor]
            mode = "strict"

            [recovery]
            simplification = "shrink"
            "#,
        )
        .unwrap();
        let issues = config.validate();
        let warnings = issues
            .iter()
            .filter(|i| i.severity == Severity::Warning)
            .count();
        assert_eq!(warnings, 2);
        assert!(ConfigIssue::has_errors(&issues));
        assert!(issues.iter().any(|i| i.message.contains("max_iterations")));
    }

    #[test]
    fn test_task_timeout_reaches_governor_budget() {
        let config: FileConfig = toml::from_str("[agent]\ntask_timeout_secs = 45").unwrap();
        let engine = config.to_engine_config();
        assert_eq!(engine.governor.budget.task_timeout_secs, Some(45));
    }

    #[test]
    fn test_tenant_flows_into_task_context() {
        let mut config = FileConfig::default();
        assert_eq!(config.task_context().tenant, None);
        config.execution.tenant = Some("team-a".to_string());
        assert_eq!(config.task_context().tenant.as_deref(), Some("team-a"));
    }
}
