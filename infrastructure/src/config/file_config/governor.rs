//! Resource governor configuration from TOML (`[governor]` section)

use super::unknown_value;
use orchestra_application::GovernorConfig;
use orchestra_domain::core::validation::ConfigIssue;
use orchestra_domain::{EnforcementMode, OverLimitPolicy, ResourceBudget};
use serde::{Deserialize, Serialize};

/// Raw governor configuration
///
/// # Example
///
/// ```toml
/// [governor]
/// mode = "enforce"            # "enforce" or "monitor"
/// over_limit = "wait"         # "wait" or "reject"
/// wait_timeout_ms = 30000
/// max_concurrent_tasks = 4
/// tokens_per_minute = 100000
/// token_burst = 100000
/// tokens_per_hour = 0         # 0 = no hourly cap
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileGovernorConfig {
    pub mode: String,
    pub over_limit: String,
    /// How long a waiting request may block under `over_limit = "wait"`
    pub wait_timeout_ms: u64,
    pub max_concurrent_tasks: u64,
    pub tokens_per_minute: u64,
    pub token_burst: u64,
    pub tool_calls_per_minute: u64,
    pub tool_call_burst: u64,
    pub tokens_per_hour: u64,
    pub tool_calls_per_hour: u64,
    pub memory_ceiling_bytes: u64,
}

impl Default for FileGovernorConfig {
    fn default() -> Self {
        let budget = ResourceBudget::default();
        Self {
            mode: "enforce".to_string(),
            over_limit: "wait".to_string(),
            wait_timeout_ms: 30_000,
            max_concurrent_tasks: budget.max_concurrent_tasks,
            tokens_per_minute: budget.tokens_per_minute,
            token_burst: budget.token_burst,
            tool_calls_per_minute: budget.tool_calls_per_minute,
            tool_call_burst: budget.tool_call_burst,
            tokens_per_hour: budget.tokens_per_hour.unwrap_or(0),
            tool_calls_per_hour: budget.tool_calls_per_hour.unwrap_or(0),
            memory_ceiling_bytes: budget.memory_ceiling_bytes,
        }
    }
}

impl FileGovernorConfig {
    pub fn parse_mode(&self) -> (EnforcementMode, Vec<ConfigIssue>) {
        match self.mode.trim().to_lowercase().as_str() {
            "enforce" => (EnforcementMode::Enforce, vec![]),
            "monitor" => (EnforcementMode::Monitor, vec![]),
            _ => (
                EnforcementMode::default(),
                vec![unknown_value("governor.mode", &self.mode, "enforce")],
            ),
        }
    }

    pub fn parse_over_limit(&self) -> (OverLimitPolicy, Vec<ConfigIssue>) {
        match self.over_limit.trim().to_lowercase().as_str() {
            "reject" => (OverLimitPolicy::Reject, vec![]),
            "wait" => (
                OverLimitPolicy::Wait {
                    timeout_ms: self.wait_timeout_ms,
                },
                vec![],
            ),
            _ => (
                OverLimitPolicy::Wait {
                    timeout_ms: self.wait_timeout_ms,
                },
                vec![unknown_value("governor.over_limit", &self.over_limit, "wait")],
            ),
        }
    }

    /// The task timeout lives in `[agent]` and is passed in.
    pub fn to_governor_config(&self, task_timeout_secs: u64) -> (GovernorConfig, Vec<ConfigIssue>) {
        let (mode, mut issues) = self.parse_mode();
        let (over_limit, more) = self.parse_over_limit();
        issues.extend(more);

        let hourly = |n: u64| (n > 0).then_some(n);
        let budget = ResourceBudget {
            max_concurrent_tasks: self.max_concurrent_tasks,
            tokens_per_minute: self.tokens_per_minute,
            token_burst: self.token_burst,
            tool_calls_per_minute: self.tool_calls_per_minute,
            tool_call_burst: self.tool_call_burst,
            tokens_per_hour: hourly(self.tokens_per_hour),
            tool_calls_per_hour: hourly(self.tool_calls_per_hour),
            memory_ceiling_bytes: self.memory_ceiling_bytes,
            task_timeout_secs: (task_timeout_secs > 0).then_some(task_timeout_secs),
        };
        (
            GovernorConfig {
                budget,
                mode,
                over_limit,
            },
            issues,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestra_domain::ConfigIssueCode;

    #[test]
    fn test_monitor_and_reject() {
        let config: FileGovernorConfig = toml::from_str(
            r#"
            mode = "Monitor"
            over_limit = "reject"
            tokens_per_hour = 500000
            "#,
        )
        .unwrap();
        let (governor, issues) = config.to_governor_config(60);
        assert!(issues.is_empty());
        assert_eq!(governor.mode, EnforcementMode::Monitor);
        assert_eq!(governor.over_limit, OverLimitPolicy::Reject);
        assert_eq!(governor.budget.tokens_per_hour, Some(500_000));
        assert_eq!(governor.budget.tool_calls_per_hour, None);
        assert_eq!(governor.budget.task_timeout_secs, Some(60));
    }

    #[test]
    fn test_unknown_mode_falls_back_with_warning() {
        let config = FileGovernorConfig {
            mode: "strict".to_string(),
            ..Default::default()
        };
        let (mode, issues) = config.parse_mode();
        assert_eq!(mode, EnforcementMode::Enforce);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, ConfigIssueCode::UnknownName);
        assert!(issues[0].message.contains("strict"));
    }

    #[test]
    fn test_wait_carries_timeout() {
        let config = FileGovernorConfig {
            wait_timeout_ms: 250,
            ..Default::default()
        };
        assert_eq!(
            config.parse_over_limit().0,
            OverLimitPolicy::Wait { timeout_ms: 250 }
        );
    }
}
