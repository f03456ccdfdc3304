use crate::core::validation::{ConfigIssue, ConfigIssueCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A budgeted resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Concurrent task slots
    ConcurrentTasks,
    /// Language-model tokens
    Tokens,
    /// Outbound tool calls
    ToolCalls,
    /// Estimated bytes held by in-flight work
    Memory,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::ConcurrentTasks,
        ResourceKind::Tokens,
        ResourceKind::ToolCalls,
        ResourceKind::Memory,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::ConcurrentTasks => "concurrent_tasks",
            ResourceKind::Tokens => "tokens",
            ResourceKind::ToolCalls => "tool_calls",
            ResourceKind::Memory => "memory",
        }
    }

    /// Rate resources are consumed; the others are held and released
    pub fn is_rate(&self) -> bool {
        matches!(self, ResourceKind::Tokens | ResourceKind::ToolCalls)
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether limits block or are only recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnforcementMode {
    #[default]
    Enforce,
    Monitor,
}

/// What an enforcing governor does with an over-budget request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "lowercase")]
pub enum OverLimitPolicy {
    Reject,
    Wait { timeout_ms: u64 },
}

impl Default for OverLimitPolicy {
    fn default() -> Self {
        OverLimitPolicy::Wait { timeout_ms: 30_000 }
    }
}

impl OverLimitPolicy {
    pub fn wait_timeout(&self) -> Option<Duration> {
        match self {
            OverLimitPolicy::Reject => None,
            OverLimitPolicy::Wait { timeout_ms } => Some(Duration::from_millis(*timeout_ms)),
        }
    }
}

/// Configured ceilings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceBudget {
    /// Top-level agent runs in flight at once
    pub max_concurrent_tasks: u64,
    /// Steady-state token rate
    pub tokens_per_minute: u64,
    /// Bucket capacity for tokens; at least `tokens_per_minute` is sensible
    pub token_burst: u64,
    pub tool_calls_per_minute: u64,
    pub tool_call_burst: u64,
    /// Optional hourly caps, tracked independently of the per-minute buckets
    pub tokens_per_hour: Option<u64>,
    pub tool_calls_per_hour: Option<u64>,
    /// Ceiling on tool output held by running tasks
    pub memory_ceiling_bytes: u64,
    /// Wall-clock budget for a single task
    pub task_timeout_secs: Option<u64>,
}

impl Default for ResourceBudget {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 4,
            tokens_per_minute: 100_000,
            token_burst: 100_000,
            tool_calls_per_minute: 120,
            tool_call_burst: 120,
            tokens_per_hour: None,
            tool_calls_per_hour: None,
            memory_ceiling_bytes: 512 * 1024 * 1024,
            task_timeout_secs: Some(300),
        }
    }
}

impl ResourceBudget {
    pub fn task_timeout(&self) -> Option<Duration> {
        self.task_timeout_secs.map(Duration::from_secs)
    }

    pub fn hourly_limit(&self, kind: ResourceKind) -> Option<u64> {
        match kind {
            ResourceKind::Tokens => self.tokens_per_hour,
            ResourceKind::ToolCalls => self.tool_calls_per_hour,
            _ => None,
        }
    }

    /// Problems that would make the budget unusable
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        if self.max_concurrent_tasks == 0 {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::ZeroLimit,
                "max_concurrent_tasks must be at least 1",
            ));
        }
        if self.tokens_per_minute == 0 || self.token_burst == 0 {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::ZeroLimit,
                "token rate and burst must be positive",
            ));
        }
        if self.tool_calls_per_minute == 0 || self.tool_call_burst == 0 {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::ZeroLimit,
                "tool call rate and burst must be positive",
            ));
        }
        if self.memory_ceiling_bytes == 0 {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::ZeroLimit,
                "memory_ceiling_bytes must be positive",
            ));
        }
        if self.token_burst > 0 && self.token_burst < self.tokens_per_minute / 60 {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::BurstBelowRate,
                "token_burst is smaller than one second of refill",
            ));
        }
        if let Some(hourly) = self.tokens_per_hour
            && hourly < self.tokens_per_minute
        {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::InvertedBounds,
                "tokens_per_hour is below tokens_per_minute",
            ));
        }
        issues
    }
}
