//! Error recovery configuration from TOML (`[recovery]` section)

use super::unknown_value;
use orchestra_application::RecoveryConfig;
use orchestra_domain::core::validation::{ConfigIssue, ConfigIssueCode};
use orchestra_domain::recovery::plan::{drop_optional_parameters, split_array_parameter};
use orchestra_domain::recovery::{FailureContext, FallbackRoute, StrategyPlan, StrategyRegistry};
use orchestra_domain::{RecoveryStrategy, RetryPolicy};
use serde::{Deserialize, Serialize};

/// Raw recovery configuration
///
/// # Example
///
/// ```toml
/// [recovery]
/// strategies = ["retry", "fallback", "abort"]
/// max_retries = 3
/// initial_delay_ms = 100
/// simplification = "split"    # "auto", "split" or "drop_optional"
///
/// [[recovery.fallbacks]]
/// tool_id = "search"
/// fallback_tool = "search_mirror"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileRecoveryConfig {
    /// Strategy names, tried in order
    pub strategies: Vec<String>,
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
    pub jitter: f64,
    /// How SIMPLIFY reduces a call
    pub simplification: String,
    pub fallbacks: Vec<FallbackRoute>,
}

impl Default for FileRecoveryConfig {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            strategies: RecoveryStrategy::default_chain()
                .iter()
                .map(|s| s.as_str().to_string())
                .collect(),
            max_retries: retry.max_retries,
            initial_delay_ms: retry.initial_delay_ms,
            max_delay_ms: retry.max_delay_ms,
            multiplier: retry.backoff_multiplier,
            jitter: retry.jitter_factor,
            simplification: "auto".to_string(),
            fallbacks: Vec::new(),
        }
    }
}

fn simplify_by_split(ctx: &FailureContext<'_>) -> StrategyPlan {
    match split_array_parameter(ctx.call) {
        Some(calls) => StrategyPlan::Split(calls),
        None => StrategyPlan::Skip("no array parameter to split".to_string()),
    }
}

fn simplify_by_dropping(ctx: &FailureContext<'_>) -> StrategyPlan {
    match drop_optional_parameters(ctx.call, ctx.operation) {
        Some(reduced) => StrategyPlan::Split(vec![reduced]),
        None => StrategyPlan::Skip("no optional parameters to drop".to_string()),
    }
}

impl FileRecoveryConfig {
    /// Unknown names are dropped with a warning; duplicates are kept once.
    pub fn parse_strategies(&self) -> (Vec<RecoveryStrategy>, Vec<ConfigIssue>) {
        let mut issues = Vec::new();
        let mut chain: Vec<RecoveryStrategy> = Vec::new();
        for name in &self.strategies {
            match name.parse::<RecoveryStrategy>() {
                Ok(s) if chain.contains(&s) => issues.push(ConfigIssue::warning(
                    ConfigIssueCode::OutOfRange,
                    format!("recovery.strategies: '{}' listed more than once", name),
                )),
                Ok(s) => chain.push(s),
                Err(_) => issues.push(unknown_value("recovery.strategies", name, "(skipped)")),
            }
        }
        if let Some(pos) = chain.iter().position(|s| *s == RecoveryStrategy::Abort)
            && pos + 1 < chain.len()
        {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::OutOfRange,
                "recovery.strategies: strategies after 'abort' never run",
            ));
        }
        (chain, issues)
    }

    /// Planner table with the configured simplification
    pub fn planners(&self) -> (StrategyRegistry, Vec<ConfigIssue>) {
        let registry = StrategyRegistry::default();
        match self.simplification.trim().to_lowercase().as_str() {
            "auto" => (registry, vec![]),
            "split" => (
                registry.with_planner(RecoveryStrategy::Simplify, simplify_by_split),
                vec![],
            ),
            "drop_optional" => (
                registry.with_planner(RecoveryStrategy::Simplify, simplify_by_dropping),
                vec![],
            ),
            _ => (
                registry,
                vec![unknown_value(
                    "recovery.simplification",
                    &self.simplification,
                    "auto",
                )],
            ),
        }
    }

    pub fn to_recovery_config(&self) -> (RecoveryConfig, Vec<ConfigIssue>) {
        let (strategies, issues) = self.parse_strategies();
        let config = RecoveryConfig {
            strategies,
            retry: RetryPolicy {
                max_retries: self.max_retries,
                initial_delay_ms: self.initial_delay_ms,
                max_delay_ms: self.max_delay_ms,
                backoff_multiplier: self.multiplier,
                jitter_factor: self.jitter,
            },
            fallbacks: self.fallbacks.clone(),
        };
        (config, issues)
    }
}
