//! Engine configuration container.
//!
//! [`EngineConfig`] groups the per-subsystem configuration types. Each
//! subsystem receives only its own slice.

use super::loop_params::LoopParams;
use super::subsystems::{CollaborationConfig, ExecutionConfig, GovernorConfig, RecoveryConfig};
use orchestra_domain::{ConfigIssue, ConfigIssueCode};

#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub agent: LoopParams,
    pub governor: GovernorConfig,
    pub execution: ExecutionConfig,
    pub recovery: RecoveryConfig,
    pub collaboration: CollaborationConfig,
}

impl EngineConfig {
    /// Cross-section checks on the assembled configuration.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = self.governor.budget.validate();

        if self.agent.max_iterations == 0 {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::ZeroLimit,
                "agent.max_iterations must be at least 1",
            ));
        }
        if self.execution.max_parallel == 0 {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::ZeroLimit,
                "execution.max_parallel must be at least 1",
            ));
        }
        if self.execution.rate_limit.calls_per_minute == 0 || self.execution.rate_limit.burst == 0 {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::ZeroLimit,
                "execution.rate_limit calls_per_minute and burst must be positive",
            ));
        }
        if self.execution.circuit.failure_threshold == 0 {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::ZeroLimit,
                "execution.circuit_breaker.failure_threshold must be at least 1",
            ));
        }
        let ttl = &self.execution.cache.ttl;
        if ttl.min_ttl_secs > ttl.max_ttl_secs {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::InvertedBounds,
                format!(
                    "execution.cache.min_ttl_secs ({}) exceeds max_ttl_secs ({})",
                    ttl.min_ttl_secs, ttl.max_ttl_secs
                ),
            ));
        }

        let retry = &self.recovery.retry;
        if retry.initial_delay_ms > retry.max_delay_ms {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::InvertedBounds,
                "recovery.initial_delay_ms exceeds max_delay_ms",
            ));
        }
        if !(0.0..=1.0).contains(&retry.jitter_factor) {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::OutOfRange,
                "recovery.jitter must be between 0 and 1",
            ));
        }
        if self.recovery.strategies.is_empty() {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::EmptyChain,
                "recovery.strategies is empty; failed calls are never recovered",
            ));
        }

        if let Err(e) = self.collaboration.algorithm.validate() {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::OutOfRange,
                format!("collaboration.algorithm: {}", e),
            ));
        }
        if self.collaboration.quorum == Some(0) {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::ZeroLimit,
                "collaboration.quorum must be at least 1",
            ));
        }
        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestra_domain::quorum::VotingAlgorithm;

    #[test]
    fn test_default_is_valid() {
        let issues = EngineConfig::default().validate();
        assert!(!ConfigIssue::has_errors(&issues), "{:?}", issues);
    }

    #[test]
    fn test_collects_every_issue() {
        let mut config = EngineConfig::default();
        config.agent.max_iterations = 0;
        config.execution.max_parallel = 0;
        config.collaboration.algorithm = VotingAlgorithm::Supermajority { threshold: 1.5 };
        let issues = config.validate();
        assert_eq!(
            issues
                .iter()
                .filter(|i| i.severity == orchestra_domain::Severity::Error)
                .count(),
            3
        );
    }

    #[test]
    fn test_empty_chain_is_warning() {
        let mut config = EngineConfig::default();
        config.recovery.strategies.clear();
        let issues = config.validate();
        assert!(!ConfigIssue::has_errors(&issues));
        assert!(issues.iter().any(|i| i.code == ConfigIssueCode::EmptyChain));
    }
}
