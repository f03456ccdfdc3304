//! Collaboration configuration from TOML (`[collaboration]` section)

use super::unknown_value;
use orchestra_application::CollaborationConfig;
use orchestra_domain::core::validation::ConfigIssue;
use orchestra_domain::{AgentId, ConflictStrategy, RoleWeights, VotingAlgorithm};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Raw collaboration configuration
///
/// # Example
///
/// ```toml
/// [collaboration]
/// enabled = true
/// algorithm = "supermajority:0.75"   # "majority", "weighted:T", "delegated:T", "66%"
/// quorum = 0                         # 0 = majority of the voters
/// conflict_strategy = "arbitration"
/// arbiter = "lead-1"
///
/// [collaboration.role_weights]
/// lead = 3.0
/// expert = 2.0
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileCollaborationConfig {
    pub enabled: bool,
    pub algorithm: String,
    pub quorum: usize,
    pub vote_timeout_secs: u64,
    pub delegation_timeout_secs: u64,
    pub max_delegation_depth: u32,
    pub conflict_strategy: String,
    pub arbiter: Option<String>,
    pub mediator: Option<String>,
    pub role_weights: RoleWeights,
}

impl Default for FileCollaborationConfig {
    fn default() -> Self {
        let defaults = CollaborationConfig::default();
        Self {
            enabled: defaults.enabled,
            algorithm: "majority".to_string(),
            quorum: 0,
            vote_timeout_secs: defaults.vote_timeout.as_secs(),
            delegation_timeout_secs: defaults.delegation_timeout.as_secs(),
            max_delegation_depth: defaults.max_delegation_depth,
            conflict_strategy: "mediation".to_string(),
            arbiter: None,
            mediator: None,
            role_weights: defaults.role_weights,
        }
    }
}

impl FileCollaborationConfig {
    pub fn parse_algorithm(&self) -> (VotingAlgorithm, Vec<ConfigIssue>) {
        match self.algorithm.parse::<VotingAlgorithm>() {
            Ok(algorithm) => (algorithm, vec![]),
            Err(e) => (
                VotingAlgorithm::default(),
                vec![unknown_value(
                    "collaboration.algorithm",
                    &self.algorithm,
                    &format!("majority ({})", e),
                )],
            ),
        }
    }

    pub fn parse_conflict_strategy(&self) -> (ConflictStrategy, Vec<ConfigIssue>) {
        match self.conflict_strategy.trim().parse::<ConflictStrategy>() {
            Ok(strategy) => (strategy, vec![]),
            Err(_) => (
                ConflictStrategy::default(),
                vec![unknown_value(
                    "collaboration.conflict_strategy",
                    &self.conflict_strategy,
                    "mediation",
                )],
            ),
        }
    }

    pub fn to_collaboration_config(&self) -> (CollaborationConfig, Vec<ConfigIssue>) {
        let (algorithm, mut issues) = self.parse_algorithm();
        let (conflict_strategy, more) = self.parse_conflict_strategy();
        issues.extend(more);

        let agent = |id: &Option<String>| {
            id.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(AgentId::new)
        };
        let config = CollaborationConfig {
            enabled: self.enabled,
            algorithm,
            quorum: (self.quorum > 0).then_some(self.quorum),
            vote_timeout: Duration::from_secs(self.vote_timeout_secs),
            delegation_timeout: Duration::from_secs(self.delegation_timeout_secs),
            max_delegation_depth: self.max_delegation_depth,
            conflict_strategy,
            arbiter: agent(&self.arbiter),
            mediator: agent(&self.mediator),
            role_weights: self.role_weights.clone(),
        };
        (config, issues)
    }
}
