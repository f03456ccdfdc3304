//! Per-subsystem configuration.

use orchestra_domain::cache::{TtlContext, TtlStrategy};
use orchestra_domain::quorum::{ConflictStrategy, RoleWeights, VotingAlgorithm};
use orchestra_domain::recovery::{FallbackRoute, RecoveryStrategy, RetryPolicy};
use orchestra_domain::resource::{EnforcementMode, OverLimitPolicy, ResourceBudget};
use orchestra_domain::tool::CircuitPolicy;
use orchestra_domain::AgentId;
use std::collections::HashMap;
use std::time::Duration;

/// Resource governor settings
#[derive(Debug, Clone, Default)]
pub struct GovernorConfig {
    pub budget: ResourceBudget,
    pub mode: EnforcementMode,
    pub over_limit: OverLimitPolicy,
}

/// Result cache settings
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Strategy for tools without an entry in `per_tool`
    pub strategy: TtlStrategy,
    pub per_tool: HashMap<String, TtlStrategy>,
    pub ttl: TtlContext,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            strategy: TtlStrategy::Default,
            per_tool: HashMap::new(),
            ttl: TtlContext::default(),
        }
    }
}

impl CacheConfig {
    pub fn strategy_for(&self, tool_id: &str) -> &TtlStrategy {
        self.per_tool.get(tool_id).unwrap_or(&self.strategy)
    }
}

/// Per-tool outbound token bucket
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitConfig {
    pub calls_per_minute: u64,
    pub burst: u64,
    /// Longest a call waits for a token before failing as rate limited
    pub max_wait: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            calls_per_minute: 60,
            burst: 10,
            max_wait: Duration::from_secs(5),
        }
    }
}

/// Tool execution settings
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    /// Concurrency ceiling for one parallel batch
    pub max_parallel: usize,
    /// A batch not finished by then reports its stragglers as timed out
    pub batch_timeout: Option<Duration>,
    pub call_timeout: Option<Duration>,
    pub cache: CacheConfig,
    pub circuit: CircuitPolicy,
    pub rate_limit: RateLimitConfig,
    /// Overrides `rate_limit` for individual tools
    pub rate_limit_overrides: HashMap<String, RateLimitConfig>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_parallel: 4,
            batch_timeout: Some(Duration::from_secs(120)),
            call_timeout: Some(Duration::from_secs(60)),
            cache: CacheConfig::default(),
            circuit: CircuitPolicy::default(),
            rate_limit: RateLimitConfig::default(),
            rate_limit_overrides: HashMap::new(),
        }
    }
}

impl ExecutionConfig {
    pub fn rate_limit_for(&self, tool_id: &str) -> &RateLimitConfig {
        self.rate_limit_overrides
            .get(tool_id)
            .unwrap_or(&self.rate_limit)
    }
}

/// Error recovery settings
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Strategies tried in order
    pub strategies: Vec<RecoveryStrategy>,
    pub retry: RetryPolicy,
    pub fallbacks: Vec<FallbackRoute>,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            strategies: RecoveryStrategy::default_chain(),
            retry: RetryPolicy::default(),
            fallbacks: Vec::new(),
        }
    }
}

/// Collaboration and consensus settings
#[derive(Debug, Clone)]
pub struct CollaborationConfig {
    pub enabled: bool,
    pub algorithm: VotingAlgorithm,
    /// Minimum participants; `None` means a majority of the voters
    pub quorum: Option<usize>,
    pub vote_timeout: Duration,
    pub delegation_timeout: Duration,
    pub max_delegation_depth: u32,
    pub conflict_strategy: ConflictStrategy,
    pub arbiter: Option<AgentId>,
    pub mediator: Option<AgentId>,
    pub role_weights: RoleWeights,
}

impl Default for CollaborationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            algorithm: VotingAlgorithm::default(),
            quorum: None,
            vote_timeout: Duration::from_secs(30),
            delegation_timeout: Duration::from_secs(120),
            max_delegation_depth: 2,
            conflict_strategy: ConflictStrategy::default(),
            arbiter: None,
            mediator: None,
            role_weights: RoleWeights::default(),
        }
    }
}
