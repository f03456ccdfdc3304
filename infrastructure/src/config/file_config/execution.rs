//! Tool execution configuration from TOML (`[execution]` section)

use super::unknown_value;
use orchestra_application::{CacheConfig, ExecutionConfig, RateLimitConfig};
use orchestra_domain::core::validation::ConfigIssue;
use orchestra_domain::tool::CircuitPolicy;
use orchestra_domain::{TtlContext, TtlStrategy};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Raw tool execution configuration
///
/// # Example
///
/// ```toml
/// [execution]
/// max_parallel = 4
/// batch_timeout_secs = 120     # 0 = no batch timeout
/// call_timeout_secs = 60       # 0 = no per-call timeout
/// tenant = "team-a"
///
/// [execution.cache]
/// strategy = "content_aware"   # "default", "no_cache", "content_aware", "fixed:<secs>"
/// per_tool = { clock = "no_cache" }
///
/// [execution.circuit_breaker]
/// failure_threshold = 5
/// cooldown_secs = 30
///
/// [execution.rate_limit]
/// calls_per_minute = 60
/// burst = 10
/// per_tool = { search = { calls_per_minute = 6, burst = 1 } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileExecutionConfig {
    pub max_parallel: usize,
    pub batch_timeout_secs: u64,
    pub call_timeout_secs: u64,
    /// Scopes cache keys; also the default tenant for tasks
    pub tenant: Option<String>,
    pub cache: FileCacheConfig,
    pub circuit_breaker: FileCircuitBreakerConfig,
    pub rate_limit: FileRateLimitConfig,
}

impl Default for FileExecutionConfig {
    fn default() -> Self {
        Self {
            max_parallel: 4,
            batch_timeout_secs: 120,
            call_timeout_secs: 60,
            tenant: None,
            cache: FileCacheConfig::default(),
            circuit_breaker: FileCircuitBreakerConfig::default(),
            rate_limit: FileRateLimitConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileCacheConfig {
    pub enabled: bool,
    /// Entry count of the in-memory fast tier
    pub fast_capacity: u64,
    pub strategy: String,
    pub per_tool: HashMap<String, String>,
    pub default_ttl_secs: u64,
    pub min_ttl_secs: u64,
    pub max_ttl_secs: u64,
}

impl Default for FileCacheConfig {
    fn default() -> Self {
        let ttl = TtlContext::default();
        Self {
            enabled: true,
            fast_capacity: 1_000,
            strategy: "default".to_string(),
            per_tool: HashMap::new(),
            default_ttl_secs: ttl.default_ttl_secs,
            min_ttl_secs: ttl.min_ttl_secs,
            max_ttl_secs: ttl.max_ttl_secs,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileCircuitBreakerConfig {
    pub failure_threshold: u32,
    pub cooldown_secs: u64,
}

impl Default for FileCircuitBreakerConfig {
    fn default() -> Self {
        let policy = CircuitPolicy::default();
        Self {
            failure_threshold: policy.failure_threshold,
            cooldown_secs: policy.cooldown.as_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileRateLimitConfig {
    pub calls_per_minute: u64,
    pub burst: u64,
    /// Longest a call waits for a token
    pub max_wait_ms: u64,
    pub per_tool: HashMap<String, FileToolRateLimit>,
}

impl Default for FileRateLimitConfig {
    fn default() -> Self {
        let limit = RateLimitConfig::default();
        Self {
            calls_per_minute: limit.calls_per_minute,
            burst: limit.burst,
            max_wait_ms: limit.max_wait.as_millis() as u64,
            per_tool: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileToolRateLimit {
    pub calls_per_minute: u64,
    pub burst: u64,
}

/// `None` for names that are not recognised.
fn parse_ttl_strategy(name: &str) -> Option<TtlStrategy> {
    let lower = name.trim().to_lowercase();
    match lower.as_str() {
        "default" => Some(TtlStrategy::Default),
        "no_cache" | "none" | "off" => Some(TtlStrategy::NoCache),
        "content_aware" | "adaptive" => Some(TtlStrategy::ContentAware),
        other => other
            .strip_prefix("fixed:")
            .and_then(|secs| secs.trim().parse::<u64>().ok())
            .map(|secs| TtlStrategy::Fixed { secs }),
    }
}

const TTL_STRATEGIES: &str = "default, no_cache, content_aware, fixed:<secs>";

impl FileCacheConfig {
    pub fn parse_strategy(&self) -> (TtlStrategy, Vec<ConfigIssue>) {
        match parse_ttl_strategy(&self.strategy) {
            Some(strategy) => (strategy, vec![]),
            None => (
                TtlStrategy::Default,
                vec![unknown_value(
                    "execution.cache.strategy",
                    &self.strategy,
                    &format!("default (valid: {})", TTL_STRATEGIES),
                )],
            ),
        }
    }

    /// Per-tool strategies; unrecognised entries are dropped with a warning.
    pub fn parse_per_tool(&self) -> (HashMap<String, TtlStrategy>, Vec<ConfigIssue>) {
        let mut issues = Vec::new();
        let mut strategies = HashMap::new();
        for (tool, name) in &self.per_tool {
            match parse_ttl_strategy(name) {
                Some(strategy) => {
                    strategies.insert(tool.clone(), strategy);
                }
                None => issues.push(unknown_value(
                    &format!("execution.cache.per_tool.{}", tool),
                    name,
                    "the global strategy",
                )),
            }
        }
        (strategies, issues)
    }
}

impl FileExecutionConfig {
    pub fn to_execution_config(&self) -> (ExecutionConfig, Vec<ConfigIssue>) {
        let (strategy, mut issues) = self.cache.parse_strategy();
        let (per_tool, more) = self.cache.parse_per_tool();
        issues.extend(more);

        let secs = |n: u64| (n > 0).then(|| Duration::from_secs(n));
        let max_wait = Duration::from_millis(self.rate_limit.max_wait_ms);
        let rate_limit_overrides = self
            .rate_limit
            .per_tool
            .iter()
            .map(|(tool, limit)| {
                (
                    tool.clone(),
                    RateLimitConfig {
                        calls_per_minute: limit.calls_per_minute,
                        burst: limit.burst,
                        max_wait,
                    },
                )
            })
            .collect();

        let config = ExecutionConfig {
            max_parallel: self.max_parallel,
            batch_timeout: secs(self.batch_timeout_secs),
            call_timeout: secs(self.call_timeout_secs),
            cache: CacheConfig {
                enabled: self.cache.enabled,
                strategy,
                per_tool,
                ttl: TtlContext {
                    default_ttl_secs: self.cache.default_ttl_secs,
                    min_ttl_secs: self.cache.min_ttl_secs,
                    max_ttl_secs: self.cache.max_ttl_secs,
                    ..Default::default()
                },
            },
            circuit: CircuitPolicy {
                failure_threshold: self.circuit_breaker.failure_threshold,
                cooldown: Duration::from_secs(self.circuit_breaker.cooldown_secs),
            },
            rate_limit: RateLimitConfig {
                calls_per_minute: self.rate_limit.calls_per_minute,
                burst: self.rate_limit.burst,
                max_wait,
            },
            rate_limit_overrides,
        };
        (config, issues)
    }
}
