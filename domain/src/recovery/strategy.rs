//! Recovery strategies and retry backoff.

use super::error_kind::ErrorKind;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One step of a recovery chain.
///
/// Chains are ordered by the caller; nothing here assumes a fixed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryStrategy {
    /// Re-issue the same call with exponential backoff
    Retry,
    /// Re-issue a reduced-scope version of the call
    Simplify,
    /// Substitute a configured equivalent tool/operation
    Fallback,
    /// Hand the work to a capable peer agent
    Delegate,
    /// Stop and fail the task
    Abort,
}

impl RecoveryStrategy {
    /// The chain used when none is configured. `Abort` is opt-in.
    pub fn default_chain() -> Vec<RecoveryStrategy> {
        vec![
            RecoveryStrategy::Retry,
            RecoveryStrategy::Simplify,
            RecoveryStrategy::Fallback,
            RecoveryStrategy::Delegate,
        ]
    }

    /// Whether this strategy can do anything for an error of `kind`.
    ///
    /// Validation errors are never blindly retried. `Abort` always applies.
    pub fn is_eligible(&self, kind: ErrorKind) -> bool {
        match self {
            RecoveryStrategy::Retry => kind.is_retryable(),
            RecoveryStrategy::Simplify => {
                matches!(kind, ErrorKind::Validation | ErrorKind::Transient)
            }
            RecoveryStrategy::Fallback | RecoveryStrategy::Delegate => kind.is_recoverable(),
            RecoveryStrategy::Abort => true,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryStrategy::Retry => "retry",
            RecoveryStrategy::Simplify => "simplify",
            RecoveryStrategy::Fallback => "fallback",
            RecoveryStrategy::Delegate => "delegate",
            RecoveryStrategy::Abort => "abort",
        }
    }
}

impl std::fmt::Display for RecoveryStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RecoveryStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "retry" => Ok(RecoveryStrategy::Retry),
            "simplify" => Ok(RecoveryStrategy::Simplify),
            "fallback" => Ok(RecoveryStrategy::Fallback),
            "delegate" => Ok(RecoveryStrategy::Delegate),
            "abort" => Ok(RecoveryStrategy::Abort),
            other => Err(format!(
                "Unknown recovery strategy: {}. Valid: retry, simplify, fallback, delegate, abort",
                other
            )),
        }
    }
}

/// Exponential backoff with jitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the original failure
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    /// Fraction of the delay that may be added or removed (0.0 - 1.0)
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 100,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.2,
        }
    }
}

impl RetryPolicy {
    pub fn no_delay(max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_delay_ms: 0,
            max_delay_ms: 0,
            backoff_multiplier: 1.0,
            jitter_factor: 0.0,
        }
    }

    /// Delay before retry number `attempt` (0-based).
    ///
    /// `jitter_sample` is a uniform sample in `[0, 1)`; the caller owns
    /// randomness so this stays deterministic under test.
    pub fn delay_for_attempt(&self, attempt: u32, jitter_sample: f64) -> Duration {
        let base = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        let capped = base.min(self.max_delay_ms as f64);
        let jitter = capped * self.jitter_factor.clamp(0.0, 1.0) * (jitter_sample * 2.0 - 1.0);
        Duration::from_millis((capped + jitter).max(0.0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_chain_has_no_abort() {
        let chain = RecoveryStrategy::default_chain();
        assert_eq!(chain.len(), 4);
        assert!(!chain.contains(&RecoveryStrategy::Abort));
    }

    #[test]
    fn test_eligibility() {
        assert!(RecoveryStrategy::Retry.is_eligible(ErrorKind::Transient));
        assert!(!RecoveryStrategy::Retry.is_eligible(ErrorKind::Validation));
        assert!(RecoveryStrategy::Simplify.is_eligible(ErrorKind::Validation));
        assert!(!RecoveryStrategy::Simplify.is_eligible(ErrorKind::CapabilityGap));
        assert!(RecoveryStrategy::Fallback.is_eligible(ErrorKind::CapabilityGap));
        assert!(!RecoveryStrategy::Delegate.is_eligible(ErrorKind::Terminal));
        assert!(RecoveryStrategy::Abort.is_eligible(ErrorKind::Cancelled));
    }

    #[test]
    fn test_parse_strategy() {
        assert_eq!("RETRY".parse::<RecoveryStrategy>().ok(), Some(RecoveryStrategy::Retry));
        assert_eq!(" abort ".parse::<RecoveryStrategy>().ok(), Some(RecoveryStrategy::Abort));
        assert!("panic".parse::<RecoveryStrategy>().is_err());
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = RetryPolicy {
            max_retries: 5,
            initial_delay_ms: 100,
            max_delay_ms: 500,
            backoff_multiplier: 2.0,
            jitter_factor: 0.0,
        };
        assert_eq!(policy.delay_for_attempt(0, 0.5), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(1, 0.5), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(2, 0.5), Duration::from_millis(400));
        assert_eq!(policy.delay_for_attempt(3, 0.5), Duration::from_millis(500));
    }

    #[test]
    fn test_jitter_bounds() {
        let policy = RetryPolicy {
            jitter_factor: 0.5,
            ..RetryPolicy::default()
        };
        // sample 0.0 removes the full jitter, sample near 1.0 adds it
        assert_eq!(policy.delay_for_attempt(0, 0.0), Duration::from_millis(50));
        assert_eq!(policy.delay_for_attempt(0, 0.5), Duration::from_millis(100));
        assert!(policy.delay_for_attempt(0, 0.999) <= Duration::from_millis(150));
    }
}
