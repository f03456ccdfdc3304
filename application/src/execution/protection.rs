//! Per-tool protection: circuit breakers and outbound token buckets.
//!
//! Both tables are shared by every task using the executor. Each entry is
//! created on first use and mutated only under the table's mutex, so state
//! transitions are atomic.

use crate::config::RateLimitConfig;
use orchestra_domain::resource::TokenBucket;
use orchestra_domain::tool::{
    Admission, CircuitBreaker, CircuitPolicy, CircuitSnapshot, CircuitState, ToolError,
};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

/// How an admitted call ended, from the breaker's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallVerdict {
    Success,
    /// The backend failed
    Failure,
    /// Ended without saying anything about the backend
    Abandoned,
}

/// Circuit breaker per tool
#[derive(Debug)]
pub struct CircuitRegistry {
    policy: CircuitPolicy,
    breakers: Mutex<HashMap<String, CircuitBreaker>>,
}

impl CircuitRegistry {
    pub fn new(policy: CircuitPolicy) -> Self {
        Self {
            policy,
            breakers: Mutex::new(HashMap::new()),
        }
    }

    fn with_breaker<R>(&self, tool_id: &str, f: impl FnOnce(&mut CircuitBreaker) -> R) -> R {
        let mut breakers = self.breakers.lock().unwrap_or_else(PoisonError::into_inner);
        let breaker = breakers
            .entry(tool_id.to_string())
            .or_insert_with(|| CircuitBreaker::new(self.policy.clone()));
        f(breaker)
    }

    /// Admit a call, or return how long until the circuit may let one through.
    ///
    /// The permit must be finished with a verdict; a permit dropped without
    /// one counts as abandoned, so a half-open probe is never lost.
    pub fn admit(&self, tool_id: &str) -> Result<CircuitPermit<'_>, Duration> {
        let admission = self.with_breaker(tool_id, |breaker| breaker.try_acquire(now()))?;
        if admission == Admission::Probe {
            info!(tool = %tool_id, "Circuit half-open, sending probe");
        }
        Ok(CircuitPermit {
            registry: self,
            tool_id: tool_id.to_string(),
            admission,
            finished: false,
        })
    }

    fn record(&self, tool_id: &str, admission: Admission, verdict: CallVerdict) {
        self.with_breaker(tool_id, |breaker| {
            let before = breaker.state();
            match verdict {
                CallVerdict::Success => breaker.record_success(admission),
                CallVerdict::Failure => breaker.record_failure(admission, now()),
                CallVerdict::Abandoned => breaker.record_abandoned(admission),
            }
            let after = breaker.state();
            if before != after {
                match after {
                    CircuitState::Open => warn!(tool = %tool_id, "Circuit opened"),
                    CircuitState::Closed => info!(tool = %tool_id, "Circuit closed"),
                    CircuitState::HalfOpen => {}
                }
            }
        })
    }

    pub fn snapshot(&self, tool_id: &str) -> Option<CircuitSnapshot> {
        let breakers = self.breakers.lock().unwrap_or_else(PoisonError::into_inner);
        breakers.get(tool_id).map(CircuitBreaker::snapshot)
    }

    pub fn snapshots(&self) -> Vec<(String, CircuitSnapshot)> {
        let breakers = self.breakers.lock().unwrap_or_else(PoisonError::into_inner);
        let mut all: Vec<_> = breakers
            .iter()
            .map(|(id, b)| (id.clone(), b.snapshot()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    /// Force a tool's circuit closed
    pub fn reset(&self, tool_id: &str) {
        self.with_breaker(tool_id, CircuitBreaker::reset);
        info!(tool = %tool_id, "Circuit reset");
    }
}

/// An admitted call, waiting for its verdict
pub struct CircuitPermit<'a> {
    registry: &'a CircuitRegistry,
    tool_id: String,
    admission: Admission,
    finished: bool,
}

impl CircuitPermit<'_> {
    pub fn admission(&self) -> Admission {
        self.admission
    }

    pub fn finish(mut self, verdict: CallVerdict) {
        self.finished = true;
        self.registry.record(&self.tool_id, self.admission, verdict);
    }
}

impl Drop for CircuitPermit<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.registry
                .record(&self.tool_id, self.admission, CallVerdict::Abandoned);
        }
    }
}

/// Outbound token bucket per tool
#[derive(Debug, Default)]
pub struct ToolRateLimiter {
    buckets: Mutex<HashMap<String, TokenBucket>>,
}

impl ToolRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    fn take_or_wait(&self, tool_id: &str, limits: &RateLimitConfig) -> Option<Duration> {
        let t = now();
        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        let bucket = buckets
            .entry(tool_id.to_string())
            .or_insert_with(|| TokenBucket::per_minute(limits.calls_per_minute, limits.burst, t));
        if bucket.try_take(1, t) {
            Some(Duration::ZERO)
        } else {
            bucket.time_until(1, t)
        }
    }

    /// Take one call token, waiting up to `limits.max_wait` for a refill.
    pub async fn acquire(
        &self,
        tool_id: &str,
        limits: &RateLimitConfig,
        cancel: &CancellationToken,
    ) -> Result<(), ToolError> {
        let mut waited = Duration::ZERO;
        loop {
            let wait = match self.take_or_wait(tool_id, limits) {
                Some(d) if d.is_zero() => return Ok(()),
                Some(d) if waited + d <= limits.max_wait => d,
                _ => return Err(ToolError::rate_limited(tool_id)),
            };
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ToolError::cancelled()),
                _ = tokio::time::sleep(wait) => waited += wait,
            }
        }
    }
}
