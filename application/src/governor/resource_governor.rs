//! Budget enforcement shared by every task of an engine.
//!
//! ```text
//! ConcurrentTasks ─ counting slots   (released by caller)
//! Memory          ─ running estimate (released by caller)
//! Tokens          ─ token bucket + minute/hour windows (consumed)
//! ToolCalls       ─ token bucket + minute/hour windows (consumed)
//! ```
//!
//! All counters live behind one mutex, so a grant is a single atomic
//! check-and-commit. Waiters park on a [`Notify`] and re-check whenever
//! something is released, or when the bucket should have refilled.

use crate::config::GovernorConfig;
use orchestra_domain::core::clock::{Clock, SystemClock};
use orchestra_domain::resource::{
    DenyReason, EnforcementMode, ResourceKind, ResourceSnapshot, ResourceUsage, RollingUsage,
    TokenBucket, Violation,
};
use orchestra_domain::tool::ToolError;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const MAX_RECENT_VIOLATIONS: usize = 64;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GovernorError {
    #[error("{kind} unavailable: requested {requested}, available {available} ({reason})")]
    Denied {
        kind: ResourceKind,
        requested: u64,
        available: u64,
        reason: DenyReason,
    },

    #[error("Operation cancelled")]
    Cancelled,
}

impl GovernorError {
    /// Tool-level form of this error, for folding into a call result
    pub fn to_tool_error(&self) -> ToolError {
        match self {
            GovernorError::Cancelled => ToolError::cancelled(),
            other => ToolError::budget_exhausted(other.to_string()),
        }
    }
}

/// A denial plus how long until retrying could help
struct Denial {
    available: u64,
    reason: DenyReason,
    retry_after: Option<Duration>,
}

struct GovernorState {
    tokens: TokenBucket,
    calls: TokenBucket,
    slots_in_use: u64,
    memory_in_use: u64,
    usage: HashMap<ResourceKind, RollingUsage>,
    violations: VecDeque<Violation>,
    violations_total: u64,
}

/// Engine-wide budget enforcement.
///
/// In [`EnforcementMode::Monitor`] every request is granted and over-budget
/// requests are only recorded as violations.
pub struct ResourceGovernor {
    config: GovernorConfig,
    state: Mutex<GovernorState>,
    released: Notify,
    clock: Arc<dyn Clock>,
}

fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

impl ResourceGovernor {
    pub fn new(config: GovernorConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: GovernorConfig, clock: Arc<dyn Clock>) -> Self {
        let t = now();
        let budget = &config.budget;
        let usage = ResourceKind::ALL
            .iter()
            .map(|kind| (*kind, RollingUsage::new(t)))
            .collect();
        let state = GovernorState {
            tokens: TokenBucket::per_minute(budget.tokens_per_minute, budget.token_burst, t),
            calls: TokenBucket::per_minute(
                budget.tool_calls_per_minute,
                budget.tool_call_burst,
                t,
            ),
            slots_in_use: 0,
            memory_in_use: 0,
            usage,
            violations: VecDeque::new(),
            violations_total: 0,
        };
        Self {
            config,
            state: Mutex::new(state),
            released: Notify::new(),
            clock,
        }
    }

    pub fn config(&self) -> &GovernorConfig {
        &self.config
    }

    /// Wall-clock budget for one task
    pub fn task_timeout(&self) -> Option<Duration> {
        self.config.budget.task_timeout()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, GovernorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn limit(&self, kind: ResourceKind) -> u64 {
        let budget = &self.config.budget;
        match kind {
            ResourceKind::ConcurrentTasks => budget.max_concurrent_tasks,
            ResourceKind::Tokens => budget.token_burst.max(1),
            ResourceKind::ToolCalls => budget.tool_call_burst.max(1),
            ResourceKind::Memory => budget.memory_ceiling_bytes,
        }
    }

    /// Check and commit in one step. On denial nothing changes.
    fn check(
        &self,
        state: &mut GovernorState,
        kind: ResourceKind,
        amount: u64,
        t: Instant,
    ) -> Result<(), Denial> {
        let limit = self.limit(kind);
        match kind {
            ResourceKind::ConcurrentTasks | ResourceKind::Memory => {
                let held = if kind == ResourceKind::ConcurrentTasks {
                    &mut state.slots_in_use
                } else {
                    &mut state.memory_in_use
                };
                let available = limit.saturating_sub(*held);
                if amount > limit {
                    return Err(Denial {
                        available,
                        reason: DenyReason::ExceedsCapacity,
                        retry_after: None,
                    });
                }
                if amount > available {
                    return Err(Denial {
                        available,
                        reason: DenyReason::Unavailable,
                        retry_after: None,
                    });
                }
                *held += amount;
            }
            ResourceKind::Tokens | ResourceKind::ToolCalls => {
                if let Some(hourly) = self.config.budget.hourly_limit(kind)
                    && let Some(usage) = state.usage.get_mut(&kind)
                    && !usage.hour.fits(amount, hourly, t)
                {
                    let used = usage.hour.used(t);
                    return Err(Denial {
                        available: hourly.saturating_sub(used),
                        reason: if amount > hourly {
                            DenyReason::ExceedsCapacity
                        } else {
                            DenyReason::HourlyQuota
                        },
                        retry_after: (amount <= hourly).then(|| usage.hour.resets_in(t)),
                    });
                }
                let bucket = if kind == ResourceKind::Tokens {
                    &mut state.tokens
                } else {
                    &mut state.calls
                };
                if !bucket.try_take(amount, t) {
                    let retry_after = bucket.time_until(amount, t);
                    return Err(Denial {
                        available: bucket.available(t),
                        reason: if retry_after.is_none() {
                            DenyReason::ExceedsCapacity
                        } else {
                            DenyReason::Unavailable
                        },
                        retry_after,
                    });
                }
            }
        }
        if let Some(usage) = state.usage.get_mut(&kind) {
            usage.record(amount, t);
        }
        Ok(())
    }

    /// Commit regardless of budget (monitor mode)
    fn force(&self, state: &mut GovernorState, kind: ResourceKind, amount: u64, t: Instant) {
        match kind {
            ResourceKind::ConcurrentTasks => state.slots_in_use += amount,
            ResourceKind::Memory => state.memory_in_use += amount,
            ResourceKind::Tokens => state.tokens.force_take(amount, t),
            ResourceKind::ToolCalls => state.calls.force_take(amount, t),
        }
        if let Some(usage) = state.usage.get_mut(&kind) {
            usage.record(amount, t);
        }
    }

    fn record_violation(
        &self,
        state: &mut GovernorState,
        kind: ResourceKind,
        amount: u64,
        available: u64,
        reason: DenyReason,
    ) {
        warn!(
            resource = %kind,
            requested = amount,
            available,
            reason = %reason,
            mode = ?self.config.mode,
            "Resource budget exceeded"
        );
        state.violations_total += 1;
        if state.violations.len() == MAX_RECENT_VIOLATIONS {
            state.violations.pop_front();
        }
        state.violations.push_back(Violation {
            kind,
            requested: amount,
            available,
            reason,
            mode: self.config.mode,
            at: self.clock.now_millis(),
        });
    }

    fn attempt(&self, kind: ResourceKind, amount: u64, record: bool) -> Result<(), Denial> {
        let t = now();
        let mut state = self.lock();
        match self.check(&mut state, kind, amount, t) {
            Ok(()) => {
                debug!(resource = %kind, amount, "Resource granted");
                Ok(())
            }
            Err(denial) if self.config.mode == EnforcementMode::Monitor => {
                self.record_violation(&mut state, kind, amount, denial.available, denial.reason);
                self.force(&mut state, kind, amount, t);
                Ok(())
            }
            Err(denial) => {
                if record {
                    self.record_violation(
                        &mut state,
                        kind,
                        amount,
                        denial.available,
                        denial.reason,
                    );
                }
                Err(denial)
            }
        }
    }

    /// Grant `amount` of `kind` now, or deny without blocking.
    pub fn try_acquire(&self, kind: ResourceKind, amount: u64) -> Result<(), GovernorError> {
        self.attempt(kind, amount, true)
            .map_err(|d| GovernorError::Denied {
                kind,
                requested: amount,
                available: d.available,
                reason: d.reason,
            })
    }

    /// Return capacity.
    ///
    /// Slots and memory go back to the pool. For rate resources this hands
    /// back tokens that were reserved but not used.
    pub fn release(&self, kind: ResourceKind, amount: u64) {
        {
            let t = now();
            let mut state = self.lock();
            match kind {
                ResourceKind::ConcurrentTasks => {
                    state.slots_in_use = state.slots_in_use.saturating_sub(amount)
                }
                ResourceKind::Memory => {
                    state.memory_in_use = state.memory_in_use.saturating_sub(amount)
                }
                ResourceKind::Tokens => state.tokens.give_back(amount, t),
                ResourceKind::ToolCalls => state.calls.give_back(amount, t),
            }
        }
        self.released.notify_waiters();
    }

    /// Block until `amount` is granted or `timeout` elapses.
    ///
    /// Returns `false` on timeout, or immediately when `amount` can never
    /// fit. On `true` the amount has been acquired.
    pub async fn wait_until_available(
        &self,
        kind: ResourceKind,
        amount: u64,
        timeout: Duration,
    ) -> bool {
        self.wait(kind, amount, timeout, None).await.is_ok()
    }

    async fn wait(
        &self,
        kind: ResourceKind,
        amount: u64,
        timeout: Duration,
        cancel: Option<&CancellationToken>,
    ) -> Result<(), GovernorError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.released.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let denial = match self.attempt(kind, amount, false) {
                Ok(()) => return Ok(()),
                Err(d) => d,
            };
            let denied = |d: &Denial, reason| GovernorError::Denied {
                kind,
                requested: amount,
                available: d.available,
                reason,
            };
            if denial.reason == DenyReason::ExceedsCapacity {
                let mut state = self.lock();
                self.record_violation(&mut state, kind, amount, denial.available, denial.reason);
                return Err(denied(&denial, denial.reason));
            }

            let wake_at = denial
                .retry_after
                .map(|d| (tokio::time::Instant::now() + d).min(deadline))
                .unwrap_or(deadline);
            let cancelled = async {
                match cancel {
                    Some(token) => token.cancelled().await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                biased;
                _ = cancelled => return Err(GovernorError::Cancelled),
                _ = &mut notified => {}
                _ = tokio::time::sleep_until(wake_at) => {
                    if wake_at >= deadline {
                        if self.attempt(kind, amount, false).is_ok() {
                            return Ok(());
                        }
                        let mut state = self.lock();
                        self.record_violation(
                            &mut state,
                            kind,
                            amount,
                            denial.available,
                            DenyReason::Timeout,
                        );
                        return Err(denied(&denial, DenyReason::Timeout));
                    }
                }
            }
        }
    }

    /// Acquire according to the configured over-limit policy: deny at once
    /// under `Reject`, wait up to the timeout under `Wait`.
    pub async fn acquire(
        &self,
        kind: ResourceKind,
        amount: u64,
        cancel: &CancellationToken,
    ) -> Result<(), GovernorError> {
        if cancel.is_cancelled() {
            return Err(GovernorError::Cancelled);
        }
        match self.config.over_limit.wait_timeout() {
            None => self.try_acquire(kind, amount),
            Some(timeout) => self.wait(kind, amount, timeout, Some(cancel)).await,
        }
    }

    /// Like [`acquire`](Self::acquire), releasing slots or memory when the
    /// lease is dropped. Rate resources are consumed and never released.
    pub async fn lease(
        &self,
        kind: ResourceKind,
        amount: u64,
        cancel: &CancellationToken,
    ) -> Result<ResourceLease<'_>, GovernorError> {
        self.acquire(kind, amount, cancel).await?;
        Ok(ResourceLease {
            governor: self,
            kind,
            amount,
        })
    }

    /// An empty lease on `kind`, grown with [`ResourceLease::charge`]
    pub fn hold(&self, kind: ResourceKind) -> ResourceLease<'_> {
        ResourceLease {
            governor: self,
            kind,
            amount: 0,
        }
    }

    /// Point-in-time usage of every resource
    pub fn status(&self) -> ResourceSnapshot {
        let t = now();
        let mut state = self.lock();
        let resources = ResourceKind::ALL
            .iter()
            .map(|kind| {
                let current = match kind {
                    ResourceKind::ConcurrentTasks => state.slots_in_use,
                    ResourceKind::Memory => state.memory_in_use,
                    ResourceKind::Tokens => state.tokens.available(t),
                    ResourceKind::ToolCalls => state.calls.available(t),
                };
                let totals = state
                    .usage
                    .get_mut(kind)
                    .map(|u| u.totals(t))
                    .unwrap_or_default();
                ResourceUsage {
                    kind: *kind,
                    limit: self.limit(*kind),
                    current,
                    totals,
                }
            })
            .collect();
        ResourceSnapshot {
            mode: self.config.mode,
            resources,
            violations_total: state.violations_total,
            recent_violations: state.violations.iter().cloned().collect(),
        }
    }
}

/// Held capacity, returned on drop
pub struct ResourceLease<'a> {
    governor: &'a ResourceGovernor,
    kind: ResourceKind,
    amount: u64,
}

impl ResourceLease<'_> {
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn amount(&self) -> u64 {
        self.amount
    }

    /// Add `amount` to what this lease holds, without waiting
    pub fn charge(&mut self, amount: u64) -> Result<(), GovernorError> {
        self.governor.try_acquire(self.kind, amount)?;
        self.amount += amount;
        Ok(())
    }
}

impl Drop for ResourceLease<'_> {
    fn drop(&mut self) {
        if !self.kind.is_rate() {
            self.governor.release(self.kind, self.amount);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestra_domain::resource::{OverLimitPolicy, ResourceBudget};

    fn governor(mode: EnforcementMode, over_limit: OverLimitPolicy) -> ResourceGovernor {
        ResourceGovernor::new(GovernorConfig {
            budget: ResourceBudget {
                max_concurrent_tasks: 2,
                tokens_per_minute: 600,
                token_burst: 100,
                tool_calls_per_minute: 60,
                tool_call_burst: 5,
                memory_ceiling_bytes: 1_000,
                ..Default::default()
            },
            mode,
            over_limit,
        })
    }

    #[test]
    fn test_reject_denies_without_blocking() {
        let gov = governor(EnforcementMode::Enforce, OverLimitPolicy::Reject);
        assert!(gov.try_acquire(ResourceKind::ConcurrentTasks, 2).is_ok());
        let err = gov.try_acquire(ResourceKind::ConcurrentTasks, 1).unwrap_err();
        assert!(matches!(
            err,
            GovernorError::Denied {
                reason: DenyReason::Unavailable,
                available: 0,
                ..
            }
        ));
        gov.release(ResourceKind::ConcurrentTasks, 1);
        assert!(gov.try_acquire(ResourceKind::ConcurrentTasks, 1).is_ok());
    }

    #[test]
    fn test_token_burst_then_denied() {
        let gov = governor(EnforcementMode::Enforce, OverLimitPolicy::Reject);
        assert!(gov.try_acquire(ResourceKind::Tokens, 100).is_ok());
        assert!(gov.try_acquire(ResourceKind::Tokens, 1).is_err());
        let snapshot = gov.status();
        assert_eq!(snapshot.violations_total, 1);
        assert_eq!(
            snapshot.usage(ResourceKind::Tokens).unwrap().totals.last_minute,
            100
        );
    }

    #[test]
    fn test_memory_ceiling() {
        let gov = governor(EnforcementMode::Enforce, OverLimitPolicy::Reject);
        assert!(gov.try_acquire(ResourceKind::Memory, 800).is_ok());
        assert!(gov.try_acquire(ResourceKind::Memory, 300).is_err());
        assert_eq!(gov.status().usage(ResourceKind::Memory).unwrap().current, 800);
    }

    #[test]
    fn test_held_lease_grows_then_releases() {
        let gov = governor(EnforcementMode::Enforce, OverLimitPolicy::Reject);
        {
            let mut lease = gov.hold(ResourceKind::Memory);
            lease.charge(600).unwrap();
            lease.charge(300).unwrap();
            assert!(lease.charge(200).is_err());
            assert_eq!(lease.amount(), 900);
            assert_eq!(gov.status().usage(ResourceKind::Memory).unwrap().current, 900);
        }
        assert_eq!(gov.status().usage(ResourceKind::Memory).unwrap().current, 0);
    }

    #[test]
    fn test_monitor_mode_grants_and_records() {
        let gov = governor(EnforcementMode::Monitor, OverLimitPolicy::Reject);
        for _ in 0..3 {
            assert!(gov.try_acquire(ResourceKind::ConcurrentTasks, 1).is_ok());
        }
        let snapshot = gov.status();
        assert_eq!(snapshot.violations_total, 1);
        assert_eq!(snapshot.recent_violations[0].mode, EnforcementMode::Monitor);
        assert_eq!(
            snapshot.usage(ResourceKind::ConcurrentTasks).unwrap().current,
            3
        );
    }

    #[test]
    fn test_hourly_quota_independent_of_bucket() {
        let gov = ResourceGovernor::new(GovernorConfig {
            budget: ResourceBudget {
                tool_calls_per_minute: 600,
                tool_call_burst: 100,
                tool_calls_per_hour: Some(3),
                ..Default::default()
            },
            mode: EnforcementMode::Enforce,
            over_limit: OverLimitPolicy::Reject,
        });
        for _ in 0..3 {
            assert!(gov.try_acquire(ResourceKind::ToolCalls, 1).is_ok());
        }
        let err = gov.try_acquire(ResourceKind::ToolCalls, 1).unwrap_err();
        assert!(matches!(
            err,
            GovernorError::Denied {
                reason: DenyReason::HourlyQuota,
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_granted_when_capacity_frees() {
        let gov = Arc::new(governor(
            EnforcementMode::Enforce,
            OverLimitPolicy::Wait { timeout_ms: 5_000 },
        ));
        gov.try_acquire(ResourceKind::ConcurrentTasks, 2).unwrap();

        let releaser = {
            let gov = gov.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                gov.release(ResourceKind::ConcurrentTasks, 1);
            })
        };

        let granted = gov
            .wait_until_available(ResourceKind::ConcurrentTasks, 1, Duration::from_secs(5))
            .await;
        releaser.await.unwrap();
        assert!(granted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_denied_only_after_timeout() {
        let gov = governor(
            EnforcementMode::Enforce,
            OverLimitPolicy::Wait { timeout_ms: 200 },
        );
        gov.try_acquire(ResourceKind::ConcurrentTasks, 2).unwrap();

        let start = tokio::time::Instant::now();
        let granted = gov
            .wait_until_available(ResourceKind::ConcurrentTasks, 1, Duration::from_millis(200))
            .await;
        assert!(!granted);
        assert!(start.elapsed() >= Duration::from_millis(200));
        assert_eq!(
            gov.status().recent_violations[0].reason,
            DenyReason::Timeout
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_bucket_refill() {
        let gov = governor(
            EnforcementMode::Enforce,
            OverLimitPolicy::Wait { timeout_ms: 10_000 },
        );
        // 5 burst, 1 per second refill
        gov.try_acquire(ResourceKind::ToolCalls, 5).unwrap();
        let start = tokio::time::Instant::now();
        assert!(
            gov.wait_until_available(ResourceKind::ToolCalls, 2, Duration::from_secs(10))
                .await
        );
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_over_capacity_denied_immediately_in_wait_mode() {
        let gov = governor(
            EnforcementMode::Enforce,
            OverLimitPolicy::Wait { timeout_ms: 10_000 },
        );
        let start = tokio::time::Instant::now();
        let err = gov
            .acquire(ResourceKind::Tokens, 1_000, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GovernorError::Denied {
                reason: DenyReason::ExceedsCapacity,
                ..
            }
        ));
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_honors_cancellation() {
        let gov = governor(
            EnforcementMode::Enforce,
            OverLimitPolicy::Wait { timeout_ms: 60_000 },
        );
        gov.try_acquire(ResourceKind::ConcurrentTasks, 2).unwrap();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });
        let err = gov
            .acquire(ResourceKind::ConcurrentTasks, 1, &cancel)
            .await
            .unwrap_err();
        assert_eq!(err, GovernorError::Cancelled);
    }

    #[tokio::test]
    async fn test_lease_releases_on_drop() {
        let gov = governor(EnforcementMode::Enforce, OverLimitPolicy::Reject);
        let cancel = CancellationToken::new();
        {
            let lease = gov
                .lease(ResourceKind::ConcurrentTasks, 2, &cancel)
                .await
                .unwrap();
            assert_eq!(lease.amount(), 2);
            assert!(gov.try_acquire(ResourceKind::ConcurrentTasks, 1).is_err());
        }
        assert!(gov.try_acquire(ResourceKind::ConcurrentTasks, 1).is_ok());
    }
}
