//! Per-tool circuit breaker state machine.
//!
//! Pure state transitions driven by explicit `Instant`s. The application
//! layer keeps one breaker per tool behind a mutex so every transition is
//! atomic with respect to concurrent callers.
//!
//! ```text
//!   Closed ──(N consecutive failures)──▶ Open
//!     ▲                                   │ cooldown elapsed
//!     │ probe succeeds                    ▼
//!     └───────────────────────────── HalfOpen ──(probe fails)──▶ Open
//! ```
//!
//! While half-open exactly one probe is admitted; every other caller is
//! short-circuited until the probe reports back.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        };
        write!(f, "{}", s)
    }
}

/// Breaker thresholds
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitPolicy {
    /// Consecutive failures that open the circuit
    pub failure_threshold: u32,
    /// How long the circuit stays open before a probe is allowed
    pub cooldown: Duration,
}

impl Default for CircuitPolicy {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(30),
        }
    }
}

/// Kind of admission granted by [`CircuitBreaker::try_acquire`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Normal,
    Probe,
}

/// Serializable view of a breaker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitSnapshot {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub total_failures: u64,
    pub total_short_circuits: u64,
}

#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    policy: CircuitPolicy,
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
    total_failures: u64,
    total_short_circuits: u64,
}

impl CircuitBreaker {
    pub fn new(policy: CircuitPolicy) -> Self {
        Self {
            policy,
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            probe_in_flight: false,
            total_failures: 0,
            total_short_circuits: 0,
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    /// Ask to make a call.
    ///
    /// Returns `Err(retry_after)` when the call must be short-circuited.
    pub fn try_acquire(&mut self, now: Instant) -> Result<Admission, Duration> {
        match self.state {
            CircuitState::Closed => Ok(Admission::Normal),
            CircuitState::Open => {
                let opened_at = self.opened_at.unwrap_or(now);
                let reopen_at = opened_at + self.policy.cooldown;
                if now >= reopen_at {
                    self.state = CircuitState::HalfOpen;
                    self.probe_in_flight = true;
                    Ok(Admission::Probe)
                } else {
                    self.total_short_circuits += 1;
                    Err(reopen_at - now)
                }
            }
            CircuitState::HalfOpen => {
                if self.probe_in_flight {
                    self.total_short_circuits += 1;
                    Err(Duration::ZERO)
                } else {
                    self.probe_in_flight = true;
                    Ok(Admission::Probe)
                }
            }
        }
    }

    /// Report a successful call admitted as `admission`.
    ///
    /// Only the half-open trial call can close the circuit. Successes of
    /// calls admitted before it opened are ignored while it is open or
    /// half-open.
    pub fn record_success(&mut self, admission: Admission) {
        match self.state {
            CircuitState::Closed => self.consecutive_failures = 0,
            CircuitState::HalfOpen if admission == Admission::Probe => {
                self.consecutive_failures = 0;
                self.probe_in_flight = false;
                self.opened_at = None;
                self.state = CircuitState::Closed;
            }
            CircuitState::HalfOpen | CircuitState::Open => {}
        }
    }

    /// Report a failed call admitted as `admission`
    pub fn record_failure(&mut self, admission: Admission, now: Instant) {
        self.total_failures += 1;
        match self.state {
            CircuitState::Closed => {
                self.consecutive_failures += 1;
                if self.consecutive_failures >= self.policy.failure_threshold {
                    self.trip(now);
                }
            }
            CircuitState::HalfOpen if admission == Admission::Probe => {
                self.consecutive_failures += 1;
                self.trip(now);
            }
            // Late result from a call admitted before the circuit opened
            CircuitState::HalfOpen | CircuitState::Open => {}
        }
    }

    /// The admitted call ended without telling us anything about the backend
    /// (e.g. it was cancelled). A probe slot is handed back.
    pub fn record_abandoned(&mut self, admission: Admission) {
        if admission == Admission::Probe && self.state == CircuitState::HalfOpen {
            self.probe_in_flight = false;
        }
    }

    pub fn reset(&mut self) {
        self.state = CircuitState::Closed;
        self.consecutive_failures = 0;
        self.opened_at = None;
        self.probe_in_flight = false;
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        CircuitSnapshot {
            state: self.state,
            consecutive_failures: self.consecutive_failures,
            total_failures: self.total_failures,
            total_short_circuits: self.total_short_circuits,
        }
    }

    fn trip(&mut self, now: Instant) {
        self.state = CircuitState::Open;
        self.opened_at = Some(now);
        self.probe_in_flight = false;
    }
}
