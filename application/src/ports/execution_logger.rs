//! Port for structured execution logging.
//!
//! Defines the [`ExecutionLogger`] trait for recording execution events
//! (tool observations, recovery attempts, consensus results, loop
//! termination) to a structured log.
//!
//! This is separate from `tracing`-based operation logs: tracing handles
//! human-readable diagnostic messages, while this port captures a
//! machine-readable transcript (JSONL).

use chrono::{DateTime, Utc};
use serde_json::Value;

/// A structured execution event.
#[derive(Debug, Clone)]
pub struct ExecutionEvent {
    /// Event type identifier (e.g., "tool_observation", "recovery_attempt").
    pub event_type: &'static str,
    /// JSON payload with event-specific data.
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
}

impl ExecutionEvent {
    pub fn new(event_type: &'static str, payload: Value) -> Self {
        Self {
            event_type,
            payload,
            timestamp: Utc::now(),
        }
    }
}

/// Port for logging execution events.
///
/// `log` is synchronous and non-fallible; logging failures are ignored by
/// implementations.
pub trait ExecutionLogger: Send + Sync {
    fn log(&self, event: ExecutionEvent);
}

/// No-op implementation for tests and when logging is disabled.
pub struct NoExecutionLogger;

impl ExecutionLogger for NoExecutionLogger {
    fn log(&self, _event: ExecutionEvent) {}
}
