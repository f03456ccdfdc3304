//! Audit records for recovery.

use super::error_kind::ErrorKind;
use super::strategy::RecoveryStrategy;
use crate::tool::value_objects::ToolError;
use serde::{Deserialize, Serialize};

/// What happened when a strategy was applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// The strategy produced a result; the chain stops
    Succeeded,
    /// The strategy ran and failed; the chain moves on
    Escalated,
    /// The strategy did not apply to this failure
    Skipped,
    /// The chain was stopped
    Aborted,
}

/// One entry of a recovery audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryAttempt {
    /// The error that triggered this step
    pub error: ToolError,
    pub strategy: RecoveryStrategy,
    pub outcome: AttemptOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub elapsed_ms: u64,
}

impl RecoveryAttempt {
    pub fn new(
        error: ToolError,
        strategy: RecoveryStrategy,
        outcome: AttemptOutcome,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            error,
            strategy,
            outcome,
            detail: None,
            elapsed_ms,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// A failure surfaced to the caller of a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskFailure {
    pub kind: ErrorKind,
    pub message: String,
    /// Recovery steps taken before giving up (empty if none were tried)
    #[serde(default)]
    pub trail: Vec<RecoveryAttempt>,
}

impl TaskFailure {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            trail: Vec::new(),
        }
    }

    pub fn with_trail(mut self, trail: Vec<RecoveryAttempt>) -> Self {
        self.trail = trail;
        self
    }
}

impl std::fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)?;
        if !self.trail.is_empty() {
            let steps: Vec<String> = self
                .trail
                .iter()
                .map(|a| format!("{}:{:?}", a.strategy, a.outcome))
                .collect();
            write!(f, " after [{}]", steps.join(", "))?;
        }
        Ok(())
    }
}
