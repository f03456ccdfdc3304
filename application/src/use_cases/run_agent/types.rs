//! Type definitions for the RunAgent use case.

use crate::governor::GovernorError;
use crate::ports::execution_observer::{ExecutionObserver, NoObserver};
use orchestra_domain::core::error::DomainError;
use orchestra_domain::{ReasoningState, TaskFailure, TerminationReason, ToolObservation};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Errors that stop a run before it can report an outcome.
///
/// Ordinary endings, including failures such as a timeout or an aborted
/// recovery chain, come back as a [`RunAgentOutput`] instead.
#[derive(Error, Debug)]
pub enum RunAgentError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Loop state error: {0}")]
    State(#[from] DomainError),

    #[error("No task slot: {0}")]
    NoSlot(#[from] GovernorError),
}

/// Per-run options
#[derive(Clone)]
pub struct RunOptions {
    /// Requested iteration budget, capped by the configured ceiling
    pub max_iterations: Option<usize>,
    pub cancel: CancellationToken,
    pub observer: Arc<dyn ExecutionObserver>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            max_iterations: None,
            cancel: CancellationToken::new(),
            observer: Arc::new(NoObserver),
        }
    }
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = Some(max);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ExecutionObserver>) -> Self {
        self.observer = observer;
        self
    }
}

/// How a run ended
#[derive(Debug, Clone, Serialize)]
pub struct RunAgentOutput {
    /// The final answer, present only when the run reached DONE
    pub output: Option<String>,
    /// One entry per tool call, in the order the calls completed
    pub observations: Vec<ToolObservation>,
    pub terminated_reason: TerminationReason,
    pub state: ReasoningState,
    /// THINKING steps taken
    pub iterations: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<TaskFailure>,
}

impl RunAgentOutput {
    pub fn is_success(&self) -> bool {
        self.terminated_reason.is_success()
    }
}
