//! Reasoning loop state machine.
//!
//! ```text
//! THINKING ──▶ ACTING ──▶ OBSERVING ──▶ THINKING
//!    │            │            │
//!    ├──▶ DONE    └──▶ FAILED  ├──▶ DONE
//!    └──▶ FAILED               └──▶ FAILED
//! ```
//!
//! `DONE` and `FAILED` are terminal. `THINKING` may also go straight back to
//! `THINKING` when the model's reply could not be parsed into an action.

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopState {
    Thinking,
    Acting,
    Observing,
    Done,
    Failed,
}

impl LoopState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoopState::Thinking => "thinking",
            LoopState::Acting => "acting",
            LoopState::Observing => "observing",
            LoopState::Done => "done",
            LoopState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, LoopState::Done | LoopState::Failed)
    }

    pub fn can_transition_to(&self, next: LoopState) -> bool {
        use LoopState::*;
        matches!(
            (self, next),
            (Thinking, Acting)
                | (Thinking, Thinking)
                | (Thinking, Done)
                | (Thinking, Failed)
                | (Acting, Observing)
                | (Acting, Failed)
                | (Observing, Thinking)
                | (Observing, Done)
                | (Observing, Failed)
        )
    }
}

impl std::fmt::Display for LoopState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a run ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum TerminationReason {
    /// The model produced a final answer
    FinalAnswer,
    /// The iteration ceiling was reached
    IterationLimit { limit: usize },
    /// The wall-clock budget ran out
    Timeout { elapsed_ms: u64 },
    /// A recovery chain hit `Abort`
    RecoveryAborted,
    /// The model could not be reached after retries
    ModelFailure,
    /// The caller or the engine cancelled the task
    Cancelled,
}

impl TerminationReason {
    pub fn is_success(&self) -> bool {
        matches!(self, TerminationReason::FinalAnswer)
    }
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TerminationReason::FinalAnswer => write!(f, "final answer"),
            TerminationReason::IterationLimit { limit } => {
                write!(f, "iteration limit reached ({})", limit)
            }
            TerminationReason::Timeout { elapsed_ms } => {
                write!(f, "timed out after {}ms", elapsed_ms)
            }
            TerminationReason::RecoveryAborted => write!(f, "recovery aborted"),
            TerminationReason::ModelFailure => write!(f, "model failure"),
            TerminationReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Current state plus the path taken to get there
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningState {
    state: LoopState,
    iteration: usize,
    history: Vec<LoopState>,
}

impl Default for ReasoningState {
    fn default() -> Self {
        Self::new()
    }
}

impl ReasoningState {
    pub fn new() -> Self {
        Self {
            state: LoopState::Thinking,
            iteration: 0,
            history: vec![LoopState::Thinking],
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Number of THINKING steps started so far
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn history(&self) -> &[LoopState] {
        &self.history
    }

    /// Count one more model turn
    pub fn begin_iteration(&mut self) -> usize {
        self.iteration += 1;
        self.iteration
    }

    pub fn transition(&mut self, next: LoopState) -> Result<(), DomainError> {
        if !self.state.can_transition_to(next) {
            return Err(DomainError::InvalidTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        self.state = next;
        self.history.push(next);
        Ok(())
    }

    /// Move to FAILED from any non-terminal state
    pub fn fail(&mut self) {
        if !self.state.is_terminal() {
            self.state = LoopState::Failed;
            self.history.push(LoopState::Failed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut s = ReasoningState::new();
        assert_eq!(s.begin_iteration(), 1);
        s.transition(LoopState::Acting).unwrap();
        s.transition(LoopState::Observing).unwrap();
        s.transition(LoopState::Thinking).unwrap();
        s.begin_iteration();
        s.transition(LoopState::Done).unwrap();

        assert_eq!(s.state(), LoopState::Done);
        assert_eq!(s.iteration(), 2);
        assert_eq!(s.history().len(), 5);
    }

    #[test]
    fn test_terminal_states_reject_transitions() {
        let mut s = ReasoningState::new();
        s.transition(LoopState::Done).unwrap();
        let err = s.transition(LoopState::Acting).unwrap_err();
        assert_eq!(
            err,
            DomainError::InvalidTransition {
                from: "done".to_string(),
                to: "acting".to_string()
            }
        );
    }

    #[test]
    fn test_acting_cannot_finish_directly() {
        assert!(!LoopState::Acting.can_transition_to(LoopState::Done));
        assert!(LoopState::Acting.can_transition_to(LoopState::Failed));
    }

    #[test]
    fn test_fail_is_idempotent() {
        let mut s = ReasoningState::new();
        s.fail();
        s.fail();
        assert_eq!(s.state(), LoopState::Failed);
        assert_eq!(s.history(), &[LoopState::Thinking, LoopState::Failed]);
    }

    #[test]
    fn test_termination_reason_serde() {
        let json = serde_json::to_value(TerminationReason::IterationLimit { limit: 10 }).unwrap();
        assert_eq!(json["reason"], "iteration_limit");
        assert_eq!(json["limit"], 10);
        assert!(TerminationReason::FinalAnswer.is_success());
        assert!(!TerminationReason::Cancelled.is_success());
    }
}
