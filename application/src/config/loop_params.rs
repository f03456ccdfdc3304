//! Reasoning loop parameters.
//!
//! [`LoopParams`] groups the static parameters that control the loop in
//! [`RunAgentUseCase`](crate::use_cases::run_agent::RunAgentUseCase).

use orchestra_domain::GenerationParams;
use std::time::Duration;

/// Loop control parameters.
#[derive(Debug, Clone)]
pub struct LoopParams {
    /// Hard ceiling on THINKING steps. A run may ask for fewer, never more.
    pub max_iterations: usize,
    /// Wall-clock budget for a whole run.
    pub task_timeout: Option<Duration>,
    /// Extra attempts for a model call that fails with a transient error.
    pub model_retries: u32,
    /// Character budget for observations folded into the prompt.
    pub max_context_chars: usize,
    /// Per-observation payload cap inside that budget.
    pub max_payload_chars: usize,
    /// Replaces the built-in system prompt when set.
    pub system_prompt: Option<String>,
    pub generation: GenerationParams,
}

impl Default for LoopParams {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            task_timeout: Some(Duration::from_secs(300)),
            model_retries: 2,
            max_context_chars: 12_000,
            max_payload_chars: 2_000,
            system_prompt: None,
            generation: GenerationParams::default(),
        }
    }
}

impl LoopParams {
    // ==================== Builder Methods ====================

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_task_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.task_timeout = timeout;
        self
    }

    pub fn with_model_retries(mut self, retries: u32) -> Self {
        self.model_retries = retries;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Iterations a run may use when it requests `requested`.
    pub fn effective_iterations(&self, requested: Option<usize>) -> usize {
        match requested {
            Some(n) => n.min(self.max_iterations),
            None => self.max_iterations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let params = LoopParams::default();
        assert_eq!(params.max_iterations, 10);
        assert_eq!(params.model_retries, 2);
        assert!(params.task_timeout.is_some());
        assert!(params.system_prompt.is_none());
    }

    #[test]
    fn test_effective_iterations_never_exceeds_ceiling() {
        let params = LoopParams::default().with_max_iterations(10);
        assert_eq!(params.effective_iterations(Some(150)), 10);
        assert_eq!(params.effective_iterations(Some(3)), 3);
        assert_eq!(params.effective_iterations(None), 10);
    }
}
