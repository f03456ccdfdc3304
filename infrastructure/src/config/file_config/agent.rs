//! Agent configuration from TOML (`[agent]` section)

use orchestra_application::LoopParams;
use orchestra_domain::GenerationParams;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Raw reasoning-loop configuration
///
/// # Example
///
/// ```toml
/// [agent]
/// max_iterations = 10
/// task_timeout_secs = 300      # 0 disables the wall-clock budget
/// model_retries = 2
/// system_prompt = "You are a careful research assistant."
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileAgentConfig {
    /// Hard ceiling on reasoning iterations
    pub max_iterations: usize,
    pub task_timeout_secs: u64,
    /// Extra attempts for transient model errors
    pub model_retries: u32,
    pub system_prompt: Option<String>,
    pub max_context_chars: usize,
    pub max_payload_chars: usize,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for FileAgentConfig {
    fn default() -> Self {
        let params = LoopParams::default();
        Self {
            max_iterations: params.max_iterations,
            task_timeout_secs: params.task_timeout.map(|d| d.as_secs()).unwrap_or(0),
            model_retries: params.model_retries,
            system_prompt: None,
            max_context_chars: params.max_context_chars,
            max_payload_chars: params.max_payload_chars,
            temperature: params.generation.temperature,
            max_tokens: params.generation.max_tokens,
        }
    }
}

impl FileAgentConfig {
    pub fn task_timeout(&self) -> Option<Duration> {
        (self.task_timeout_secs > 0).then(|| Duration::from_secs(self.task_timeout_secs))
    }

    pub fn to_loop_params(&self) -> LoopParams {
        LoopParams {
            max_iterations: self.max_iterations,
            task_timeout: self.task_timeout(),
            model_retries: self.model_retries,
            max_context_chars: self.max_context_chars,
            max_payload_chars: self.max_payload_chars,
            system_prompt: self.system_prompt.clone().filter(|p| !p.trim().is_empty()),
            generation: GenerationParams {
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                ..Default::default()
            },
        }
    }
}
