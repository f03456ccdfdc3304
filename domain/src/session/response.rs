//! Language-model output types.
//!
//! A model client returns either free text (which the loop parses into an
//! action) or an already-structured [`ModelAction`] when the provider
//! supports native tool calling.

use crate::agent::action::{ModelAction, parse_action};
use serde::{Deserialize, Serialize};

/// One generation result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ModelOutput {
    Text(String),
    Action(ModelAction),
}

impl ModelOutput {
    /// Interpret the output as an action.
    ///
    /// `Err` carries a message to show the model when its text could not be
    /// understood.
    pub fn into_action(self) -> Result<ModelAction, String> {
        match self {
            ModelOutput::Text(text) => parse_action(&text),
            ModelOutput::Action(action) => Ok(action),
        }
    }

    /// Text form, for transcripts and for peers that need plain text
    pub fn text(&self) -> String {
        match self {
            ModelOutput::Text(t) => t.clone(),
            ModelOutput::Action(ModelAction::FinalAnswer { answer, .. }) => answer.clone(),
            ModelOutput::Action(action) => serde_json::to_string(action).unwrap_or_default(),
        }
    }
}

/// Sampling parameters passed through to the model client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_tokens: u32,
    pub stop: Vec<String>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            max_tokens: 1024,
            stop: Vec::new(),
        }
    }
}
