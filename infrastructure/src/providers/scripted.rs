//! Replay model
//!
//! [`ScriptedModel`] answers from a fixed list of replies instead of calling
//! a real provider. It backs the CLI dry-run and end-to-end tests.
//!
//! A script is a JSON array. Each element is either a raw reply string (parsed
//! by the reasoning loop like any model text) or a structured
//! [`ModelOutput`]:
//!
//! ```json
//! [
//!   "```action\n{\"tool\": \"echo\", \"operation\": \"say\", \"parameters\": {}}\n```",
//!   {"kind": "action", "value": {"type": "final_answer", "answer": "done"}}
//! ]
//! ```

use async_trait::async_trait;
use orchestra_application::{GatewayError, LanguageModel, StreamHandle};
use orchestra_domain::{GenerationParams, Message, ModelOutput, StreamEvent};
use serde::Deserialize;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ScriptError {
    #[error("could not read script {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("script is not a JSON list of replies: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScriptStep {
    Text(String),
    Output(ModelOutput),
}

impl From<ScriptStep> for ModelOutput {
    fn from(step: ScriptStep) -> Self {
        match step {
            ScriptStep::Text(text) => ModelOutput::Text(text),
            ScriptStep::Output(output) => output,
        }
    }
}

/// Plays back replies in order; fails with `ModelNotAvailable` once the
/// script runs out.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<ModelOutput>>,
    calls: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedModel {
    pub fn new(replies: impl IntoIterator<Item = ModelOutput>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ScriptError> {
        let steps: Vec<ScriptStep> = serde_json::from_str(json)?;
        Ok(Self::new(steps.into_iter().map(ModelOutput::from)))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ScriptError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ScriptError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn remaining(&self) -> usize {
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Conversations the model was asked to continue, in order
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn next_reply(&self, messages: &[Message]) -> Result<ModelOutput, GatewayError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(messages.to_vec());
        let reply = self
            .replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        reply.ok_or_else(|| GatewayError::ModelNotAvailable("script exhausted".to_string()))
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn provider(&self) -> &str {
        "scripted"
    }

    async fn generate(
        &self,
        messages: &[Message],
        _params: &GenerationParams,
    ) -> Result<ModelOutput, GatewayError> {
        self.next_reply(messages)
    }

    /// Text replies are streamed line by line before completing.
    async fn generate_streaming(
        &self,
        messages: &[Message],
        _params: &GenerationParams,
    ) -> Result<StreamHandle, GatewayError> {
        let output = self.next_reply(messages)?;
        let chunks: Vec<String> = match &output {
            ModelOutput::Text(text) => text.split_inclusive('\n').map(str::to_string).collect(),
            ModelOutput::Action(_) => Vec::new(),
        };
        debug!(chunks = chunks.len(), "Replaying scripted reply");

        let (tx, rx) = mpsc::channel(chunks.len() + 1);
        for chunk in chunks {
            let _ = tx.send(StreamEvent::Delta(chunk)).await;
        }
        let _ = tx.send(StreamEvent::Completed(output)).await;
        Ok(StreamHandle::new(rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestra_domain::ModelAction;

    const SCRIPT: &str = r#"[
        "thinking...\nFinal Answer: 42",
        {"kind": "action", "value": {"type": "final_answer", "answer": "done"}}
    ]"#;

    #[tokio::test]
    async fn test_replays_in_order_then_runs_out() {
        let model = ScriptedModel::from_json(SCRIPT).unwrap();
        let params = GenerationParams::default();
        assert_eq!(model.remaining(), 2);

        let first = model.generate(&[], &params).await.unwrap();
        assert_eq!(
            first,
            ModelOutput::Text("thinking...\nFinal Answer: 42".to_string())
        );
        let second = model.generate(&[], &params).await.unwrap();
        assert_eq!(second, ModelOutput::Action(ModelAction::final_answer("done")));

        let err = model.generate(&[], &params).await.unwrap_err();
        assert!(matches!(err, GatewayError::ModelNotAvailable(_)));
        assert!(!err.is_transient());
        assert_eq!(model.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_streaming_emits_line_deltas() {
        let model = ScriptedModel::from_json(SCRIPT).unwrap();
        let handle = model
            .generate_streaming(&[Message::user("q")], &GenerationParams::default())
            .await
            .unwrap();

        let mut chunks = Vec::new();
        let output = handle
            .collect_output(|c| chunks.push(c.to_string()))
            .await
            .unwrap();
        assert_eq!(chunks, vec!["thinking...\n", "Final Answer: 42"]);
        assert_eq!(output.text(), "thinking...\nFinal Answer: 42");
    }

    #[test]
    fn test_from_file_reports_missing_path() {
        let err = ScriptedModel::from_file("/nonexistent/script.json").err().unwrap();
        assert!(matches!(err, ScriptError::Read { .. }));
    }

    #[test]
    fn test_rejects_non_list() {
        assert!(matches!(
            ScriptedModel::from_json(r#"{"reply": "x"}"#),
            Err(ScriptError::Parse(_))
        ));
    }
}
