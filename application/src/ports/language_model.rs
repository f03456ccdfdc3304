//! Language model port
//!
//! Defines the interface for asking a language model for the next step.

use async_trait::async_trait;
use orchestra_domain::{GenerationParams, Message, ModelOutput, StreamEvent};
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors that can occur while talking to a model
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Model not available: {0}")]
    ModelNotAvailable(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Timeout")]
    Timeout,

    #[error("Transport closed")]
    TransportClosed,

    #[error("Other error: {0}")]
    Other(String),
}

impl GatewayError {
    /// Worth trying again after a pause
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GatewayError::ConnectionError(_)
                | GatewayError::RateLimited(_)
                | GatewayError::Timeout
                | GatewayError::TransportClosed
        )
    }
}

/// Handle for receiving streaming events from a model.
///
/// Wraps an `mpsc::Receiver<StreamEvent>` and provides convenience methods
/// for consuming the stream.
pub struct StreamHandle {
    pub receiver: mpsc::Receiver<StreamEvent>,
}

impl StreamHandle {
    pub fn new(receiver: mpsc::Receiver<StreamEvent>) -> Self {
        Self { receiver }
    }

    /// Consume the stream, passing each chunk to `on_chunk`, and return the
    /// final output.
    ///
    /// If the channel closes without a `Completed` event, the concatenated
    /// chunks are returned as text.
    pub async fn collect_output(
        mut self,
        mut on_chunk: impl FnMut(&str),
    ) -> Result<ModelOutput, GatewayError> {
        let mut full_text = String::new();
        while let Some(event) = self.receiver.recv().await {
            match event {
                StreamEvent::Delta(chunk) => {
                    on_chunk(&chunk);
                    full_text.push_str(&chunk);
                }
                StreamEvent::Completed(output) => return Ok(output),
                StreamEvent::Error(e) => return Err(GatewayError::RequestFailed(e)),
            }
        }
        Ok(ModelOutput::Text(full_text))
    }
}

/// A language model client
///
/// Implementations (adapters) live in the infrastructure layer.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Provider identifier, for logs and transcripts
    fn provider(&self) -> &str;

    /// Generate the next output for a conversation
    async fn generate(
        &self,
        messages: &[Message],
        params: &GenerationParams,
    ) -> Result<ModelOutput, GatewayError>;

    /// Streaming variant.
    ///
    /// Default implementation calls `generate()` and wraps the result in a
    /// single `Completed` event.
    async fn generate_streaming(
        &self,
        messages: &[Message],
        params: &GenerationParams,
    ) -> Result<StreamHandle, GatewayError> {
        let result = self.generate(messages, params).await?;
        let (tx, rx) = mpsc::channel(1);
        let _ = tx.send(StreamEvent::Completed(result)).await;
        Ok(StreamHandle::new(rx))
    }
}
