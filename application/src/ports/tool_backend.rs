//! Tool backend port
//!
//! Each tool back-end exposes `invoke(operation, parameters)`; the engine
//! is agnostic to what the tool does.

use async_trait::async_trait;
use orchestra_domain::tool::{ToolDefinition, ToolError};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

/// An invocable tool
///
/// Implementations should return promptly once `cancel` fires. The engine
/// stops waiting on cancellation but cannot stop third-party work itself.
#[async_trait]
pub trait ToolBackend: Send + Sync {
    /// Tool id plus the operations it supports
    fn definition(&self) -> &ToolDefinition;

    fn tool_id(&self) -> &str {
        &self.definition().tool_id
    }

    async fn invoke(
        &self,
        operation: &str,
        parameters: &Map<String, Value>,
        cancel: &CancellationToken,
    ) -> Result<Value, ToolError>;
}
