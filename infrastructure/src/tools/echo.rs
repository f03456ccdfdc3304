//! Echo tool: returns its input. Used by the dry-run and tests.

use async_trait::async_trait;
use orchestra_application::ToolBackend;
use orchestra_domain::tool::{OperationSpec, ToolDefinition, ToolError, ToolParameter};
use serde_json::{Map, Value, json};
use tokio_util::sync::CancellationToken;

pub const ECHO: &str = "echo";

pub struct EchoTool {
    definition: ToolDefinition,
}

impl Default for EchoTool {
    fn default() -> Self {
        Self::new()
    }
}

impl EchoTool {
    pub fn new() -> Self {
        let definition = ToolDefinition::new(ECHO, "Repeat text back, optionally transformed")
            .with_operation(
                OperationSpec::new("say", "Return the text unchanged")
                    .with_parameter(
                        ToolParameter::new("text", "Text to return", true).with_type("string"),
                    )
                    .with_parameter(
                        ToolParameter::new("uppercase", "Upper-case the text", false)
                            .with_type("boolean"),
                    ),
            )
            .with_operation(OperationSpec::new("now", "Current UTC time (RFC 3339)"));
        Self { definition }
    }
}

#[async_trait]
impl ToolBackend for EchoTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn invoke(
        &self,
        operation: &str,
        parameters: &Map<String, Value>,
        cancel: &CancellationToken,
    ) -> Result<Value, ToolError> {
        if cancel.is_cancelled() {
            return Err(ToolError::cancelled());
        }
        match operation {
            "say" => {
                let text = parameters
                    .get("text")
                    .and_then(Value::as_str)
                    .ok_or_else(|| ToolError::invalid_argument("'text' must be a string"))?;
                let upper = parameters
                    .get("uppercase")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                let text = if upper { text.to_uppercase() } else { text.to_string() };
                Ok(json!({ "text": text }))
            }
            // Volatile by nature; callers should map this tool to no_cache
            "now" => Ok(json!({ "now": chrono::Utc::now().to_rfc3339() })),
            other => Err(ToolError::unsupported_operation(ECHO, other)),
        }
    }
}
