//! Tool domain traits
//!
//! Contains pure domain logic traits for tool validation.
//! The async `ToolBackend` port is defined in the application layer.

use super::entities::{ToolCall, ToolDefinition};
use super::value_objects::ToolError;

/// Validator for tool calls
///
/// This is a pure domain trait that validates tool calls
/// against their definitions without any I/O operations.
pub trait ToolValidator: Send + Sync {
    /// Validate a tool call against its definition
    fn validate(&self, call: &ToolCall, definition: &ToolDefinition) -> Result<(), ToolError>;
}

/// Default implementation of ToolValidator
///
/// Rejects unsupported operations, missing required parameters and
/// parameters the operation does not declare.
#[derive(Debug, Clone, Default)]
pub struct DefaultToolValidator;

impl ToolValidator for DefaultToolValidator {
    fn validate(&self, call: &ToolCall, definition: &ToolDefinition) -> Result<(), ToolError> {
        let Some(operation) = definition.operation(&call.operation) else {
            return Err(ToolError::unsupported_operation(
                &definition.tool_id,
                &call.operation,
            ));
        };

        for param in &operation.parameters {
            if param.required && !call.parameters.contains_key(&param.name) {
                return Err(ToolError::invalid_argument(format!(
                    "Missing required parameter '{}' for {}",
                    param.name,
                    call.label()
                )));
            }
        }

        // The dependency binding is injected by the executor, so it is always allowed
        let bound = call.depends_on.as_ref().map(|d| d.bind_as.as_str());

        for name in call.parameters.keys() {
            if Some(name.as_str()) != bound && operation.parameter(name).is_none() {
                return Err(ToolError::invalid_argument(format!(
                    "Unknown parameter '{}' for {}",
                    name,
                    call.label()
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recovery::ErrorKind;
    use crate::tool::entities::{OperationSpec, ToolParameter};

    fn definition() -> ToolDefinition {
        ToolDefinition::new("test", "test tool").with_operation(
            OperationSpec::new("run", "run it")
                .with_parameter(ToolParameter::new("param1", "First param", true))
                .with_parameter(ToolParameter::new("param2", "Second param", false)),
        )
    }

    #[test]
    fn test_validator_missing_required() {
        let call = ToolCall::new("test", "run");
        let err = DefaultToolValidator.validate(&call, &definition()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert!(err.message.contains("Missing required parameter"));
    }

    #[test]
    fn test_validator_unknown_param() {
        let call = ToolCall::new("test", "run")
            .with_param("param1", "v")
            .with_param("unknown_param", "value");
        let err = DefaultToolValidator.validate(&call, &definition()).unwrap_err();
        assert!(err.message.contains("Unknown parameter"));
    }

    #[test]
    fn test_validator_unsupported_operation() {
        let call = ToolCall::new("test", "explode");
        let err = DefaultToolValidator.validate(&call, &definition()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert_eq!(err.code, "UNSUPPORTED_OPERATION");
    }

    #[test]
    fn test_validator_allows_dependency_binding() {
        let call = ToolCall::new("test", "run")
            .with_param("param1", "v")
            .with_param("input", "from earlier call")
            .depends_on(0);
        assert!(DefaultToolValidator.validate(&call, &definition()).is_ok());
    }

    #[test]
    fn test_validator_valid_call() {
        let call = ToolCall::new("test", "run")
            .with_param("param1", "value1")
            .with_param("param2", "value2");
        assert!(DefaultToolValidator.validate(&call, &definition()).is_ok());
    }
}
