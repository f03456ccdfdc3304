//! Tool domain value objects: immutable result and error types
//!
//! Every [`ToolError`] carries an [`ErrorKind`] so the recovery engine can
//! choose a strategy without re-parsing messages. The `code` is a stable
//! machine-readable tag for logs and observations.

use crate::recovery::ErrorKind;
use crate::tool::entities::ToolCall;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Error that occurred while executing a tool call.
///
/// | Code | Kind |
/// |------|------|
/// | `INVALID_ARGUMENT`, `UNSUPPORTED_OPERATION` | `Validation` |
/// | `UNKNOWN_TOOL` | `CapabilityGap` |
/// | `TIMEOUT`, `EXECUTION_FAILED`, `RATE_LIMITED` | `Transient` |
/// | `CIRCUIT_OPEN`, `BUDGET_EXHAUSTED` | `ResourceExhausted` |
/// | `DEPENDENCY_FAILED` | `Validation` |
/// | `CANCELLED` | `Cancelled` |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolError {
    pub kind: ErrorKind,
    /// Error code (e.g., "TIMEOUT", "CIRCUIT_OPEN")
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ToolError {
    pub fn new(kind: ErrorKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Wrap an untyped backend message, classifying it by content
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let kind = ErrorKind::classify(&message);
        Self::new(kind, "EXECUTION_FAILED", message)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, "INVALID_ARGUMENT", message)
    }

    pub fn unknown_tool(tool_id: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::CapabilityGap,
            "UNKNOWN_TOOL",
            format!("Unknown tool: {}", tool_id.into()),
        )
    }

    pub fn unsupported_operation(tool_id: &str, operation: &str) -> Self {
        Self::new(
            ErrorKind::Validation,
            "UNSUPPORTED_OPERATION",
            format!("Tool '{}' does not support operation '{}'", tool_id, operation),
        )
    }

    pub fn execution_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transient, "EXECUTION_FAILED", message)
    }

    pub fn terminal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Terminal, "FATAL", message)
    }

    pub fn timeout(operation: impl Into<String>, after: Duration) -> Self {
        Self::new(
            ErrorKind::Transient,
            "TIMEOUT",
            format!(
                "Operation timed out after {}ms: {}",
                after.as_millis(),
                operation.into()
            ),
        )
    }

    pub fn rate_limited(tool_id: &str) -> Self {
        Self::new(
            ErrorKind::Transient,
            "RATE_LIMITED",
            format!("Rate limit exceeded for tool '{}'", tool_id),
        )
    }

    pub fn circuit_open(tool_id: &str, retry_after: Duration) -> Self {
        Self::new(
            ErrorKind::ResourceExhausted,
            "CIRCUIT_OPEN",
            format!("Circuit open for tool '{}'", tool_id),
        )
        .with_details(format!("retry after {}ms", retry_after.as_millis()))
    }

    pub fn budget_exhausted(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ResourceExhausted, "BUDGET_EXHAUSTED", message)
    }

    pub fn dependency_failed(index: usize, reason: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::Validation,
            "DEPENDENCY_FAILED",
            format!("Dependency #{} did not produce a result: {}", index, reason.into()),
        )
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "CANCELLED", "Call cancelled")
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == ErrorKind::Cancelled
    }

    /// Whether this failure should count against a tool's circuit breaker.
    ///
    /// Caller mistakes and our own throttling say nothing about backend health.
    pub fn counts_against_backend(&self) -> bool {
        !matches!(
            self.code.as_str(),
            "INVALID_ARGUMENT"
                | "UNKNOWN_TOOL"
                | "UNSUPPORTED_OPERATION"
                | "RATE_LIMITED"
                | "CIRCUIT_OPEN"
                | "BUDGET_EXHAUSTED"
                | "DEPENDENCY_FAILED"
                | "CANCELLED"
        )
    }
}

impl std::fmt::Display for ToolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(details) = &self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

impl std::error::Error for ToolError {}

/// Where a call's value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSource {
    Backend,
    FastCache,
    SlowCache,
    /// Produced by a peer agent after the tool itself failed
    Delegated,
}

impl ResultSource {
    pub fn is_cached(&self) -> bool {
        matches!(self, ResultSource::FastCache | ResultSource::SlowCache)
    }
}

/// Outcome of one executed call.
#[derive(Debug, Clone)]
pub struct ToolCallResult {
    /// The call as actually executed (after dependency binding)
    pub call: ToolCall,
    pub outcome: Result<Value, ToolError>,
    pub duration: Duration,
    pub source: ResultSource,
    /// Epoch millis at completion
    pub completed_at: u64,
}

impl ToolCallResult {
    pub fn success(
        call: ToolCall,
        value: Value,
        duration: Duration,
        source: ResultSource,
        completed_at: u64,
    ) -> Self {
        Self {
            call,
            outcome: Ok(value),
            duration,
            source,
            completed_at,
        }
    }

    pub fn failure(
        call: ToolCall,
        error: ToolError,
        duration: Duration,
        completed_at: u64,
    ) -> Self {
        Self {
            call,
            outcome: Err(error),
            duration,
            source: ResultSource::Backend,
            completed_at,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn value(&self) -> Option<&Value> {
        self.outcome.as_ref().ok()
    }

    pub fn error(&self) -> Option<&ToolError> {
        self.outcome.as_ref().err()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_constructors_set_kind() {
        assert_eq!(ToolError::invalid_argument("x").kind, ErrorKind::Validation);
        assert_eq!(ToolError::unknown_tool("x").kind, ErrorKind::CapabilityGap);
        assert_eq!(
            ToolError::timeout("search.query", Duration::from_millis(50)).kind,
            ErrorKind::Transient
        );
        assert_eq!(
            ToolError::circuit_open("search", Duration::from_secs(1)).kind,
            ErrorKind::ResourceExhausted
        );
        assert!(ToolError::cancelled().is_cancelled());
    }

    #[test]
    fn test_from_message_classifies() {
        let err = ToolError::from_message("monthly quota exhausted");
        assert_eq!(err.kind, ErrorKind::ResourceExhausted);
        assert_eq!(err.code, "EXECUTION_FAILED");
    }

    #[test]
    fn test_counts_against_backend() {
        assert!(ToolError::execution_failed("boom").counts_against_backend());
        assert!(ToolError::timeout("x", Duration::from_secs(1)).counts_against_backend());
        assert!(!ToolError::invalid_argument("bad").counts_against_backend());
        assert!(!ToolError::circuit_open("x", Duration::ZERO).counts_against_backend());
    }

    #[test]
    fn test_display_includes_details() {
        let err = ToolError::circuit_open("search", Duration::from_millis(1500));
        assert_eq!(
            err.to_string(),
            "[CIRCUIT_OPEN] Circuit open for tool 'search' (retry after 1500ms)"
        );
    }

    #[test]
    fn test_call_result_accessors() {
        let call = ToolCall::new("t", "op");
        let ok = ToolCallResult::success(
            call.clone(),
            json!({"n": 1}),
            Duration::from_millis(3),
            ResultSource::FastCache,
            10,
        );
        assert!(ok.is_success());
        assert!(ok.source.is_cached());
        assert_eq!(ok.value(), Some(&json!({"n": 1})));

        let err = ToolCallResult::failure(call, ToolError::cancelled(), Duration::ZERO, 11);
        assert!(!err.is_success());
        assert!(err.error().unwrap().is_cancelled());
    }
}
