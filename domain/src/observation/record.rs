use crate::core::string::truncate;
use crate::recovery::{ErrorKind, RecoveryStrategy};
use crate::tool::value_objects::ToolCallResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Record of one tool invocation.
///
/// Fields are private and only set at construction; there is no way to
/// change an observation once it has been recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolObservation {
    tool_id: String,
    operation: String,
    parameters: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_kind: Option<ErrorKind>,
    duration_ms: u64,
    created_at: u64,
    #[serde(default)]
    cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    recovered_by: Option<RecoveryStrategy>,
}

impl ToolObservation {
    pub fn from_result(result: &ToolCallResult) -> Self {
        let (value, error, error_kind) = match &result.outcome {
            Ok(v) => (Some(v.clone()), None, None),
            Err(e) => (None, Some(e.to_string()), Some(e.kind)),
        };
        Self {
            tool_id: result.call.tool_id.clone(),
            operation: result.call.operation.clone(),
            parameters: Value::Object(result.call.parameters.clone()),
            success: value.is_some(),
            result: value,
            error,
            error_kind,
            duration_ms: result.duration.as_millis() as u64,
            created_at: result.completed_at,
            cached: result.source.is_cached(),
            recovered_by: None,
        }
    }

    /// Same record, marking the strategy that produced the final outcome
    pub fn recovered_by(mut self, strategy: RecoveryStrategy) -> Self {
        self.recovered_by = Some(strategy);
        self
    }

    pub fn tool_id(&self) -> &str {
        &self.tool_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn parameters(&self) -> &Value {
        &self.parameters
    }

    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error_kind
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    pub fn is_cached(&self) -> bool {
        self.cached
    }

    pub fn recovery(&self) -> Option<RecoveryStrategy> {
        self.recovered_by
    }

    /// Compact text for the model's context window
    pub fn to_context_entry(&self, max_payload: usize) -> String {
        let head = format!("{}.{} {}", self.tool_id, self.operation, self.parameters);
        match (&self.result, &self.error) {
            (Some(value), _) => {
                let payload = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                format!("[ok] {} -> {}", head, truncate(&payload, max_payload))
            }
            (None, Some(error)) => format!("[error] {} -> {}", head, error),
            (None, None) => format!("[error] {} -> no result", head),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::entities::ToolCall;
    use crate::tool::value_objects::{ResultSource, ToolError};
    use serde_json::json;
    use std::time::Duration;

    fn call() -> ToolCall {
        ToolCall::new("search", "query").with_param("q", "rust")
    }

    #[test]
    fn test_success_observation() {
        let result = ToolCallResult::success(
            call(),
            json!({"hits": 3}),
            Duration::from_millis(42),
            ResultSource::Backend,
            1_700,
        );
        let obs = ToolObservation::from_result(&result);

        assert!(obs.is_success());
        assert_eq!(obs.result(), Some(&json!({"hits": 3})));
        assert_eq!(obs.error(), None);
        assert_eq!(obs.duration_ms(), 42);
        assert_eq!(obs.created_at(), 1_700);
        assert_eq!(obs.parameters(), &json!({"q": "rust"}));
        assert!(!obs.is_cached());
    }

    #[test]
    fn test_failure_observation_has_no_result() {
        let result = ToolCallResult::failure(
            call(),
            ToolError::timeout("search.query", Duration::from_millis(10)),
            Duration::from_millis(10),
            5,
        );
        let obs = ToolObservation::from_result(&result);

        assert!(!obs.is_success());
        assert!(obs.result().is_none());
        assert!(obs.error().unwrap().contains("TIMEOUT"));
        assert_eq!(obs.error_kind(), Some(ErrorKind::Transient));
    }

    #[test]
    fn test_context_entry_truncates_payload() {
        let result = ToolCallResult::success(
            call(),
            json!("x".repeat(100)),
            Duration::ZERO,
            ResultSource::FastCache,
            0,
        );
        let entry = ToolObservation::from_result(&result).to_context_entry(10);
        assert!(entry.starts_with("[ok] search.query"));
        assert!(entry.ends_with("xxxxxxx..."));
    }

    #[test]
    fn test_serialization_skips_absent_fields() {
        let result =
            ToolCallResult::success(call(), json!(1), Duration::ZERO, ResultSource::Backend, 0);
        let obs = ToolObservation::from_result(&result).recovered_by(RecoveryStrategy::Retry);
        let json = serde_json::to_value(&obs).unwrap();

        assert!(json.get("error").is_none());
        assert_eq!(json["recovered_by"], "retry");
        let back: ToolObservation = serde_json::from_value(json).unwrap();
        assert_eq!(back, obs);
    }
}
