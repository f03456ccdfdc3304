//! Tool domain entities

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Definition of a tool that agents can call.
///
/// A tool groups one or more operations behind a single backend
/// (e.g. a `search` tool with `query` and `suggest` operations).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool identifier (e.g., "search")
    pub tool_id: String,
    /// Human-readable description
    pub description: String,
    /// Operations the tool supports
    pub operations: Vec<OperationSpec>,
}

/// A single operation of a tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationSpec {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ToolParameter>,
}

/// Parameter specification for an operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolParameter {
    /// Parameter name
    pub name: String,
    /// Parameter description
    pub description: String,
    /// Whether this parameter is required
    pub required: bool,
    /// Parameter type hint (e.g., "string", "number", "array")
    pub param_type: String,
}

impl ToolDefinition {
    pub fn new(tool_id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            tool_id: tool_id.into(),
            description: description.into(),
            operations: Vec::new(),
        }
    }

    pub fn with_operation(mut self, operation: OperationSpec) -> Self {
        self.operations.push(operation);
        self
    }

    pub fn operation(&self, name: &str) -> Option<&OperationSpec> {
        self.operations.iter().find(|op| op.name == name)
    }

    pub fn supports(&self, operation: &str) -> bool {
        self.operation(operation).is_some()
    }

    /// One line per operation, for inclusion in a prompt
    pub fn describe(&self) -> String {
        let mut out = format!("- {}: {}\n", self.tool_id, self.description);
        for op in &self.operations {
            let params: Vec<String> = op
                .parameters
                .iter()
                .map(|p| {
                    if p.required {
                        format!("{}: {}", p.name, p.param_type)
                    } else {
                        format!("{}?: {}", p.name, p.param_type)
                    }
                })
                .collect();
            out.push_str(&format!(
                "    {}({}) - {}\n",
                op.name,
                params.join(", "),
                op.description
            ));
        }
        out
    }
}

impl OperationSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
        }
    }

    pub fn with_parameter(mut self, param: ToolParameter) -> Self {
        self.parameters.push(param);
        self
    }

    pub fn parameter(&self, name: &str) -> Option<&ToolParameter> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

impl ToolParameter {
    pub fn new(name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            required,
            param_type: "string".to_string(),
        }
    }

    pub fn with_type(mut self, param_type: impl Into<String>) -> Self {
        self.param_type = param_type.into();
        self
    }
}

/// Reference from one call in a batch to an earlier one.
///
/// The earlier call's result is bound into this call's parameters under
/// `bind_as` before the call runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallDependency {
    pub index: usize,
    #[serde(default = "default_bind_as")]
    pub bind_as: String,
}

fn default_bind_as() -> String {
    "input".to_string()
}

/// A request to invoke one operation of one tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Tool identifier
    #[serde(alias = "tool")]
    pub tool_id: String,
    /// Operation name within the tool
    pub operation: String,
    /// Parameters passed to the operation
    #[serde(default)]
    pub parameters: Map<String, Value>,
    /// Earlier call in the same batch whose result this call consumes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<CallDependency>,
}

impl ToolCall {
    pub fn new(tool_id: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            tool_id: tool_id.into(),
            operation: operation.into(),
            parameters: Map::new(),
            depends_on: None,
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn with_parameters(mut self, parameters: Map<String, Value>) -> Self {
        self.parameters = parameters;
        self
    }

    /// Consume the result of call `index` as the `input` parameter
    pub fn depends_on(self, index: usize) -> Self {
        self.depends_on_as(index, default_bind_as())
    }

    pub fn depends_on_as(mut self, index: usize, bind_as: impl Into<String>) -> Self {
        self.depends_on = Some(CallDependency {
            index,
            bind_as: bind_as.into(),
        });
        self
    }

    pub fn get_param(&self, key: &str) -> Option<&Value> {
        self.parameters.get(key)
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(|v| v.as_str())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.parameters.get(key).and_then(|v| v.as_bool())
    }

    /// `tool.operation`, used as a label in logs and observations
    pub fn label(&self) -> String {
        format!("{}.{}", self.tool_id, self.operation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn search_tool() -> ToolDefinition {
        ToolDefinition::new("search", "Full-text search").with_operation(
            OperationSpec::new("query", "Run a query")
                .with_parameter(ToolParameter::new("q", "Query text", true))
                .with_parameter(ToolParameter::new("limit", "Max hits", false).with_type("number")),
        )
    }

    #[test]
    fn test_tool_definition_lookup() {
        let tool = search_tool();
        assert!(tool.supports("query"));
        assert!(!tool.supports("delete"));
        assert_eq!(tool.operation("query").unwrap().parameters.len(), 2);
    }

    #[test]
    fn test_describe_marks_optional_params() {
        let text = search_tool().describe();
        assert!(text.contains("- search: Full-text search"));
        assert!(text.contains("query(q: string, limit?: number)"));
    }

    #[test]
    fn test_tool_call_builder() {
        let call = ToolCall::new("search", "query")
            .with_param("q", "rust")
            .with_param("limit", 5)
            .depends_on(0);

        assert_eq!(call.get_string("q"), Some("rust"));
        assert_eq!(call.get_param("limit"), Some(&json!(5)));
        assert_eq!(call.depends_on.as_ref().unwrap().bind_as, "input");
        assert_eq!(call.label(), "search.query");
    }

    #[test]
    fn test_tool_call_deserialize_with_alias_and_defaults() {
        let call: ToolCall = serde_json::from_value(json!({
            "tool": "fetch",
            "operation": "get",
            "depends_on": {"index": 1}
        }))
        .unwrap();

        assert_eq!(call.tool_id, "fetch");
        assert!(call.parameters.is_empty());
        assert_eq!(
            call.depends_on,
            Some(CallDependency {
                index: 1,
                bind_as: "input".to_string()
            })
        );
    }
}
