//! Model actions and their parser.
//!
//! The model answers each THINKING step with either a final answer or a set
//! of tool calls. Three text forms are accepted:
//!
//! 1. ` ```action ` or ` ```json ` fenced blocks containing JSON
//! 2. Raw JSON (the whole reply is a JSON object)
//! 3. Plain text; a `Final Answer:` marker is stripped if present
//!
//! JSON shapes:
//!
//! ```json
//! {"thought": "...", "final_answer": "..."}
//! {"thought": "...", "parallel": true,
//!  "tool_calls": [{"tool": "search", "operation": "query",
//!                  "parameters": {"q": "rust"}, "depends_on": 0, "bind_as": "input"}]}
//! ```
//!
//! `parallel` defaults to true when no call has a `depends_on`.

use crate::tool::entities::{CallDependency, ToolCall};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// What the model decided to do
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelAction {
    FinalAnswer {
        answer: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        thought: Option<String>,
    },
    ToolCalls {
        calls: Vec<ToolCall>,
        /// Calls are independent and may run concurrently
        parallel: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        thought: Option<String>,
    },
}

impl ModelAction {
    pub fn final_answer(answer: impl Into<String>) -> Self {
        ModelAction::FinalAnswer {
            answer: answer.into(),
            thought: None,
        }
    }

    pub fn tool_calls(calls: Vec<ToolCall>) -> Self {
        let parallel = calls.iter().all(|c| c.depends_on.is_none());
        ModelAction::ToolCalls {
            calls,
            parallel,
            thought: None,
        }
    }

    pub fn thought(&self) -> Option<&str> {
        match self {
            ModelAction::FinalAnswer { thought, .. } | ModelAction::ToolCalls { thought, .. } => {
                thought.as_deref()
            }
        }
    }
}

/// Parse a model reply.
///
/// `Err` means the reply looked like an action but could not be understood;
/// the message is meant to be shown back to the model.
pub fn parse_action(response: &str) -> Result<ModelAction, String> {
    if let Some(block) = fenced_block(response) {
        let value: Value = serde_json::from_str(&block)
            .map_err(|e| format!("action block is not valid JSON: {}", e))?;
        return action_from_json(&value);
    }

    let trimmed = response.trim();
    if trimmed.starts_with('{') {
        let value: Value =
            serde_json::from_str(trimmed).map_err(|e| format!("reply is not valid JSON: {}", e))?;
        return action_from_json(&value);
    }

    if let Some(idx) = trimmed.find("Final Answer:") {
        let answer = trimmed[idx + "Final Answer:".len()..].trim();
        let thought = trimmed[..idx].trim();
        return Ok(ModelAction::FinalAnswer {
            answer: answer.to_string(),
            thought: (!thought.is_empty()).then(|| thought.to_string()),
        });
    }

    Ok(ModelAction::final_answer(trimmed))
}

fn fenced_block(response: &str) -> Option<String> {
    let mut in_block = false;
    let mut current = String::new();

    for line in response.lines() {
        let t = line.trim();
        if !in_block && (t == "```action" || t == "```json") {
            in_block = true;
            current.clear();
        } else if in_block && t == "```" {
            return Some(current);
        } else if in_block {
            current.push_str(line);
            current.push('\n');
        }
    }
    None
}

/// Build an action from an already-parsed JSON object
pub fn action_from_json(value: &Value) -> Result<ModelAction, String> {
    let obj = value
        .as_object()
        .ok_or_else(|| "action must be a JSON object".to_string())?;
    let thought = obj
        .get("thought")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    if let Some(answer) = obj.get("final_answer") {
        let answer = match answer {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        return Ok(ModelAction::FinalAnswer { answer, thought });
    }

    let raw_calls: Vec<&Value> = match obj.get("tool_calls") {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(_) => return Err("tool_calls must be an array".to_string()),
        None if obj.contains_key("tool") || obj.contains_key("tool_id") => vec![value],
        None => return Err("expected `final_answer` or `tool_calls`".to_string()),
    };
    if raw_calls.is_empty() {
        return Err("tool_calls is empty".to_string());
    }

    let mut calls = Vec::with_capacity(raw_calls.len());
    for (index, raw) in raw_calls.into_iter().enumerate() {
        calls.push(parse_call(index, raw)?);
    }

    let parallel = obj
        .get("parallel")
        .and_then(Value::as_bool)
        .unwrap_or_else(|| calls.iter().all(|c| c.depends_on.is_none()));

    Ok(ModelAction::ToolCalls {
        calls,
        parallel,
        thought,
    })
}

fn parse_call(index: usize, raw: &Value) -> Result<ToolCall, String> {
    let obj = raw
        .as_object()
        .ok_or_else(|| format!("tool call #{} must be an object", index))?;

    let tool_id = obj
        .get("tool")
        .or_else(|| obj.get("tool_id"))
        .and_then(Value::as_str)
        .ok_or_else(|| format!("tool call #{} is missing `tool`", index))?;
    let operation = obj
        .get("operation")
        .and_then(Value::as_str)
        .ok_or_else(|| format!("tool call #{} is missing `operation`", index))?;
    let parameters = match obj.get("parameters") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map.clone(),
        Some(_) => return Err(format!("tool call #{}: parameters must be an object", index)),
    };

    let mut call = ToolCall::new(tool_id, operation).with_parameters(parameters);

    let dependency = match obj.get("depends_on") {
        None | Some(Value::Null) => None,
        Some(Value::Number(n)) => n.as_u64().map(|i| (i as usize, None)),
        Some(Value::Object(dep)) => dep
            .get("index")
            .and_then(Value::as_u64)
            .map(|i| (i as usize, dep.get("bind_as").and_then(Value::as_str))),
        Some(_) => None,
    };
    if obj.get("depends_on").is_some_and(|v| !v.is_null()) && dependency.is_none() {
        return Err(format!("tool call #{}: depends_on must be an index", index));
    }

    if let Some((dep_index, nested_bind)) = dependency {
        if dep_index >= index {
            return Err(format!(
                "tool call #{} depends on #{}, which is not an earlier call",
                index, dep_index
            ));
        }
        let bind_as = nested_bind
            .or_else(|| obj.get("bind_as").and_then(Value::as_str))
            .unwrap_or("input");
        call.depends_on = Some(CallDependency {
            index: dep_index,
            bind_as: bind_as.to_string(),
        });
    }

    Ok(call)
}
