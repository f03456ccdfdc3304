//! Prompt templates for the reasoning loop

use crate::tool::entities::ToolDefinition;

/// Templates for the THINKING step
pub struct AgentPromptTemplate;

impl AgentPromptTemplate {
    /// System prompt listing the available tools and the action format
    pub fn agent_system(tools: &[ToolDefinition]) -> String {
        let tool_descriptions = if tools.is_empty() {
            "(no tools available; answer directly)".to_string()
        } else {
            tools
                .iter()
                .map(ToolDefinition::describe)
                .collect::<Vec<_>>()
                .join("\n")
        };

        format!(
            r#"You are an autonomous agent that solves tasks by reasoning and using tools.

## Available Tools

{tool_descriptions}
## How to Act

Each turn, reply with exactly one action block.

To call tools:

```action
{{
  "thought": "why these calls are needed",
  "tool_calls": [
    {{"tool": "tool_id", "operation": "operation_name", "parameters": {{"key": "value"}}}}
  ]
}}
```

Calls without `depends_on` run in parallel. To feed the result of an earlier call
into a later one, add `"depends_on": <index>` and optionally `"bind_as": "<parameter>"`.

When you know the answer:

```action
{{"thought": "...", "final_answer": "the answer"}}
```

## Guidelines

1. Prefer one batch of independent calls over several sequential turns
2. Read tool errors carefully; do not repeat a call that already failed the same way
3. Give a final answer as soon as the observations support it"#
        )
    }

    /// First user message of a run
    pub fn task(task: &str, variables: &[(String, String)]) -> String {
        if variables.is_empty() {
            return format!("## Task\n\n{}", task);
        }
        let vars = variables
            .iter()
            .map(|(k, v)| format!("- {}: {}", k, v))
            .collect::<Vec<_>>()
            .join("\n");
        format!("## Task\n\n{}\n\n## Context\n\n{}", task, vars)
    }

    /// Observations fed back after an ACTING step
    pub fn observations(context: &str, iteration: usize, max_iterations: usize) -> String {
        format!(
            r#"## Observations

{context}

Iteration {iteration} of {max_iterations}. Decide the next action."#
        )
    }

    /// Shown when the previous reply could not be parsed
    pub fn parse_error(error: &str) -> String {
        format!(
            "Your previous reply could not be understood: {}\nReply with a single ```action block.",
            error
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::entities::{OperationSpec, ToolParameter};

    #[test]
    fn test_agent_system_lists_tools() {
        let tool = ToolDefinition::new("search", "Web search").with_operation(
            OperationSpec::new("query", "Run a query")
                .with_parameter(ToolParameter::new("q", "query text", true)),
        );
        let prompt = AgentPromptTemplate::agent_system(&[tool]);
        assert!(prompt.contains("- search: Web search"));
        assert!(prompt.contains("query(q: string)"));
        assert!(prompt.contains("```action"));
    }

    #[test]
    fn test_agent_system_without_tools() {
        let prompt = AgentPromptTemplate::agent_system(&[]);
        assert!(prompt.contains("no tools available"));
    }

    #[test]
    fn test_task_with_variables() {
        let prompt = AgentPromptTemplate::task("sum it", &[("unit".into(), "kg".into())]);
        assert!(prompt.contains("sum it"));
        assert!(prompt.contains("- unit: kg"));
    }
}
