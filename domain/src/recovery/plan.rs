//! Pure planning functions for each recovery strategy.
//!
//! A planner looks at a failure and decides what the engine should try,
//! without doing any I/O. The engine in the application layer executes the
//! returned [`StrategyPlan`]. Planners are plain functions registered per
//! strategy in a [`StrategyRegistry`], so a deployment can swap one out
//! without touching the engine.

use super::strategy::{RecoveryStrategy, RetryPolicy};
use crate::tool::entities::{OperationSpec, ToolCall};
use crate::tool::value_objects::ToolError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A configured substitute for a tool (or one operation of it).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackRoute {
    pub tool_id: String,
    /// Only this operation; `None` matches every operation of `tool_id`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    pub fallback_tool: String,
    /// Operation on the fallback tool; `None` keeps the original name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_operation: Option<String>,
}

impl FallbackRoute {
    pub fn new(tool_id: impl Into<String>, fallback_tool: impl Into<String>) -> Self {
        Self {
            tool_id: tool_id.into(),
            operation: None,
            fallback_tool: fallback_tool.into(),
            fallback_operation: None,
        }
    }

    pub fn for_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    pub fn to_operation(mut self, operation: impl Into<String>) -> Self {
        self.fallback_operation = Some(operation.into());
        self
    }

    pub fn matches(&self, call: &ToolCall) -> bool {
        self.tool_id == call.tool_id
            && self.operation.as_deref().is_none_or(|op| op == call.operation)
    }

    /// The call rewritten onto the fallback tool
    pub fn apply(&self, call: &ToolCall) -> ToolCall {
        let operation = self
            .fallback_operation
            .clone()
            .unwrap_or_else(|| call.operation.clone());
        ToolCall::new(self.fallback_tool.clone(), operation)
            .with_parameters(call.parameters.clone())
    }
}

/// Everything a planner may look at.
#[derive(Debug, Clone)]
pub struct FailureContext<'a> {
    pub call: &'a ToolCall,
    pub error: &'a ToolError,
    /// Declared shape of the failed operation, when known
    pub operation: Option<&'a OperationSpec>,
    pub retry: &'a RetryPolicy,
    pub fallbacks: &'a [FallbackRoute],
    /// Collaboration is enabled and at least one peer is registered
    pub delegation_available: bool,
}

/// What the engine should do for one strategy step
#[derive(Debug, Clone, PartialEq)]
pub enum StrategyPlan {
    /// The strategy does not apply
    Skip(String),
    /// Re-issue the original call up to `max_attempts` times with backoff
    Retry { max_attempts: u32 },
    /// Run every reduced call; the merged results replace the original
    Split(Vec<ToolCall>),
    /// Try each alternative in order until one succeeds
    Alternatives(Vec<ToolCall>),
    /// Ask a peer with these capabilities to perform `task`
    Delegate { capabilities: Vec<String>, task: String },
    /// Stop the chain and fail the task
    Abort,
}

/// Planner signature: `(failure, context) -> plan`
pub type StrategyFn = fn(&FailureContext<'_>) -> StrategyPlan;

/// Lookup table from strategy to planner.
#[derive(Debug, Clone)]
pub struct StrategyRegistry {
    planners: HashMap<RecoveryStrategy, StrategyFn>,
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        let mut planners: HashMap<RecoveryStrategy, StrategyFn> = HashMap::new();
        planners.insert(RecoveryStrategy::Retry, plan_retry);
        planners.insert(RecoveryStrategy::Simplify, plan_simplify);
        planners.insert(RecoveryStrategy::Fallback, plan_fallback);
        planners.insert(RecoveryStrategy::Delegate, plan_delegate);
        planners.insert(RecoveryStrategy::Abort, plan_abort);
        Self { planners }
    }
}

impl StrategyRegistry {
    /// Replace the planner for one strategy
    pub fn with_planner(mut self, strategy: RecoveryStrategy, planner: StrategyFn) -> Self {
        self.planners.insert(strategy, planner);
        self
    }

    pub fn plan(&self, strategy: RecoveryStrategy, ctx: &FailureContext<'_>) -> StrategyPlan {
        if !strategy.is_eligible(ctx.error.kind) {
            return StrategyPlan::Skip(format!("not applicable to {} errors", ctx.error.kind));
        }
        match self.planners.get(&strategy) {
            Some(planner) => planner(ctx),
            None => StrategyPlan::Skip(format!("no planner registered for {}", strategy)),
        }
    }
}

pub fn plan_retry(ctx: &FailureContext<'_>) -> StrategyPlan {
    if ctx.retry.max_retries == 0 {
        return StrategyPlan::Skip("retries disabled".to_string());
    }
    StrategyPlan::Retry {
        max_attempts: ctx.retry.max_retries,
    }
}

/// Split an array parameter into one call per element, or failing that drop
/// the optional parameters.
pub fn plan_simplify(ctx: &FailureContext<'_>) -> StrategyPlan {
    if let Some(calls) = split_array_parameter(ctx.call) {
        return StrategyPlan::Split(calls);
    }
    if let Some(reduced) = drop_optional_parameters(ctx.call, ctx.operation) {
        return StrategyPlan::Split(vec![reduced]);
    }
    StrategyPlan::Skip("nothing to simplify".to_string())
}

pub fn plan_fallback(ctx: &FailureContext<'_>) -> StrategyPlan {
    let alternatives: Vec<ToolCall> = ctx
        .fallbacks
        .iter()
        .filter(|route| route.matches(ctx.call))
        .map(|route| route.apply(ctx.call))
        .collect();

    if alternatives.is_empty() {
        StrategyPlan::Skip(format!("no fallback configured for {}", ctx.call.label()))
    } else {
        StrategyPlan::Alternatives(alternatives)
    }
}

pub fn plan_delegate(ctx: &FailureContext<'_>) -> StrategyPlan {
    if !ctx.delegation_available {
        return StrategyPlan::Skip("collaboration disabled or no peers registered".to_string());
    }
    let params = Value::Object(ctx.call.parameters.clone());
    StrategyPlan::Delegate {
        capabilities: vec![ctx.call.tool_id.clone()],
        task: format!(
            "Perform `{}` with parameters {} and return the result. A previous attempt failed: {}",
            ctx.call.label(),
            params,
            ctx.error.message
        ),
    }
}

pub fn plan_abort(_ctx: &FailureContext<'_>) -> StrategyPlan {
    StrategyPlan::Abort
}

/// One call per element of the first array parameter holding more than one item.
///
/// Keys are visited in sorted order so the choice is stable.
pub fn split_array_parameter(call: &ToolCall) -> Option<Vec<ToolCall>> {
    let (key, items) = call
        .parameters
        .iter()
        .find_map(|(k, v)| v.as_array().filter(|a| a.len() > 1).map(|a| (k.clone(), a.clone())))?;

    Some(
        items
            .into_iter()
            .map(|item| {
                let mut part = call.clone();
                part.parameters.insert(key.clone(), Value::Array(vec![item]));
                part
            })
            .collect(),
    )
}

/// The call with every optional declared parameter removed, if that changes anything.
pub fn drop_optional_parameters(
    call: &ToolCall,
    operation: Option<&OperationSpec>,
) -> Option<ToolCall> {
    let operation = operation?;
    let mut reduced = call.clone();
    reduced.parameters.retain(|name, _| {
        operation
            .parameter(name)
            .is_none_or(|p| p.required)
    });
    (reduced.parameters.len() < call.parameters.len()).then_some(reduced)
}
