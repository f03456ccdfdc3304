//! Execution progress port.
//!
//! [`ExecutionObserver`] is an **output port** for watching a run as it
//! happens: loop state changes, tool calls, cache hits, recovery attempts
//! and consensus results.
//!
//! All methods have default no-op implementations, so implementers only
//! need to override the callbacks they care about.

use orchestra_domain::recovery::RecoveryAttempt;
use orchestra_domain::tool::{ResultSource, ToolCall, ToolCallResult};
use orchestra_domain::{ConsensusResult, LoopState, TerminationReason};

pub trait ExecutionObserver: Send + Sync {
    /// Called when the reasoning loop changes state
    fn on_state_change(&self, _from: LoopState, _to: LoopState) {}

    /// Called at the start of each THINKING step
    fn on_iteration(&self, _iteration: usize, _max_iterations: usize) {}

    /// Called for each chunk while the model streams its reply
    fn on_model_chunk(&self, _chunk: &str) {}

    /// Called before a tool call is dispatched
    fn on_tool_call(&self, _call: &ToolCall) {}

    /// Called when a tool call finishes, successfully or not
    fn on_tool_result(&self, _result: &ToolCallResult) {}

    /// Called when a call is served from cache
    fn on_cache_hit(&self, _call: &ToolCall, _source: ResultSource) {}

    /// Called after each recovery strategy step
    fn on_recovery_attempt(&self, _call: &ToolCall, _attempt: &RecoveryAttempt) {}

    /// Called when a consensus run completes
    fn on_consensus(&self, _result: &ConsensusResult) {}

    /// Called once when a run ends
    fn on_terminated(&self, _reason: &TerminationReason) {}
}

/// No-op observer for when progress reporting is not needed
pub struct NoObserver;

impl ExecutionObserver for NoObserver {}
