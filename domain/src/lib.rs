//! Domain layer for agent-orchestra
//!
//! This crate contains the pure business rules of the orchestration engine:
//! entities, value objects and the algorithms that operate on them. It has no
//! async runtime and no I/O.
//!
//! # Core Concepts
//!
//! ## Reasoning loop
//!
//! An agent alternates between THINKING (asking the model), ACTING (running
//! tool calls) and OBSERVING (recording results) until it produces a final
//! answer or hits a limit. See [`agent::ReasoningState`].
//!
//! ## Tools and recovery
//!
//! Tool failures are classified by [`recovery::ErrorKind`] and handled by a
//! chain of [`recovery::RecoveryStrategy`]s (retry, simplify, fallback,
//! delegate, abort).
//!
//! ## Budgets and caching
//!
//! [`resource`] holds token buckets and rolling windows for resource budgets;
//! [`cache`] holds cache keys, entries and TTL strategies.
//!
//! ## Consensus
//!
//! [`quorum`] tallies votes under several voting algorithms and resolves
//! conflicting answers.

pub mod agent;
pub mod cache;
pub mod core;
pub mod observation;
pub mod prompt;
pub mod quorum;
pub mod recovery;
pub mod resource;
pub mod session;
pub mod tool;

// Re-export commonly used types
pub use agent::{
    AgentId, AgentProfile, AgentRole, Capability, LoopState, ModelAction, ReasoningState,
    TaskContext, TaskId, TerminationReason, parse_action,
};
pub use cache::{CacheEntry, CacheKey, CacheStats, TtlContext, TtlRegistry, TtlStrategy};
pub use core::{
    clock::{Clock, ManualClock, SystemClock},
    error::DomainError,
    validation::{ConfigIssue, ConfigIssueCode, Severity},
};
pub use observation::{ObservationLog, ToolObservation};
pub use prompt::{AgentPromptTemplate, PromptTemplate};
pub use quorum::{
    Ballot, Choice, ConflictStrategy, ConsensusOutcome, ConsensusResult, Proposal, ProposalId,
    Resolution, RoleWeights, Vote, VotingAlgorithm,
};
pub use recovery::{ErrorKind, RecoveryAttempt, RecoveryStrategy, RetryPolicy, TaskFailure};
pub use resource::{
    EnforcementMode, OverLimitPolicy, ResourceBudget, ResourceKind, ResourceSnapshot,
};
pub use session::{GenerationParams, Message, ModelOutput, Role, StreamEvent};
pub use tool::{
    CircuitBreaker, CircuitPolicy, CircuitState, DefaultToolValidator, ToolCall, ToolCallResult,
    ToolDefinition, ToolError, ToolValidator,
};
