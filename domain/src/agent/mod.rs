//! Agent domain
//!
//! - [`value_objects`]: identities, capabilities, roles and task context
//! - [`entities`]: the THINKING/ACTING/OBSERVING state machine
//! - [`action`]: parsing a model reply into a final answer or tool calls

pub mod action;
pub mod entities;
pub mod value_objects;

pub use action::{ModelAction, action_from_json, parse_action};
pub use entities::{LoopState, ReasoningState, TerminationReason};
pub use value_objects::{AgentId, AgentProfile, AgentRole, Capability, TaskContext, TaskId};
