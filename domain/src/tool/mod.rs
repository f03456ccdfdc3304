//! Tool domain module
//!
//! This module defines how agents describe and invoke external capabilities
//! ("tools"), and the pure state that protects a tool back-end.
//!
//! # Overview
//!
//! ```text
//! ┌────────────────┐    ┌──────────────┐    ┌────────────────┐
//! │ ToolDefinition │───▶│ ToolCall     │───▶│ ToolCallResult │
//! │ (operations)   │    │ (invocation) │    │ (value/error)  │
//! └────────────────┘    └──────┬───────┘    └────────────────┘
//!                              │ depends_on
//!                              ▼
//!                      earlier call in the batch
//! ```
//!
//! # Key Types
//!
//! - [`ToolDefinition`]: tool id plus its [`OperationSpec`]s
//! - [`ToolCall`]: one operation invocation, optionally bound to an earlier result
//! - [`ToolError`]: failure tagged with an [`ErrorKind`](crate::recovery::ErrorKind)
//! - [`ToolValidator`]: pure parameter validation
//! - [`CircuitBreaker`]: closed/open/half-open protection state
//!
//! The async `ToolBackend` port lives in the application layer.

pub mod circuit;
pub mod entities;
pub mod traits;
pub mod value_objects;

pub use circuit::{Admission, CircuitBreaker, CircuitPolicy, CircuitSnapshot, CircuitState};
pub use entities::{CallDependency, OperationSpec, ToolCall, ToolDefinition, ToolParameter};
pub use traits::{DefaultToolValidator, ToolValidator};
pub use value_objects::{ResultSource, ToolCallResult, ToolError};
