//! Error recovery domain
//!
//! Failures are classified into an [`ErrorKind`]; a caller-ordered chain of
//! [`RecoveryStrategy`] steps is then walked by the application layer's
//! recovery engine. Each step is planned by a pure function from
//! [`plan`] and leaves a [`RecoveryAttempt`] in the audit trail.

pub mod attempt;
pub mod error_kind;
pub mod plan;
pub mod strategy;

pub use attempt::{AttemptOutcome, RecoveryAttempt, TaskFailure};
pub use error_kind::ErrorKind;
pub use plan::{FailureContext, FallbackRoute, StrategyFn, StrategyPlan, StrategyRegistry};
pub use strategy::{RecoveryStrategy, RetryPolicy};
