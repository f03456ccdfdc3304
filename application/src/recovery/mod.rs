//! Error recovery for failed tool calls.

pub mod engine;

pub use engine::{Recovered, RecoveryEngine, RecoveryFailure};
