//! Resource governor
//!
//! Tracks and enforces concurrency, token-rate, call-rate and memory budgets.
//! See [`ResourceGovernor`].

mod resource_governor;

pub use resource_governor::{GovernorError, ResourceGovernor, ResourceLease};
