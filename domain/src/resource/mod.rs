//! Resource budget domain
//!
//! Pure accounting for the resource governor: budget limits, token buckets
//! with burst, rolling per-minute and per-hour usage windows, and the
//! snapshot/violation records the governor reports. All time is passed in
//! explicitly so the arithmetic can be tested without sleeping.

pub mod budget;
pub mod bucket;
pub mod snapshot;
pub mod window;

pub use budget::{EnforcementMode, OverLimitPolicy, ResourceBudget, ResourceKind};
pub use bucket::TokenBucket;
pub use snapshot::{DenyReason, ResourceSnapshot, ResourceUsage, Violation};
pub use window::{RollingUsage, UsageTotals, UsageWindow};
