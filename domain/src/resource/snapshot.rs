use super::budget::{EnforcementMode, ResourceKind};
use super::window::UsageTotals;
use serde::{Deserialize, Serialize};

/// Why a request was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// Bucket or slots temporarily empty
    Unavailable,
    /// Hourly cap reached
    HourlyQuota,
    /// Larger than the resource's total capacity; waiting cannot help
    ExceedsCapacity,
    /// Wait timed out
    Timeout,
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DenyReason::Unavailable => "unavailable",
            DenyReason::HourlyQuota => "hourly quota reached",
            DenyReason::ExceedsCapacity => "exceeds capacity",
            DenyReason::Timeout => "timed out waiting",
        };
        write!(f, "{}", s)
    }
}

/// A request that went over budget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub kind: ResourceKind,
    pub requested: u64,
    pub available: u64,
    pub reason: DenyReason,
    pub mode: EnforcementMode,
    /// Epoch millis
    pub at: u64,
}

/// Current state of one resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceUsage {
    pub kind: ResourceKind,
    pub limit: u64,
    /// Held amount for slots/memory, remaining tokens for rate resources
    pub current: u64,
    pub totals: UsageTotals,
}

/// Point-in-time view of the governor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    pub mode: EnforcementMode,
    pub resources: Vec<ResourceUsage>,
    pub violations_total: u64,
    pub recent_violations: Vec<Violation>,
}

impl ResourceSnapshot {
    pub fn usage(&self, kind: ResourceKind) -> Option<&ResourceUsage> {
        self.resources.iter().find(|r| r.kind == kind)
    }
}
