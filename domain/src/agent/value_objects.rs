//! Agent domain value objects.
//!
//! # Identifiers
//! - [`AgentId`] - Identifier of a peer agent
//! - [`TaskId`] - Identifier of one submitted task
//!
//! # Peers
//! - [`Capability`] - A declared capability tag ("ocr", "search", ...)
//! - [`AgentRole`] - Role used to derive voting weight
//! - [`AgentProfile`] - Everything the collaboration engine knows about a peer
//!
//! # Execution
//! - [`TaskContext`] - Tenant, variables and delegation depth for one task

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifier of an agent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<T: Into<String>> From<T> for AgentId {
    fn from(s: T) -> Self {
        Self::new(s)
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(String);

static TASK_SEQ: AtomicU64 = AtomicU64::new(0);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Unique within the process: epoch millis plus a sequence number
    pub fn generate() -> Self {
        let seq = TASK_SEQ.fetch_add(1, Ordering::Relaxed);
        Self(format!(
            "task-{:x}-{:04x}",
            crate::core::clock::current_timestamp(),
            seq & 0xffff
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A capability tag, compared case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Capability(String);

impl Capability {
    pub fn new(tag: impl AsRef<str>) -> Self {
        Self(tag.as_ref().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Capability {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for Capability {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<Capability> for String {
    fn from(c: Capability) -> Self {
        c.0
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role of an agent within a collaboration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    Lead,
    Expert,
    #[default]
    Member,
    Observer,
}

impl AgentRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::Lead => "lead",
            AgentRole::Expert => "expert",
            AgentRole::Member => "member",
            AgentRole::Observer => "observer",
        }
    }
}

impl std::str::FromStr for AgentRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "lead" => Ok(AgentRole::Lead),
            "expert" => Ok(AgentRole::Expert),
            "member" => Ok(AgentRole::Member),
            "observer" => Ok(AgentRole::Observer),
            other => Err(format!(
                "Unknown role: {}. Valid: lead, expert, member, observer",
                other
            )),
        }
    }
}

/// A peer agent as seen by the collaboration engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentProfile {
    pub id: AgentId,
    #[serde(default)]
    pub capabilities: BTreeSet<Capability>,
    /// Reputation/expertise score used by weighted voting
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default)]
    pub role: AgentRole,
}

fn default_weight() -> f64 {
    1.0
}

impl AgentProfile {
    pub fn new(id: impl Into<AgentId>) -> Self {
        Self {
            id: id.into(),
            capabilities: BTreeSet::new(),
            weight: default_weight(),
            role: AgentRole::default(),
        }
    }

    pub fn with_capability(mut self, capability: impl Into<Capability>) -> Self {
        self.capabilities.insert(capability.into());
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_role(mut self, role: AgentRole) -> Self {
        self.role = role;
        self
    }

    /// Declares every one of `required`
    pub fn has_capabilities(&self, required: &[Capability]) -> bool {
        required.iter().all(|c| self.capabilities.contains(c))
    }
}

/// Per-task context passed through the loop to tools and peers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskContext {
    /// Tenant scope for cache keys
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
    /// Free-form facts rendered into the prompt
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
    /// How many delegation hops led to this task
    #[serde(default)]
    pub delegation_depth: u32,
}

impl TaskContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = Some(tenant.into());
        self
    }

    pub fn with_variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    /// Context for a task handed on to a peer
    pub fn delegated(&self) -> Self {
        Self {
            delegation_depth: self.delegation_depth + 1,
            ..self.clone()
        }
    }
}
