//! Proposals put to a vote

use crate::agent::value_objects::{AgentId, AgentProfile, AgentRole};
use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProposalId(String);

static PROPOSAL_SEQ: AtomicU64 = AtomicU64::new(0);

impl ProposalId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        let seq = PROPOSAL_SEQ.fetch_add(1, Ordering::Relaxed);
        Self(format!(
            "proposal-{:x}-{:04x}",
            crate::core::clock::current_timestamp(),
            seq & 0xffff
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProposalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An eligible voter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Voter {
    pub id: AgentId,
    /// Reputation score; `None` counts as 1.0 in weighted voting
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default)]
    pub role: AgentRole,
}

impl Voter {
    pub fn new(id: impl Into<AgentId>) -> Self {
        Self {
            id: id.into(),
            weight: None,
            role: AgentRole::default(),
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn with_role(mut self, role: AgentRole) -> Self {
        self.role = role;
        self
    }
}

impl From<&AgentProfile> for Voter {
    fn from(profile: &AgentProfile) -> Self {
        Self {
            id: profile.id.clone(),
            weight: Some(profile.weight),
            role: profile.role,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProposalStatus {
    Open,
    Closed,
}

/// A question put to a set of voters.
///
/// Closed proposals are terminal; a proposal closes once it has been tallied
/// (quorum reached or deadline passed).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: ProposalId,
    pub question: String,
    pub voters: Vec<Voter>,
    /// Minimum number of participating (non-failed) voters
    pub quorum: usize,
    /// How long voters get to answer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    pub created_at: u64,
    pub status: ProposalStatus,
}

impl Proposal {
    /// A proposal whose quorum defaults to a strict majority of the voters
    pub fn new(question: impl Into<String>, voters: Vec<Voter>) -> Self {
        let quorum = voters.len() / 2 + 1;
        Self {
            id: ProposalId::generate(),
            question: question.into(),
            voters,
            quorum,
            timeout_ms: None,
            created_at: crate::core::clock::current_timestamp(),
            status: ProposalStatus::Open,
        }
    }

    pub fn with_id(mut self, id: ProposalId) -> Self {
        self.id = id;
        self
    }

    pub fn with_quorum(mut self, quorum: usize) -> Self {
        self.quorum = quorum;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn voter(&self, id: &AgentId) -> Option<&Voter> {
        self.voters.iter().find(|v| &v.id == id)
    }

    pub fn is_open(&self) -> bool {
        self.status == ProposalStatus::Open
    }

    pub fn close(&mut self) {
        self.status = ProposalStatus::Closed;
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.question.trim().is_empty() {
            return Err(DomainError::InvalidProposal("question is empty".to_string()));
        }
        if self.voters.is_empty() {
            return Err(DomainError::InvalidProposal("no eligible voters".to_string()));
        }
        let mut seen = HashSet::new();
        for voter in &self.voters {
            if !seen.insert(&voter.id) {
                return Err(DomainError::InvalidProposal(format!(
                    "voter '{}' listed twice",
                    voter.id
                )));
            }
        }
        if self.quorum == 0 || self.quorum > self.voters.len() {
            return Err(DomainError::InvalidProposal(format!(
                "quorum {} is not between 1 and {}",
                self.quorum,
                self.voters.len()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voters(n: usize) -> Vec<Voter> {
        (0..n).map(|i| Voter::new(format!("agent-{}", i))).collect()
    }

    #[test]
    fn test_default_quorum_is_majority() {
        assert_eq!(Proposal::new("q", voters(5)).quorum, 3);
        assert_eq!(Proposal::new("q", voters(4)).quorum, 3);
        assert_eq!(Proposal::new("q", voters(1)).quorum, 1);
    }

    #[test]
    fn test_validate() {
        assert!(Proposal::new("q", voters(3)).validate().is_ok());
        assert!(Proposal::new("", voters(3)).validate().is_err());
        assert!(Proposal::new("q", vec![]).validate().is_err());
        assert!(Proposal::new("q", voters(3)).with_quorum(4).validate().is_err());

        let mut dup = voters(2);
        dup.push(Voter::new("agent-0"));
        assert!(Proposal::new("q", dup).validate().is_err());
    }

    #[test]
    fn test_close_is_terminal_flag() {
        let mut p = Proposal::new("q", voters(2));
        assert!(p.is_open());
        p.close();
        assert!(!p.is_open());
    }

    #[test]
    fn test_voter_from_profile() {
        let profile = AgentProfile::new("lead-1").with_weight(2.5).with_role(AgentRole::Lead);
        let voter = Voter::from(&profile);
        assert_eq!(voter.weight, Some(2.5));
        assert_eq!(voter.role, AgentRole::Lead);
    }
}
