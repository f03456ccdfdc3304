//! Votes and ballots

use super::proposal::ProposalId;
use crate::agent::value_objects::AgentId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Choice {
    Yes,
    No,
    Abstain,
}

impl std::fmt::Display for Choice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Choice::Yes => "yes",
            Choice::No => "no",
            Choice::Abstain => "abstain",
        };
        write!(f, "{}", s)
    }
}

/// A single vote on a proposal
///
/// # Example
///
/// ```
/// use orchestra_domain::quorum::{Choice, ProposalId, Vote};
///
/// let id = ProposalId::new("p-1");
/// let vote = Vote::yes(id.clone(), "analyst").with_weight(2.0);
/// assert_eq!(vote.choice, Choice::Yes);
/// assert_eq!(vote.weight, Some(2.0));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub proposal_id: ProposalId,
    pub voter: AgentId,
    pub choice: Choice,
    /// Overrides the voter's configured weight
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

impl Vote {
    pub fn new(proposal_id: ProposalId, voter: impl Into<AgentId>, choice: Choice) -> Self {
        Self {
            proposal_id,
            voter: voter.into(),
            choice,
            weight: None,
            rationale: None,
        }
    }

    pub fn yes(proposal_id: ProposalId, voter: impl Into<AgentId>) -> Self {
        Self::new(proposal_id, voter, Choice::Yes)
    }

    pub fn no(proposal_id: ProposalId, voter: impl Into<AgentId>) -> Self {
        Self::new(proposal_id, voter, Choice::No)
    }

    pub fn abstain(proposal_id: ProposalId, voter: impl Into<AgentId>) -> Self {
        Self::new(proposal_id, voter, Choice::Abstain)
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight.max(0.0));
        self
    }

    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = Some(rationale.into());
        self
    }
}

/// What came back from one voter.
///
/// A voter that errors or never answers is not an abstention: the tally
/// reports those separately and does not count them toward quorum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Ballot {
    Cast { vote: Vote },
    Failed { voter: AgentId, error: String },
    TimedOut { voter: AgentId },
}

impl Ballot {
    pub fn cast(vote: Vote) -> Self {
        Ballot::Cast { vote }
    }

    pub fn voter(&self) -> &AgentId {
        match self {
            Ballot::Cast { vote } => &vote.voter,
            Ballot::Failed { voter, .. } | Ballot::TimedOut { voter } => voter,
        }
    }
}
