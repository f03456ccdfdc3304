//! Tallying ballots into a consensus result

use super::proposal::{Proposal, ProposalId, Voter};
use super::rule::{VotingAlgorithm, WeightSource};
use super::vote::{Ballot, Choice, Vote};
use crate::agent::value_objects::{AgentId, AgentRole};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Outcome of a consensus run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusOutcome {
    Accepted,
    Rejected,
    /// Quorum was not reached, or nobody cast a yes/no vote
    NoDecision,
}

impl ConsensusOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ConsensusOutcome::Accepted)
    }
}

impl std::fmt::Display for ConsensusOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConsensusOutcome::Accepted => write!(f, "Accepted"),
            ConsensusOutcome::Rejected => write!(f, "Rejected"),
            ConsensusOutcome::NoDecision => write!(f, "No decision"),
        }
    }
}

/// Role → weight table for delegated-weight voting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleWeights {
    pub lead: f64,
    pub expert: f64,
    pub member: f64,
    pub observer: f64,
}

impl Default for RoleWeights {
    fn default() -> Self {
        Self {
            lead: 3.0,
            expert: 2.0,
            member: 1.0,
            observer: 0.0,
        }
    }
}

impl RoleWeights {
    pub fn weight_for(&self, role: AgentRole) -> f64 {
        match role {
            AgentRole::Lead => self.lead,
            AgentRole::Expert => self.expert,
            AgentRole::Member => self.member,
            AgentRole::Observer => self.observer,
        }
    }
}

/// A voter that did not produce a usable vote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoterFailure {
    pub voter: AgentId,
    pub reason: String,
    #[serde(default)]
    pub timed_out: bool,
}

/// Aggregated result of one proposal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusResult {
    pub proposal_id: ProposalId,
    pub algorithm: VotingAlgorithm,
    pub outcome: ConsensusOutcome,
    /// Share of cast weight on the winning side (0.0 when nothing was cast)
    pub agreement: f64,
    pub yes_weight: f64,
    pub no_weight: f64,
    pub yes_votes: usize,
    pub no_votes: usize,
    pub abstentions: usize,
    /// Voters that cast or abstained
    pub participants: usize,
    pub quorum: usize,
    pub quorum_reached: bool,
    /// Errors and timeouts, kept apart from abstentions
    pub failures: Vec<VoterFailure>,
    pub votes: Vec<Vote>,
    pub decided_at: u64,
}

impl ConsensusResult {
    pub fn is_accepted(&self) -> bool {
        self.outcome.is_accepted()
    }

    /// One-line summary for logs
    pub fn summary(&self) -> String {
        format!(
            "{} ({}): yes {} / no {} / abstain {} / failed {}, agreement {:.0}%",
            self.outcome,
            self.algorithm,
            self.yes_votes,
            self.no_votes,
            self.abstentions,
            self.failures.len(),
            self.agreement * 100.0
        )
    }
}

fn weight_of(voter: &Voter, vote: &Vote, algorithm: &VotingAlgorithm, roles: &RoleWeights) -> f64 {
    let w = match algorithm.weight_source() {
        WeightSource::Uniform => 1.0,
        WeightSource::Explicit => vote.weight.or(voter.weight).unwrap_or(1.0),
        WeightSource::Role => roles.weight_for(voter.role),
    };
    w.max(0.0)
}

/// Tally the ballots for `proposal`.
///
/// Ballots from non-voters, for another proposal, or repeating a voter are
/// recorded as failures and otherwise ignored. Quorum counts cast votes and
/// abstentions; failures count toward neither.
pub fn tally(
    proposal: &Proposal,
    ballots: Vec<Ballot>,
    algorithm: &VotingAlgorithm,
    roles: &RoleWeights,
    now: u64,
) -> ConsensusResult {
    let mut seen: HashSet<AgentId> = HashSet::new();
    let mut failures = Vec::new();
    let mut votes = Vec::new();
    let (mut yes_weight, mut no_weight) = (0.0, 0.0);
    let (mut yes_votes, mut no_votes, mut abstentions) = (0, 0, 0);

    for ballot in ballots {
        let voter_id = ballot.voter().clone();
        let Some(voter) = proposal.voter(&voter_id) else {
            failures.push(VoterFailure {
                voter: voter_id,
                reason: "not an eligible voter".to_string(),
                timed_out: false,
            });
            continue;
        };
        if !seen.insert(voter_id.clone()) {
            failures.push(VoterFailure {
                voter: voter_id,
                reason: "duplicate ballot".to_string(),
                timed_out: false,
            });
            continue;
        }

        match ballot {
            Ballot::Cast { vote } => {
                if vote.proposal_id != proposal.id {
                    failures.push(VoterFailure {
                        voter: voter_id,
                        reason: format!("vote is for proposal {}", vote.proposal_id),
                        timed_out: false,
                    });
                    continue;
                }
                let weight = weight_of(voter, &vote, algorithm, roles);
                match vote.choice {
                    Choice::Yes => {
                        yes_votes += 1;
                        yes_weight += weight;
                    }
                    Choice::No => {
                        no_votes += 1;
                        no_weight += weight;
                    }
                    Choice::Abstain => abstentions += 1,
                }
                votes.push(vote);
            }
            Ballot::Failed { error, .. } => failures.push(VoterFailure {
                voter: voter_id,
                reason: error,
                timed_out: false,
            }),
            Ballot::TimedOut { .. } => failures.push(VoterFailure {
                voter: voter_id,
                reason: "no response before the deadline".to_string(),
                timed_out: true,
            }),
        }
    }

    let participants = yes_votes + no_votes + abstentions;
    let quorum_reached = participants >= proposal.quorum;
    let cast_weight = yes_weight + no_weight;

    let outcome = if !quorum_reached || cast_weight <= 0.0 {
        ConsensusOutcome::NoDecision
    } else if algorithm.is_satisfied(yes_weight, cast_weight) {
        ConsensusOutcome::Accepted
    } else {
        ConsensusOutcome::Rejected
    };

    let agreement = if cast_weight > 0.0 {
        yes_weight.max(no_weight) / cast_weight
    } else {
        0.0
    };

    ConsensusResult {
        proposal_id: proposal.id.clone(),
        algorithm: *algorithm,
        outcome,
        agreement,
        yes_weight,
        no_weight,
        yes_votes,
        no_votes,
        abstentions,
        participants,
        quorum: proposal.quorum,
        quorum_reached,
        failures,
        votes,
        decided_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proposal(n: usize) -> Proposal {
        let voters = (0..n).map(|i| Voter::new(format!("v{}", i))).collect();
        Proposal::new("ship it?", voters).with_id(ProposalId::new("p"))
    }

    fn ballots(p: &Proposal, choices: &[Choice]) -> Vec<Ballot> {
        choices
            .iter()
            .enumerate()
            .map(|(i, c)| Ballot::cast(Vote::new(p.id.clone(), format!("v{}", i), *c)))
            .collect()
    }

    fn decide(p: &Proposal, b: Vec<Ballot>, algo: &VotingAlgorithm) -> ConsensusResult {
        tally(p, b, algo, &RoleWeights::default(), 0)
    }

    use Choice::{Abstain, No, Yes};
    use VotingAlgorithm::SimpleMajority;

    #[test]
    fn test_simple_majority_three_of_five_accepts() {
        let p = proposal(5);
        let r = decide(&p, ballots(&p, &[Yes, Yes, Yes, No, No]), &SimpleMajority);
        assert_eq!(r.outcome, ConsensusOutcome::Accepted);
        assert!((r.agreement - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_simple_majority_two_of_five_does_not_accept() {
        let p = proposal(5);
        let r = decide(&p, ballots(&p, &[Yes, Yes, No, No, No]), &SimpleMajority);
        assert!(!r.is_accepted());
        assert_eq!(r.outcome, ConsensusOutcome::Rejected);
    }

    #[test]
    fn test_supermajority_sixty_percent_does_not_accept() {
        let p = proposal(5);
        let algo = VotingAlgorithm::Supermajority { threshold: 0.67 };
        let r = decide(&p, ballots(&p, &[Yes, Yes, Yes, No, No]), &algo);
        assert_eq!(r.outcome, ConsensusOutcome::Rejected);
    }

    #[test]
    fn test_abstentions_count_for_quorum_only() {
        let p = proposal(5);
        let r = decide(&p, ballots(&p, &[Yes, Abstain, Abstain]), &SimpleMajority);
        assert!(r.quorum_reached);
        assert_eq!(r.abstentions, 2);
        assert_eq!(r.outcome, ConsensusOutcome::Accepted);
    }

    #[test]
    fn test_failures_are_not_abstentions() {
        let p = proposal(5);
        let mut b = ballots(&p, &[Yes, Yes]);
        b.push(Ballot::Failed {
            voter: AgentId::new("v2"),
            error: "connection refused".to_string(),
        });
        b.push(Ballot::TimedOut {
            voter: AgentId::new("v3"),
        });

        let r = decide(&p, b, &SimpleMajority);
        assert_eq!(r.failures.len(), 2);
        assert_eq!(r.abstentions, 0);
        assert!(r.failures[1].timed_out);
        // Only 2 participants against a quorum of 3
        assert!(!r.quorum_reached);
        assert_eq!(r.outcome, ConsensusOutcome::NoDecision);
    }

    #[test]
    fn test_all_abstain_is_no_decision() {
        let p = proposal(3);
        let r = decide(&p, ballots(&p, &[Abstain, Abstain, Abstain]), &SimpleMajority);
        assert_eq!(r.outcome, ConsensusOutcome::NoDecision);
        assert_eq!(r.agreement, 0.0);
    }

    #[test]
    fn test_weighted_uses_scores_and_overrides() {
        let voters = vec![
            Voter::new("senior").with_weight(5.0),
            Voter::new("junior-1"),
            Voter::new("junior-2"),
        ];
        let p = Proposal::new("q", voters).with_id(ProposalId::new("p"));
        let b = vec![
            Ballot::cast(Vote::yes(p.id.clone(), "senior")),
            Ballot::cast(Vote::no(p.id.clone(), "junior-1")),
            Ballot::cast(Vote::no(p.id.clone(), "junior-2").with_weight(3.0)),
        ];
        // yes 5 of 9 = 0.555..
        let r = decide(&p, b.clone(), &VotingAlgorithm::Weighted { threshold: 0.5 });
        assert_eq!(r.outcome, ConsensusOutcome::Accepted);
        assert_eq!(r.yes_weight, 5.0);
        assert_eq!(r.no_weight, 4.0);

        let r = decide(&p, b, &VotingAlgorithm::Weighted { threshold: 0.6 });
        assert_eq!(r.outcome, ConsensusOutcome::Rejected);
    }

    #[test]
    fn test_delegated_weight_from_roles() {
        let voters = vec![
            Voter::new("lead").with_role(AgentRole::Lead),
            Voter::new("m1"),
            Voter::new("m2"),
            Voter::new("obs").with_role(AgentRole::Observer),
        ];
        let p = Proposal::new("q", voters).with_id(ProposalId::new("p"));
        let b = vec![
            Ballot::cast(Vote::yes(p.id.clone(), "lead")),
            Ballot::cast(Vote::no(p.id.clone(), "m1")),
            Ballot::cast(Vote::no(p.id.clone(), "m2")),
            Ballot::cast(Vote::no(p.id.clone(), "obs")),
        ];
        let r = decide(&p, b, &VotingAlgorithm::DelegatedWeight { threshold: 0.6 });
        // 3 / (3 + 1 + 1 + 0)
        assert_eq!(r.outcome, ConsensusOutcome::Accepted);
        assert_eq!(r.no_votes, 3);
    }

    #[test]
    fn test_ineligible_and_duplicate_ballots() {
        let p = proposal(3);
        let mut b = ballots(&p, &[Yes, Yes, No]);
        b.push(Ballot::cast(Vote::no(p.id.clone(), "v0")));
        b.push(Ballot::cast(Vote::no(p.id.clone(), "stranger")));
        b.push(Ballot::cast(Vote::no(ProposalId::new("other"), "v9")));

        let r = decide(&p, b, &SimpleMajority);
        assert_eq!(r.yes_votes, 2);
        assert_eq!(r.no_votes, 1);
        assert_eq!(r.failures.len(), 3);
        assert!(r.is_accepted());
    }
}
