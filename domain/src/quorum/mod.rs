//! Consensus domain
//!
//! Voting, peer review and conflict resolution between agents.
//!
//! ```text
//! Proposal ──▶ voters ──▶ Ballot (cast / failed / timed out)
//!                              │
//!                              ▼
//!                 tally(algorithm, role weights)
//!                              │
//!                              ▼
//!              ConsensusResult (accepted / rejected / no decision)
//!                              │ disagreement
//!                              ▼
//!     resolve: mediation / arbitration / compromise / escalation
//! ```
//!
//! Quorum is the minimum number of voters that cast a vote or abstained.
//! A voter that errors or times out is reported as a failure, never as an
//! abstention.

pub mod conflict;
pub mod consensus;
pub mod parsing;
pub mod proposal;
pub mod review;
pub mod rule;
pub mod vote;

pub use conflict::{Candidate, ConflictStrategy, Resolution, compromise, heaviest, unanimous};
pub use consensus::{ConsensusOutcome, ConsensusResult, RoleWeights, VoterFailure, tally};
pub use parsing::{parse_choice_index, parse_review_response, parse_vote_response};
pub use proposal::{Proposal, ProposalId, ProposalStatus, Voter};
pub use review::ReviewVerdict;
pub use rule::{VotingAlgorithm, WeightSource};
pub use vote::{Ballot, Choice, Vote};
