//! Peer agent port
//!
//! A peer exposes the same `run(task, context)` contract as the local
//! reasoning loop. Review and voting are built on top of `run` by default,
//! so any peer that can run a task can also review and vote.

use async_trait::async_trait;
use orchestra_domain::quorum::{Proposal, ReviewVerdict, Vote, parse_vote_response};
use orchestra_domain::{AgentProfile, PromptTemplate, TaskContext};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Errors from a peer agent
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PeerError {
    #[error("Peer unreachable: {0}")]
    Unreachable(String),

    #[error("Peer task failed: {0}")]
    TaskFailed(String),

    #[error("Operation cancelled")]
    Cancelled,
}

/// Handle to another agent
#[async_trait]
pub trait PeerAgent: Send + Sync {
    /// Identity, capabilities, weight and role
    fn profile(&self) -> &AgentProfile;

    /// Run a task to completion and return the final answer
    async fn run(
        &self,
        task: &str,
        context: &TaskContext,
        cancel: &CancellationToken,
    ) -> Result<String, PeerError>;

    /// Critique a completed result
    async fn review(
        &self,
        task: &str,
        work: &str,
        context: &TaskContext,
        cancel: &CancellationToken,
    ) -> Result<ReviewVerdict, PeerError> {
        let prompt = format!(
            "{}\n\n{}",
            PromptTemplate::review_system(),
            PromptTemplate::review_prompt(task, work)
        );
        let response = self.run(&prompt, context, cancel).await?;
        Ok(ReviewVerdict::from_response(
            self.profile().id.clone(),
            &response,
        ))
    }

    /// Vote on a proposal
    async fn vote(
        &self,
        proposal: &Proposal,
        context: &TaskContext,
        cancel: &CancellationToken,
    ) -> Result<Vote, PeerError> {
        let prompt = format!(
            "{}\n\n{}",
            PromptTemplate::vote_system(),
            PromptTemplate::vote_prompt(&proposal.question)
        );
        let response = self.run(&prompt, context, cancel).await?;
        let (choice, rationale) = parse_vote_response(&response);
        let mut vote = Vote::new(proposal.id.clone(), self.profile().id.clone(), choice);
        if let Some(rationale) = rationale {
            vote = vote.with_rationale(rationale);
        }
        Ok(vote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestra_domain::quorum::{Choice, Voter};

    struct CannedPeer {
        profile: AgentProfile,
        reply: String,
    }

    #[async_trait]
    impl PeerAgent for CannedPeer {
        fn profile(&self) -> &AgentProfile {
            &self.profile
        }

        async fn run(
            &self,
            _task: &str,
            _context: &TaskContext,
            _cancel: &CancellationToken,
        ) -> Result<String, PeerError> {
            Ok(self.reply.clone())
        }
    }

    #[tokio::test]
    async fn test_default_vote_parses_reply() {
        let peer = CannedPeer {
            profile: AgentProfile::new("a"),
            reply: r#"{"vote": "no", "rationale": "too risky"}"#.to_string(),
        };
        let proposal = Proposal::new("deploy?", vec![Voter::new("a")]);
        let vote = peer
            .vote(&proposal, &TaskContext::new(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(vote.choice, Choice::No);
        assert_eq!(vote.voter.as_str(), "a");
        assert_eq!(vote.rationale.as_deref(), Some("too risky"));
        assert_eq!(vote.proposal_id, proposal.id);
    }

    #[tokio::test]
    async fn test_default_review_parses_reply() {
        let peer = CannedPeer {
            profile: AgentProfile::new("critic"),
            reply: "Looks right.\nAPPROVE".to_string(),
        };
        let verdict = peer
            .review("sum", "4", &TaskContext::new(), &CancellationToken::new())
            .await
            .unwrap();
        assert!(verdict.approved);
        assert_eq!(verdict.reviewer.as_str(), "critic");
    }
}
