//! Collaboration & Consensus Engine.
//!
//! Works on behalf of a reasoning loop (or its caller) against the
//! [`PeerRegistry`]:
//!
//! | Operation | Peers contacted |
//! |-----------|-----------------|
//! | [`delegate`] | the named peer |
//! | [`delegate_to_capable`] | capable peers, heaviest first, until one succeeds |
//! | [`request_review`] | the named or auto-selected reviewer |
//! | [`run_consensus`] | every voter, concurrently |
//! | [`resolve_conflict`] | mediator or arbiter, if the strategy needs one |
//!
//! [`delegate`]: CollaborationEngine::delegate
//! [`delegate_to_capable`]: CollaborationEngine::delegate_to_capable
//! [`request_review`]: CollaborationEngine::request_review
//! [`run_consensus`]: CollaborationEngine::run_consensus
//! [`resolve_conflict`]: CollaborationEngine::resolve_conflict
//!
//! Every peer call is bounded by a deadline and the caller's cancellation
//! token. A missing peer is an error, never a silent no-op.

use super::registry::PeerRegistry;
use crate::config::CollaborationConfig;
use crate::ports::execution_logger::{ExecutionEvent, ExecutionLogger, NoExecutionLogger};
use crate::ports::execution_observer::{ExecutionObserver, NoObserver};
use crate::ports::peer_agent::{PeerAgent, PeerError};
use orchestra_domain::core::clock::{Clock, SystemClock};
use orchestra_domain::quorum::{
    Ballot, Candidate, ConflictStrategy, ConsensusResult, Proposal, Resolution, ReviewVerdict,
    Voter, VotingAlgorithm, compromise, heaviest, parse_choice_index, tally, unanimous,
};
use orchestra_domain::{AgentId, Capability, PromptTemplate, TaskContext};
use serde_json::{Value, json};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Errors from collaboration operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CollaborationError {
    #[error("Collaboration is disabled")]
    Disabled,

    #[error("No peers registered")]
    NoPeers,

    #[error("Peer not found: {0}")]
    PeerNotFound(AgentId),

    #[error("No peer declares capabilities [{0}]")]
    NoCapablePeer(String),

    #[error("Delegation depth {depth} exceeds the limit of {limit}")]
    DepthExceeded { depth: u32, limit: u32 },

    #[error("Peer {agent} did not answer within {after_ms}ms")]
    Timeout { agent: AgentId, after_ms: u64 },

    #[error("Peer {agent} failed: {source}")]
    Peer {
        agent: AgentId,
        #[source]
        source: PeerError,
    },

    #[error("Invalid proposal: {0}")]
    InvalidProposal(String),

    #[error("No candidates to resolve")]
    NoCandidates,

    #[error("Operation cancelled")]
    Cancelled,
}

impl CollaborationError {
    /// Errors after which trying another peer is pointless
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            CollaborationError::Cancelled
                | CollaborationError::Disabled
                | CollaborationError::DepthExceeded { .. }
        )
    }
}

pub struct CollaborationEngine {
    config: CollaborationConfig,
    peers: PeerRegistry,
    clock: Arc<dyn Clock>,
    observer: Arc<dyn ExecutionObserver>,
    logger: Arc<dyn ExecutionLogger>,
}

impl CollaborationEngine {
    pub fn new(config: CollaborationConfig, peers: PeerRegistry) -> Self {
        Self {
            config,
            peers,
            clock: Arc::new(SystemClock),
            observer: Arc::new(NoObserver),
            logger: Arc::new(NoExecutionLogger),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ExecutionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_logger(mut self, logger: Arc<dyn ExecutionLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn config(&self) -> &CollaborationConfig {
        &self.config
    }

    pub fn peers(&self) -> &PeerRegistry {
        &self.peers
    }

    /// Enabled and at least one peer registered
    pub fn is_available(&self) -> bool {
        self.config.enabled && !self.peers.is_empty()
    }

    fn ensure_enabled(&self) -> Result<(), CollaborationError> {
        if !self.config.enabled {
            return Err(CollaborationError::Disabled);
        }
        if self.peers.is_empty() {
            return Err(CollaborationError::NoPeers);
        }
        Ok(())
    }

    /// Peers declaring every required capability, heaviest first
    pub fn find_capable_agents(&self, required: &[Capability]) -> Vec<Arc<dyn PeerAgent>> {
        self.peers.find_capable(required)
    }

    /// Proposal over every registered peer, with the configured quorum
    pub fn proposal_for(&self, question: impl Into<String>) -> Proposal {
        let voters = self
            .peers
            .profiles()
            .iter()
            .map(Voter::from)
            .collect::<Vec<_>>();
        let mut proposal = Proposal::new(question, voters)
            .with_timeout_ms(self.config.vote_timeout.as_millis() as u64);
        if let Some(quorum) = self.config.quorum {
            proposal = proposal.with_quorum(quorum);
        }
        proposal
    }

    /// Await a peer future under the given deadline and the caller's token
    async fn bounded<T>(
        &self,
        agent: &AgentId,
        limit: Duration,
        cancel: &CancellationToken,
        call: impl Future<Output = Result<T, PeerError>>,
    ) -> Result<T, CollaborationError> {
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CollaborationError::Cancelled),
            r = tokio::time::timeout(limit, call) => r,
        };
        match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(PeerError::Cancelled)) => Err(CollaborationError::Cancelled),
            Ok(Err(source)) => Err(CollaborationError::Peer {
                agent: agent.clone(),
                source,
            }),
            Err(_) => Err(CollaborationError::Timeout {
                agent: agent.clone(),
                after_ms: limit.as_millis() as u64,
            }),
        }
    }

    /// Forward a task to one peer's reasoning loop and return its answer.
    pub async fn delegate(
        &self,
        task: &str,
        target: &AgentId,
        context: &TaskContext,
        cancel: &CancellationToken,
    ) -> Result<String, CollaborationError> {
        self.ensure_enabled()?;
        let limit = self.config.max_delegation_depth;
        if context.delegation_depth >= limit {
            return Err(CollaborationError::DepthExceeded {
                depth: context.delegation_depth + 1,
                limit,
            });
        }
        let peer = self
            .peers
            .get(target)
            .ok_or_else(|| CollaborationError::PeerNotFound(target.clone()))?;

        let child = context.delegated();
        info!(agent = %target, depth = child.delegation_depth, "Delegating task");
        let result = self
            .bounded(
                target,
                self.config.delegation_timeout,
                cancel,
                peer.run(task, &child, cancel),
            )
            .await;

        match &result {
            Ok(_) => info!(agent = %target, "Delegated task completed"),
            Err(e) => warn!(agent = %target, error = %e, "Delegated task failed"),
        }
        self.logger.log(ExecutionEvent::new(
            "delegation",
            json!({
                "agent": target.as_str(),
                "depth": child.delegation_depth,
                "success": result.is_ok(),
                "error": result.as_ref().err().map(|e| e.to_string()),
            }),
        ));
        result
    }

    /// Delegate to the capable peers in turn until one succeeds.
    ///
    /// Returns the peer that answered and its answer, or the last error.
    pub async fn delegate_to_capable(
        &self,
        task: &str,
        required: &[Capability],
        context: &TaskContext,
        cancel: &CancellationToken,
    ) -> Result<(AgentId, String), CollaborationError> {
        self.ensure_enabled()?;
        let candidates = self.find_capable_agents(required);
        if candidates.is_empty() {
            let tags: Vec<&str> = required.iter().map(Capability::as_str).collect();
            return Err(CollaborationError::NoCapablePeer(tags.join(", ")));
        }

        let mut last_error = CollaborationError::NoPeers;
        for peer in candidates {
            let id = peer.profile().id.clone();
            match self.delegate(task, &id, context, cancel).await {
                Ok(answer) => return Ok((id, answer)),
                Err(e) if e.is_final() => return Err(e),
                Err(e) => last_error = e,
            }
        }
        Err(last_error)
    }

    /// Ask a peer to critique a completed result.
    ///
    /// Without an explicit reviewer the heaviest peer declaring `review` is
    /// used, else the heaviest peer.
    pub async fn request_review(
        &self,
        task: &str,
        work: &str,
        reviewer: Option<&AgentId>,
        context: &TaskContext,
        cancel: &CancellationToken,
    ) -> Result<ReviewVerdict, CollaborationError> {
        self.ensure_enabled()?;
        let peer = match reviewer {
            Some(id) => self
                .peers
                .get(id)
                .cloned()
                .ok_or_else(|| CollaborationError::PeerNotFound(id.clone()))?,
            None => self
                .find_capable_agents(&[Capability::new("review")])
                .into_iter()
                .next()
                .or_else(|| self.peers.heaviest().cloned())
                .ok_or(CollaborationError::NoPeers)?,
        };
        let id = peer.profile().id.clone();

        let verdict = self
            .bounded(
                &id,
                self.config.delegation_timeout,
                cancel,
                peer.review(task, work, context, cancel),
            )
            .await?;

        info!(reviewer = %id, approved = verdict.approved, "Peer review received");
        self.logger.log(ExecutionEvent::new(
            "peer_review",
            json!({
                "reviewer": id.as_str(),
                "approved": verdict.approved,
            }),
        ));
        Ok(verdict)
    }

    /// Collect votes from every voter concurrently and tally them.
    ///
    /// Voters that are not registered, fail, or miss the deadline become
    /// failed ballots; they never count as abstentions.
    pub async fn run_consensus(
        &self,
        mut proposal: Proposal,
        algorithm: VotingAlgorithm,
        context: &TaskContext,
        cancel: &CancellationToken,
    ) -> Result<ConsensusResult, CollaborationError> {
        self.ensure_enabled()?;
        proposal
            .validate()
            .map_err(|e| CollaborationError::InvalidProposal(e.to_string()))?;
        algorithm
            .validate()
            .map_err(CollaborationError::InvalidProposal)?;

        let limit = proposal
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(self.config.vote_timeout);
        info!(
            proposal = %proposal.id,
            voters = proposal.voters.len(),
            quorum = proposal.quorum,
            algorithm = %algorithm.description(),
            "Starting consensus"
        );

        let mut ballots = Vec::with_capacity(proposal.voters.len());
        let mut pending: HashSet<AgentId> = HashSet::new();
        let mut join_set = JoinSet::new();

        for voter in &proposal.voters {
            let Some(peer) = self.peers.get(&voter.id).cloned() else {
                warn!(voter = %voter.id, "Voter is not a registered peer");
                ballots.push(Ballot::Failed {
                    voter: voter.id.clone(),
                    error: "not a registered peer".to_string(),
                });
                continue;
            };
            pending.insert(voter.id.clone());

            let voter_id = voter.id.clone();
            let proposal = proposal.clone();
            let context = context.clone();
            let cancel = cancel.child_token();
            join_set.spawn(async move {
                match tokio::time::timeout(limit, peer.vote(&proposal, &context, &cancel)).await {
                    Ok(Ok(vote)) => Ballot::cast(vote),
                    Ok(Err(e)) => Ballot::Failed {
                        voter: voter_id,
                        error: e.to_string(),
                    },
                    Err(_) => Ballot::TimedOut { voter: voter_id },
                }
            });
        }

        loop {
            let joined = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    join_set.abort_all();
                    return Err(CollaborationError::Cancelled);
                }
                joined = join_set.join_next() => joined,
            };
            let Some(joined) = joined else {
                break;
            };
            match joined {
                Ok(ballot) => {
                    if let Ballot::Failed { voter, error } = &ballot {
                        warn!(voter = %voter, error = %error, "Vote failed");
                    } else if let Ballot::TimedOut { voter } = &ballot {
                        warn!(voter = %voter, "Vote timed out");
                    }
                    pending.remove(ballot.voter());
                    ballots.push(ballot);
                }
                Err(e) => warn!("Vote task join error: {}", e),
            }
        }
        for voter in pending {
            ballots.push(Ballot::Failed {
                voter,
                error: "vote task did not complete".to_string(),
            });
        }

        proposal.close();
        let result = tally(
            &proposal,
            ballots,
            &algorithm,
            &self.config.role_weights,
            self.clock.now_millis(),
        );

        info!(proposal = %proposal.id, "Consensus: {}", result.summary());
        self.observer.on_consensus(&result);
        self.logger.log(ExecutionEvent::new(
            "consensus",
            serde_json::to_value(&result).unwrap_or(Value::Null),
        ));
        Ok(result)
    }

    /// Settle a disagreement between candidate answers.
    ///
    /// Identical candidates resolve immediately whatever the strategy.
    pub async fn resolve_conflict(
        &self,
        question: &str,
        candidates: Vec<Candidate>,
        strategy: ConflictStrategy,
        context: &TaskContext,
        cancel: &CancellationToken,
    ) -> Result<Resolution, CollaborationError> {
        if candidates.is_empty() {
            return Err(CollaborationError::NoCandidates);
        }
        if let Some(value) = unanimous(&candidates) {
            return Ok(Resolution::Resolved {
                value: value.clone(),
                strategy,
                decided_by: None,
                rationale: "all candidates agree".to_string(),
            });
        }

        let resolution = match strategy {
            ConflictStrategy::Mediation => {
                self.mediate(question, candidates, context, cancel).await?
            }
            ConflictStrategy::Arbitration => {
                self.arbitrate(question, candidates, context, cancel).await?
            }
            ConflictStrategy::Compromise => match compromise(&candidates) {
                Ok(value) => Resolution::Resolved {
                    value,
                    strategy,
                    decided_by: None,
                    rationale: format!("weighted compromise of {} candidates", candidates.len()),
                },
                Err(e) => Resolution::Escalated {
                    reason: e.to_string(),
                    candidates,
                },
            },
            ConflictStrategy::Escalation => Resolution::Escalated {
                reason: "escalation requested".to_string(),
                candidates,
            },
        };

        match &resolution {
            Resolution::Resolved { rationale, .. } => {
                info!(strategy = ?strategy, "Conflict resolved: {}", rationale)
            }
            Resolution::Escalated { reason, .. } => {
                warn!(strategy = ?strategy, "Conflict escalated: {}", reason)
            }
        }
        self.logger.log(ExecutionEvent::new(
            "conflict_resolution",
            serde_json::to_value(&resolution).unwrap_or(Value::Null),
        ));
        Ok(resolution)
    }

    async fn mediate(
        &self,
        question: &str,
        candidates: Vec<Candidate>,
        context: &TaskContext,
        cancel: &CancellationToken,
    ) -> Result<Resolution, CollaborationError> {
        self.ensure_enabled()?;
        let mediator = match &self.config.mediator {
            Some(id) => self
                .peers
                .get(id)
                .cloned()
                .ok_or_else(|| CollaborationError::PeerNotFound(id.clone()))?,
            None => self
                .peers
                .heaviest()
                .cloned()
                .ok_or(CollaborationError::NoPeers)?,
        };
        let id = mediator.profile().id.clone();
        let prompt = PromptTemplate::mediation_prompt(question, &rendered(&candidates));
        let reply = self
            .bounded(
                &id,
                self.config.delegation_timeout,
                cancel,
                mediator.run(&prompt, context, cancel),
            )
            .await?;

        if let Some(i) = parse_choice_index(&reply, candidates.len()) {
            return Ok(Resolution::Resolved {
                value: candidates[i].value.clone(),
                strategy: ConflictStrategy::Mediation,
                decided_by: Some(id),
                rationale: format!(
                    "mediator picked candidate {} from {}",
                    i + 1,
                    candidates[i].author
                ),
            });
        }

        let merged = match reply.find("Final Answer:") {
            Some(idx) => reply[idx + "Final Answer:".len()..].trim(),
            None => reply.trim(),
        };
        if merged.is_empty() {
            return Ok(Resolution::Escalated {
                reason: format!("mediator {} produced no answer", id),
                candidates,
            });
        }
        Ok(Resolution::Resolved {
            value: Value::String(merged.to_string()),
            strategy: ConflictStrategy::Mediation,
            decided_by: Some(id),
            rationale: "mediator merged the candidates".to_string(),
        })
    }

    async fn arbitrate(
        &self,
        question: &str,
        candidates: Vec<Candidate>,
        context: &TaskContext,
        cancel: &CancellationToken,
    ) -> Result<Resolution, CollaborationError> {
        if let Some(arbiter_id) = &self.config.arbiter {
            self.ensure_enabled()?;
            let arbiter = self
                .peers
                .get(arbiter_id)
                .cloned()
                .ok_or_else(|| CollaborationError::PeerNotFound(arbiter_id.clone()))?;
            let prompt = PromptTemplate::arbitration_prompt(question, &rendered(&candidates));
            let reply = self
                .bounded(
                    arbiter_id,
                    self.config.delegation_timeout,
                    cancel,
                    arbiter.run(&prompt, context, cancel),
                )
                .await?;

            if let Some(i) = parse_choice_index(&reply, candidates.len()) {
                return Ok(Resolution::Resolved {
                    value: candidates[i].value.clone(),
                    strategy: ConflictStrategy::Arbitration,
                    decided_by: Some(arbiter_id.clone()),
                    rationale: format!("arbiter picked candidate {}", i + 1),
                });
            }
            warn!(
                arbiter = %arbiter_id,
                "Arbiter reply had no usable choice, using the heaviest candidate"
            );
        }

        let Some(winner) = heaviest(&candidates) else {
            return Err(CollaborationError::NoCandidates);
        };
        Ok(Resolution::Resolved {
            value: winner.value.clone(),
            strategy: ConflictStrategy::Arbitration,
            decided_by: Some(winner.author.clone()),
            rationale: format!("highest-weight candidate (weight {})", winner.weight),
        })
    }
}

fn rendered(candidates: &[Candidate]) -> Vec<(String, String)> {
    candidates
        .iter()
        .map(|c| {
            let text = match &c.value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (c.author.to_string(), text)
        })
        .collect()
}
