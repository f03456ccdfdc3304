//! The local reasoning loop as a [`PeerAgent`].

use super::{RunAgentUseCase, RunOptions};
use crate::ports::peer_agent::{PeerAgent, PeerError};
use async_trait::async_trait;
use orchestra_domain::{AgentProfile, TaskContext, TerminationReason};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A peer backed by a [`RunAgentUseCase`] in this process
pub struct LocalPeerAgent {
    profile: AgentProfile,
    agent: Arc<RunAgentUseCase>,
}

impl LocalPeerAgent {
    pub fn new(profile: AgentProfile, agent: Arc<RunAgentUseCase>) -> Self {
        Self { profile, agent }
    }
}

#[async_trait]
impl PeerAgent for LocalPeerAgent {
    fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    async fn run(
        &self,
        task: &str,
        context: &TaskContext,
        cancel: &CancellationToken,
    ) -> Result<String, PeerError> {
        let options = RunOptions::new().with_cancellation(cancel.child_token());
        let out = self
            .agent
            .run(task, context, options)
            .await
            .map_err(|e| PeerError::TaskFailed(e.to_string()))?;

        match (out.terminated_reason, out.output) {
            (TerminationReason::FinalAnswer, Some(answer)) => Ok(answer),
            (TerminationReason::Cancelled, _) => Err(PeerError::Cancelled),
            (reason, _) => Err(PeerError::TaskFailed(match out.failure {
                Some(failure) => failure.to_string(),
                None => reason.to_string(),
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ExecutionConfig, GovernorConfig, LoopParams, RecoveryConfig};
    use crate::execution::{ToolExecutor, ToolRegistry};
    use crate::governor::ResourceGovernor;
    use crate::ports::language_model::{GatewayError, LanguageModel};
    use crate::recovery::RecoveryEngine;
    use orchestra_domain::quorum::{Choice, Proposal};
    use orchestra_domain::{GenerationParams, Message, ModelOutput};

    struct Fixed(&'static str);

    #[async_trait]
    impl LanguageModel for Fixed {
        fn provider(&self) -> &str {
            "fixed"
        }

        async fn generate(
            &self,
            _messages: &[Message],
            _params: &GenerationParams,
        ) -> Result<ModelOutput, GatewayError> {
            Ok(ModelOutput::Text(self.0.to_string()))
        }
    }

    struct Broken;

    #[async_trait]
    impl LanguageModel for Broken {
        fn provider(&self) -> &str {
            "broken"
        }

        async fn generate(
            &self,
            _messages: &[Message],
            _params: &GenerationParams,
        ) -> Result<ModelOutput, GatewayError> {
            Err(GatewayError::ModelNotAvailable("offline".into()))
        }
    }

    fn peer(model: Arc<dyn LanguageModel>) -> LocalPeerAgent {
        let governor = Arc::new(ResourceGovernor::new(GovernorConfig::default()));
        let executor = Arc::new(ToolExecutor::new(
            ToolRegistry::new(),
            ExecutionConfig::default(),
            governor.clone(),
        ));
        let agent = RunAgentUseCase::new(
            model,
            executor,
            Arc::new(RecoveryEngine::new(RecoveryConfig::default())),
            governor,
            LoopParams::default(),
        );
        LocalPeerAgent::new(AgentProfile::new("local"), Arc::new(agent))
    }

    #[tokio::test]
    async fn test_run_returns_final_answer() {
        let p = peer(Arc::new(Fixed("Paris")));
        let answer = p
            .run("capital of France?", &TaskContext::new(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(answer, "Paris");
    }

    #[tokio::test]
    async fn test_vote_goes_through_the_loop() {
        let p = peer(Arc::new(Fixed("VOTE: YES, the plan is sound")));
        let proposal = Proposal::new("ship it?", vec![]);
        let vote = p
            .vote(&proposal, &TaskContext::new(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(vote.choice, Choice::Yes);
        assert_eq!(vote.voter.as_str(), "local");
    }

    #[tokio::test]
    async fn test_model_failure_surfaces_as_task_failed() {
        let p = peer(Arc::new(Broken));
        let err = p
            .run("anything", &TaskContext::new(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PeerError::TaskFailed(msg) if msg.contains("offline")));
    }

    #[tokio::test]
    async fn test_cancelled_peer() {
        let p = peer(Arc::new(Fixed("never")));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = p.run("x", &TaskContext::new(), &cancel).await.unwrap_err();
        assert_eq!(err, PeerError::Cancelled);
    }
}
