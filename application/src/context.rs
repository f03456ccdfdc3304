//! Engine context
//!
//! Owns the shared subsystems for the lifetime of an engine: created at
//! start-up, passed to whoever runs tasks, and shut down once. Nothing here
//! is global; two contexts in one process share no state.

use crate::collaboration::CollaborationEngine;
use crate::execution::ToolExecutor;
use crate::governor::ResourceGovernor;
use crate::recovery::RecoveryEngine;
use crate::use_cases::run_agent::{RunAgentError, RunAgentOutput, RunAgentUseCase, RunOptions};
use orchestra_domain::{ResourceSnapshot, TaskContext};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct EngineContext {
    governor: Arc<ResourceGovernor>,
    executor: Arc<ToolExecutor>,
    recovery: Arc<RecoveryEngine>,
    collaboration: Arc<CollaborationEngine>,
    agent: Arc<RunAgentUseCase>,
    shutdown: CancellationToken,
}

impl EngineContext {
    pub fn new(
        governor: Arc<ResourceGovernor>,
        executor: Arc<ToolExecutor>,
        recovery: Arc<RecoveryEngine>,
        collaboration: Arc<CollaborationEngine>,
        agent: Arc<RunAgentUseCase>,
    ) -> Self {
        Self {
            governor,
            executor,
            recovery,
            collaboration,
            agent,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn governor(&self) -> &Arc<ResourceGovernor> {
        &self.governor
    }

    pub fn executor(&self) -> &Arc<ToolExecutor> {
        &self.executor
    }

    pub fn recovery(&self) -> &Arc<RecoveryEngine> {
        &self.recovery
    }

    pub fn collaboration(&self) -> &Arc<CollaborationEngine> {
        &self.collaboration
    }

    pub fn agent(&self) -> &Arc<RunAgentUseCase> {
        &self.agent
    }

    /// A fresh token for one task, cancelled when the engine shuts down
    pub fn task_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    /// Run a task on the local agent.
    ///
    /// The run stops when either the caller's token in `options` or the
    /// engine's shutdown token fires.
    pub async fn run(
        &self,
        task: &str,
        context: &TaskContext,
        options: RunOptions,
    ) -> Result<RunAgentOutput, RunAgentError> {
        let caller = options.cancel.clone();
        let token = self.task_token();
        let _task_guard = token.clone().drop_guard();
        let run = self
            .agent
            .run(task, context, options.with_cancellation(token.clone()));
        tokio::pin!(run);

        tokio::select! {
            biased;
            out = &mut run => out,
            _ = caller.cancelled() => {
                token.cancel();
                run.await
            }
        }
    }

    pub fn status(&self) -> ResourceSnapshot {
        self.governor.status()
    }

    /// Cancel every task started from this context. Idempotent.
    pub fn shutdown(&self) {
        if !self.shutdown.is_cancelled() {
            info!("Engine shutting down");
            self.shutdown.cancel();
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}
