//! Error Recovery Engine.
//!
//! Walks an ordered strategy chain for one failed call. Each strategy is
//! planned by a pure function from [`StrategyRegistry`] and then carried
//! out here against the executor or the collaboration engine.
//!
//! ```text
//! failure ──▶ retry ──▶ simplify ──▶ fallback ──▶ delegate ──▶ (abort)
//!               │           │            │            │
//!               └── success stops the chain, failure escalates
//! ```
//!
//! An exhausted chain returns a terminal failure for the call; only an
//! explicit `abort` step marks the failure as aborting the task.

use crate::collaboration::{CollaborationEngine, CollaborationError};
use crate::config::RecoveryConfig;
use crate::execution::{CallScope, ToolExecutor};
use crate::ports::execution_logger::{ExecutionEvent, ExecutionLogger, NoExecutionLogger};
use orchestra_domain::core::clock::{Clock, SystemClock};
use orchestra_domain::recovery::{
    AttemptOutcome, ErrorKind, FailureContext, RecoveryAttempt, RecoveryStrategy, RetryPolicy,
    StrategyPlan, StrategyRegistry, TaskFailure,
};
use orchestra_domain::tool::{ResultSource, ToolCall, ToolCallResult, ToolError};
use orchestra_domain::{Capability, TaskContext};
use rand::Rng;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A call that recovery turned into a success
#[derive(Debug, Clone)]
pub struct Recovered {
    pub result: ToolCallResult,
    /// The strategy that produced the result
    pub strategy: RecoveryStrategy,
    pub trail: Vec<RecoveryAttempt>,
}

/// Recovery did not produce a result
#[derive(Debug, Clone)]
pub struct RecoveryFailure {
    pub failure: TaskFailure,
    /// An `abort` step stopped the chain
    pub aborted: bool,
}

impl RecoveryFailure {
    fn cancelled(trail: Vec<RecoveryAttempt>) -> Self {
        Self {
            failure: TaskFailure::new(ErrorKind::Cancelled, "recovery cancelled").with_trail(trail),
            aborted: false,
        }
    }
}

pub struct RecoveryEngine {
    config: RecoveryConfig,
    planners: StrategyRegistry,
    collaboration: Option<Arc<CollaborationEngine>>,
    logger: Arc<dyn ExecutionLogger>,
    clock: Arc<dyn Clock>,
}

impl RecoveryEngine {
    pub fn new(config: RecoveryConfig) -> Self {
        Self {
            config,
            planners: StrategyRegistry::default(),
            collaboration: None,
            logger: Arc::new(NoExecutionLogger),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_planners(mut self, planners: StrategyRegistry) -> Self {
        self.planners = planners;
        self
    }

    /// Enables the `delegate` strategy
    pub fn with_collaboration(mut self, collaboration: Arc<CollaborationEngine>) -> Self {
        self.collaboration = Some(collaboration);
        self
    }

    pub fn with_logger(mut self, logger: Arc<dyn ExecutionLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &RecoveryConfig {
        &self.config
    }

    /// Recover with the configured strategy chain
    pub async fn recover(
        &self,
        executor: &ToolExecutor,
        call: &ToolCall,
        error: &ToolError,
        context: &TaskContext,
        scope: CallScope<'_>,
    ) -> Result<Recovered, RecoveryFailure> {
        self.recover_with(&self.config.strategies, executor, call, error, context, scope)
            .await
    }

    /// Recover with an explicit strategy chain, applied in the given order.
    ///
    /// Every step is planned against the original error.
    pub async fn recover_with(
        &self,
        strategies: &[RecoveryStrategy],
        executor: &ToolExecutor,
        call: &ToolCall,
        error: &ToolError,
        context: &TaskContext,
        scope: CallScope<'_>,
    ) -> Result<Recovered, RecoveryFailure> {
        let mut trail = Vec::with_capacity(strategies.len());
        let operation = executor
            .tools()
            .get(&call.tool_id)
            .and_then(|backend| backend.definition().operation(&call.operation).cloned());
        let delegation_available = self
            .collaboration
            .as_ref()
            .is_some_and(|c| c.is_available());

        for &strategy in strategies {
            if scope.cancel.is_cancelled() {
                return Err(RecoveryFailure::cancelled(trail));
            }
            let started = tokio::time::Instant::now();
            let failure = FailureContext {
                call,
                error,
                operation: operation.as_ref(),
                retry: &self.config.retry,
                fallbacks: &self.config.fallbacks,
                delegation_available,
            };

            let step = match self.planners.plan(strategy, &failure) {
                StrategyPlan::Skip(reason) => {
                    debug!(
                        tool = %call.tool_id,
                        strategy = %strategy,
                        "Recovery step skipped: {}",
                        reason
                    );
                    self.record(
                        &mut trail,
                        call,
                        error,
                        strategy,
                        AttemptOutcome::Skipped,
                        Some(reason),
                        started,
                        scope,
                    );
                    continue;
                }
                StrategyPlan::Abort => {
                    warn!(tool = %call.tool_id, "Recovery aborted");
                    self.record(
                        &mut trail,
                        call,
                        error,
                        strategy,
                        AttemptOutcome::Aborted,
                        None,
                        started,
                        scope,
                    );
                    let failure = TaskFailure::new(
                        ErrorKind::Terminal,
                        format!("recovery aborted for {}: {}", call.label(), error.message),
                    )
                    .with_trail(trail);
                    return Err(RecoveryFailure {
                        failure,
                        aborted: true,
                    });
                }
                StrategyPlan::Retry { max_attempts } => {
                    self.retry(executor, call, max_attempts, scope).await
                }
                StrategyPlan::Split(parts) => self.split(executor, call, &parts, scope).await,
                StrategyPlan::Alternatives(alternatives) => {
                    self.alternatives(executor, &alternatives, scope).await
                }
                StrategyPlan::Delegate { capabilities, task } => {
                    self.delegate(call, &capabilities, &task, context, scope).await
                }
            };

            match step {
                Ok(result) => {
                    info!(tool = %call.tool_id, strategy = %strategy, "Recovery succeeded");
                    self.record(
                        &mut trail,
                        call,
                        error,
                        strategy,
                        AttemptOutcome::Succeeded,
                        None,
                        started,
                        scope,
                    );
                    return Ok(Recovered {
                        result,
                        strategy,
                        trail,
                    });
                }
                Err(step_error) => {
                    warn!(
                        tool = %call.tool_id,
                        strategy = %strategy,
                        error = %step_error,
                        "Recovery step failed, escalating"
                    );
                    self.record(
                        &mut trail,
                        call,
                        error,
                        strategy,
                        AttemptOutcome::Escalated,
                        Some(step_error.to_string()),
                        started,
                        scope,
                    );
                    if step_error.is_cancelled() {
                        return Err(RecoveryFailure::cancelled(trail));
                    }
                }
            }
        }

        warn!(tool = %call.tool_id, steps = trail.len(), "Recovery chain exhausted");
        let failure = TaskFailure::new(
            ErrorKind::Terminal,
            format!("recovery exhausted for {}: {}", call.label(), error.message),
        )
        .with_trail(trail);
        Err(RecoveryFailure {
            failure,
            aborted: false,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn record(
        &self,
        trail: &mut Vec<RecoveryAttempt>,
        call: &ToolCall,
        error: &ToolError,
        strategy: RecoveryStrategy,
        outcome: AttemptOutcome,
        detail: Option<String>,
        started: tokio::time::Instant,
        scope: CallScope<'_>,
    ) {
        let mut attempt = RecoveryAttempt::new(
            error.clone(),
            strategy,
            outcome,
            started.elapsed().as_millis() as u64,
        );
        if let Some(detail) = detail {
            attempt = attempt.with_detail(detail);
        }
        scope.observer.on_recovery_attempt(call, &attempt);
        self.logger.log(ExecutionEvent::new(
            "recovery_attempt",
            json!({
                "tool": call.tool_id,
                "operation": call.operation,
                "attempt": serde_json::to_value(&attempt).unwrap_or(Value::Null),
            }),
        ));
        trail.push(attempt);
    }

    /// Re-issue the call with backoff until it succeeds, stops being
    /// retryable, or `max_attempts` is spent.
    async fn retry(
        &self,
        executor: &ToolExecutor,
        call: &ToolCall,
        max_attempts: u32,
        scope: CallScope<'_>,
    ) -> Result<ToolCallResult, ToolError> {
        let mut last = ToolError::execution_failed("no retry attempted");
        for attempt in 0..max_attempts {
            let delay = backoff(&self.config.retry, attempt);
            debug!(
                tool = %call.tool_id,
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                "Retrying call"
            );
            tokio::select! {
                biased;
                _ = scope.cancel.cancelled() => return Err(ToolError::cancelled()),
                _ = tokio::time::sleep(delay) => {}
            }

            let result = executor.execute_one(call, scope).await;
            match result.outcome {
                Ok(_) => return Ok(result),
                Err(e) if !e.kind.is_retryable() => return Err(e),
                Err(e) => last = e,
            }
        }
        Err(last)
    }

    /// Run every reduced call; their values replace the original result.
    async fn split(
        &self,
        executor: &ToolExecutor,
        call: &ToolCall,
        parts: &[ToolCall],
        scope: CallScope<'_>,
    ) -> Result<ToolCallResult, ToolError> {
        let started = tokio::time::Instant::now();
        let outcome = executor.execute(parts, scope).await;
        let mut values = Vec::with_capacity(parts.len());
        for result in outcome.results {
            values.push(result.outcome?);
        }
        let merged = if values.len() == 1 {
            values.remove(0)
        } else {
            Value::Array(values)
        };
        Ok(ToolCallResult::success(
            call.clone(),
            merged,
            started.elapsed(),
            ResultSource::Backend,
            self.clock.now_millis(),
        ))
    }

    async fn alternatives(
        &self,
        executor: &ToolExecutor,
        alternatives: &[ToolCall],
        scope: CallScope<'_>,
    ) -> Result<ToolCallResult, ToolError> {
        let mut last = ToolError::execution_failed("no alternative available");
        for alternative in alternatives {
            let result = executor.execute_one(alternative, scope).await;
            match result.outcome {
                Ok(_) => return Ok(result),
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => last = e,
            }
        }
        Err(last)
    }

    async fn delegate(
        &self,
        call: &ToolCall,
        capabilities: &[String],
        task: &str,
        context: &TaskContext,
        scope: CallScope<'_>,
    ) -> Result<ToolCallResult, ToolError> {
        let Some(collaboration) = &self.collaboration else {
            return Err(ToolError::new(
                ErrorKind::CapabilityGap,
                "DELEGATION_FAILED",
                "no collaboration engine",
            ));
        };
        let started = tokio::time::Instant::now();
        let required: Vec<Capability> = capabilities.iter().map(Capability::new).collect();

        match collaboration
            .delegate_to_capable(task, &required, context, scope.cancel)
            .await
        {
            Ok((agent, answer)) => Ok(ToolCallResult::success(
                call.clone(),
                json!({ "delegated_to": agent.as_str(), "answer": answer }),
                started.elapsed(),
                ResultSource::Delegated,
                self.clock.now_millis(),
            )),
            Err(CollaborationError::Cancelled) => Err(ToolError::cancelled()),
            Err(e) => Err(ToolError::new(
                ErrorKind::CapabilityGap,
                "DELEGATION_FAILED",
                e.to_string(),
            )),
        }
    }
}

fn backoff(policy: &RetryPolicy, attempt: u32) -> Duration {
    let sample = if policy.jitter_factor > 0.0 {
        rand::thread_rng().r#gen::<f64>()
    } else {
        0.5
    };
    policy.delay_for_attempt(attempt, sample)
}
