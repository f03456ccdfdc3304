//! Run Agent use case.
//!
//! Drives one task through the reasoning loop:
//!
//! ```text
//! THINKING ──▶ ACTING ──▶ OBSERVING ──▶ THINKING ...
//!    │  ▲         │
//!    │  └ parse   └──▶ FAILED (recovery aborted)
//!    │    error
//!    ├──▶ DONE   (final answer)
//!    └──▶ FAILED (iteration limit, model failure)
//! ```
//!
//! The whole run is bounded by the task timeout and the caller's
//! cancellation token; either ends it as FAILED with a matching
//! [`TerminationReason`].
//!
//! A top-level run holds one `ConcurrentTasks` slot from start to finish.
//! Delegated runs execute inside their parent's slot. Tool results kept in
//! the observation log are charged to `Memory` until the run returns; a
//! result that does not fit is recorded as a failed call.
//!
//! # Module Structure
//!
//! - `types`: error, options and output types
//! - `peer`: [`LocalPeerAgent`], the loop exposed as a peer

mod peer;
mod types;

pub use peer::LocalPeerAgent;
pub use types::{RunAgentError, RunAgentOutput, RunOptions};

use crate::config::LoopParams;
use crate::execution::{BatchOutcome, CallScope, ToolExecutor};
use crate::governor::{GovernorError, ResourceGovernor, ResourceLease};
use crate::ports::execution_logger::{ExecutionEvent, ExecutionLogger, NoExecutionLogger};
use crate::ports::execution_observer::ExecutionObserver;
use crate::ports::language_model::LanguageModel;
use crate::recovery::{RecoveryEngine, RecoveryFailure};
use orchestra_domain::session::estimate_tokens;
use orchestra_domain::tool::{ToolCallResult, ToolError};
use orchestra_domain::{
    AgentPromptTemplate, ErrorKind, LoopState, Message, ModelAction, ModelOutput,
    ObservationLog, ReasoningState, RecoveryStrategy, ResourceKind, RetryPolicy, TaskContext,
    TaskFailure, TerminationReason, ToolObservation,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Mutable state of one run
struct RunState<'a> {
    state: ReasoningState,
    log: ObservationLog,
    /// Bytes of tool output held in `log`
    memory: ResourceLease<'a>,
    /// System prompt and task, sent on every step
    base: Vec<Message>,
    /// Latest exchange: the previous reply plus what the loop said back
    tail: Vec<Message>,
    output: Option<String>,
    failure: Option<TaskFailure>,
}

impl<'a> RunState<'a> {
    fn new(base: Vec<Message>, memory: ResourceLease<'a>) -> Self {
        Self {
            state: ReasoningState::new(),
            log: ObservationLog::new(),
            memory,
            base,
            tail: Vec::new(),
            output: None,
            failure: None,
        }
    }

    fn messages(&self) -> Vec<Message> {
        self.base.iter().chain(self.tail.iter()).cloned().collect()
    }
}

enum ThinkFailure {
    Cancelled,
    Failed(TaskFailure),
}

/// The reasoning loop for a single agent
pub struct RunAgentUseCase {
    model: Arc<dyn LanguageModel>,
    executor: Arc<ToolExecutor>,
    recovery: Arc<RecoveryEngine>,
    governor: Arc<ResourceGovernor>,
    params: LoopParams,
    logger: Arc<dyn ExecutionLogger>,
}

impl RunAgentUseCase {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        executor: Arc<ToolExecutor>,
        recovery: Arc<RecoveryEngine>,
        governor: Arc<ResourceGovernor>,
        params: LoopParams,
    ) -> Self {
        Self {
            model,
            executor,
            recovery,
            governor,
            params,
            logger: Arc::new(NoExecutionLogger),
        }
    }

    pub fn with_logger(mut self, logger: Arc<dyn ExecutionLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn params(&self) -> &LoopParams {
        &self.params
    }

    /// Run `task` until a final answer or a termination condition.
    ///
    /// Returns `Err` only when the run cannot start or the loop reaches an
    /// impossible state; every other ending is reported in the output.
    pub async fn run(
        &self,
        task: &str,
        context: &TaskContext,
        options: RunOptions,
    ) -> Result<RunAgentOutput, RunAgentError> {
        let limit = self.params.effective_iterations(options.max_iterations);
        if limit == 0 {
            return Err(RunAgentError::InvalidConfig(
                "iteration budget must be at least 1".to_string(),
            ));
        }
        let observer = options.observer.as_ref();
        let cancel = &options.cancel;
        let _slot = match context.delegation_depth {
            0 => Some(
                self.governor
                    .lease(ResourceKind::ConcurrentTasks, 1, cancel)
                    .await?,
            ),
            _ => None,
        };
        // Scoped to this run: in-flight calls are signalled however the run ends.
        let task_cancel = cancel.child_token();
        let _task_guard = task_cancel.clone().drop_guard();
        let started = Instant::now();
        let mut run = RunState::new(
            self.initial_messages(task, context),
            self.governor.hold(ResourceKind::Memory),
        );

        info!(
            provider = self.model.provider(),
            max_iterations = limit,
            tenant = context.tenant.as_deref().unwrap_or("-"),
            depth = context.delegation_depth,
            "Starting agent run"
        );

        let reason = {
            let body = self.drive(&mut run, context, limit, observer, &task_cancel);
            let deadline = self.deadline();
            let bounded = async move {
                match deadline {
                    Some(limit) => tokio::time::timeout(limit, body).await.ok(),
                    None => Some(body.await),
                }
            };
            tokio::select! {
                biased;
                _ = cancel.cancelled() => TerminationReason::Cancelled,
                finished = bounded => match finished {
                    Some(result) => result?,
                    None => TerminationReason::Timeout {
                        elapsed_ms: started.elapsed().as_millis() as u64,
                    },
                },
            }
        };

        if matches!(
            reason,
            TerminationReason::Cancelled | TerminationReason::Timeout { .. }
        ) {
            task_cancel.cancel();
            self.interrupt(&mut run, &reason, observer);
        }

        observer.on_terminated(&reason);
        self.logger.log(ExecutionEvent::new(
            "loop_terminated",
            json!({
                "reason": reason,
                "iterations": run.state.iteration(),
                "observations": run.log.len(),
                "failures": run.log.failures(),
            }),
        ));
        info!(
            reason = %reason,
            iterations = run.state.iteration(),
            observations = run.log.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Agent run finished"
        );

        Ok(RunAgentOutput {
            output: run.output,
            observations: run.log.into_vec(),
            terminated_reason: reason,
            iterations: run.state.iteration(),
            state: run.state,
            failure: run.failure,
        })
    }

    async fn drive(
        &self,
        run: &mut RunState<'_>,
        context: &TaskContext,
        limit: usize,
        observer: &dyn ExecutionObserver,
        cancel: &CancellationToken,
    ) -> Result<TerminationReason, RunAgentError> {
        loop {
            // ========== THINKING ==========
            if run.state.iteration() >= limit {
                warn!(limit, "Iteration limit reached without a final answer");
                self.transition(run, LoopState::Failed, observer)?;
                run.failure = Some(TaskFailure::new(
                    ErrorKind::ResourceExhausted,
                    format!("no final answer within {} iterations", limit),
                ));
                return Ok(TerminationReason::IterationLimit { limit });
            }

            let iteration = run.state.begin_iteration();
            observer.on_iteration(iteration, limit);
            debug!(iteration, max_iterations = limit, "Thinking");

            let output = match self.think(&run.messages(), observer, cancel).await {
                Ok(output) => output,
                Err(ThinkFailure::Cancelled) => return Ok(TerminationReason::Cancelled),
                Err(ThinkFailure::Failed(failure)) => {
                    error!(iteration, error = %failure, "Model call failed");
                    self.transition(run, LoopState::Failed, observer)?;
                    run.failure = Some(failure);
                    return Ok(TerminationReason::ModelFailure);
                }
            };

            let transcript = output.text();
            let (calls, parallel) = match output.into_action() {
                Ok(ModelAction::FinalAnswer { answer, .. }) => {
                    self.transition(run, LoopState::Done, observer)?;
                    run.output = Some(answer);
                    return Ok(TerminationReason::FinalAnswer);
                }
                Ok(ModelAction::ToolCalls { calls, parallel, .. }) if !calls.is_empty() => {
                    (calls, parallel)
                }
                Ok(ModelAction::ToolCalls { .. }) => {
                    self.reject_reply(run, transcript, "tool_calls is empty", observer)?;
                    continue;
                }
                Err(reason) => {
                    self.reject_reply(run, transcript, &reason, observer)?;
                    continue;
                }
            };

            // ========== ACTING ==========
            self.transition(run, LoopState::Acting, observer)?;
            debug!(iteration, calls = calls.len(), parallel, "Acting");
            let scope = CallScope::new(cancel)
                .with_tenant(context.tenant.as_deref())
                .with_observer(observer);
            let BatchOutcome {
                mut results,
                completion_order,
            } = if parallel {
                self.executor.execute(&calls, scope).await
            } else {
                self.executor.execute_sequential(&calls, scope).await
            };

            let mut recovered_by: Vec<Option<RecoveryStrategy>> = vec![None; results.len()];
            let mut aborted = None;
            for &i in &completion_order {
                let Err(err) = &results[i].outcome else {
                    continue;
                };
                if !worth_recovering(err) {
                    continue;
                }
                let (call, err) = (results[i].call.clone(), err.clone());
                match self
                    .recovery
                    .recover(&self.executor, &call, &err, context, scope)
                    .await
                {
                    Ok(recovered) => {
                        results[i] = recovered.result;
                        recovered_by[i] = Some(recovered.strategy);
                    }
                    Err(RecoveryFailure {
                        failure,
                        aborted: true,
                    }) => {
                        aborted = Some(failure);
                        break;
                    }
                    Err(RecoveryFailure { failure, .. }) => {
                        debug!(
                            call = %call.label(),
                            error = %failure,
                            "Call stays failed after recovery"
                        );
                    }
                }
            }

            if let Some(failure) = aborted {
                self.record(run, iteration, &results, &completion_order, &recovered_by);
                error!(iteration, error = %failure, "Recovery aborted the task");
                self.transition(run, LoopState::Failed, observer)?;
                run.failure = Some(failure);
                return Ok(TerminationReason::RecoveryAborted);
            }

            // ========== OBSERVING ==========
            self.transition(run, LoopState::Observing, observer)?;
            self.record(run, iteration, &results, &completion_order, &recovered_by);
            let observed = run
                .log
                .to_context(self.params.max_context_chars, self.params.max_payload_chars);
            run.tail = vec![
                Message::assistant(transcript),
                Message::user(AgentPromptTemplate::observations(&observed, iteration, limit)),
            ];
            self.transition(run, LoopState::Thinking, observer)?;
        }
    }

    /// One model call, with retries for transient failures
    async fn think(
        &self,
        messages: &[Message],
        observer: &dyn ExecutionObserver,
        cancel: &CancellationToken,
    ) -> Result<ModelOutput, ThinkFailure> {
        let tokens = estimate_tokens(messages);
        self.governor
            .acquire(ResourceKind::Tokens, tokens, cancel)
            .await
            .map_err(|e| match e {
                GovernorError::Cancelled => ThinkFailure::Cancelled,
                other => ThinkFailure::Failed(TaskFailure::new(
                    ErrorKind::ResourceExhausted,
                    other.to_string(),
                )),
            })?;

        let backoff = RetryPolicy::default();
        let mut attempt = 0;
        loop {
            let result = match self
                .model
                .generate_streaming(messages, &self.params.generation)
                .await
            {
                Ok(handle) => {
                    handle
                        .collect_output(|chunk| observer.on_model_chunk(chunk))
                        .await
                }
                Err(e) => Err(e),
            };
            match result {
                Ok(output) => return Ok(output),
                Err(e) if e.is_transient() && attempt < self.params.model_retries => {
                    let delay = backoff.delay_for_attempt(attempt, 0.5);
                    warn!(
                        provider = self.model.provider(),
                        attempt = attempt + 1,
                        error = %e,
                        ?delay,
                        "Model call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    let message = format!("model {} failed: {}", self.model.provider(), e);
                    return Err(ThinkFailure::Failed(TaskFailure::new(
                        ErrorKind::classify(&message),
                        message,
                    )));
                }
            }
        }
    }

    /// Send an unreadable reply back to the model and think again
    fn reject_reply(
        &self,
        run: &mut RunState,
        transcript: String,
        reason: &str,
        observer: &dyn ExecutionObserver,
    ) -> Result<(), RunAgentError> {
        warn!(iteration = run.state.iteration(), error = reason, "Model reply could not be parsed");
        run.tail.push(Message::assistant(transcript));
        run.tail
            .push(Message::user(AgentPromptTemplate::parse_error(reason)));
        self.transition(run, LoopState::Thinking, observer)
    }

    /// Record one observation per call, in completion order
    fn record(
        &self,
        run: &mut RunState,
        iteration: usize,
        results: &[ToolCallResult],
        completion_order: &[usize],
        recovered_by: &[Option<RecoveryStrategy>],
    ) {
        for &i in completion_order {
            let charged = Self::charge_output(run, &results[i]);
            let result = charged.as_ref().unwrap_or(&results[i]);
            let mut observation = ToolObservation::from_result(result);
            if let Some(strategy) = recovered_by[i] {
                observation = observation.recovered_by(strategy);
            }
            self.logger.log(ExecutionEvent::new(
                "tool_observation",
                json!({
                    "iteration": iteration,
                    "index": i,
                    "observation": observation,
                }),
            ));
            run.log.push(observation);
        }
    }

    /// Charge a successful call's output to the run's memory lease.
    ///
    /// Returns a failed replacement result when the output does not fit.
    fn charge_output(run: &mut RunState, result: &ToolCallResult) -> Option<ToolCallResult> {
        let value = result.value()?;
        let bytes = value.to_string().len() as u64;
        let denied = run.memory.charge(bytes).err()?;
        warn!(call = %result.call.label(), bytes, error = %denied, "Tool output dropped");
        Some(ToolCallResult::failure(
            result.call.clone(),
            denied.to_tool_error(),
            result.duration,
            result.completed_at,
        ))
    }

    fn transition(
        &self,
        run: &mut RunState,
        next: LoopState,
        observer: &dyn ExecutionObserver,
    ) -> Result<(), RunAgentError> {
        let from = run.state.state();
        run.state.transition(next)?;
        debug!(from = %from, to = %next, "Loop state change");
        observer.on_state_change(from, next);
        Ok(())
    }

    /// End a run stopped from outside the loop (timeout or cancellation)
    fn interrupt(
        &self,
        run: &mut RunState,
        reason: &TerminationReason,
        observer: &dyn ExecutionObserver,
    ) {
        let from = run.state.state();
        if !from.is_terminal() {
            run.state.fail();
            observer.on_state_change(from, LoopState::Failed);
        }
        if run.failure.is_none() {
            let kind = match reason {
                TerminationReason::Cancelled => ErrorKind::Cancelled,
                _ => ErrorKind::ResourceExhausted,
            };
            warn!(reason = %reason, "Agent run interrupted");
            run.failure = Some(TaskFailure::new(kind, format!("task {}", reason)));
        }
    }

    fn initial_messages(&self, task: &str, context: &TaskContext) -> Vec<Message> {
        let system = match &self.params.system_prompt {
            Some(prompt) => prompt.clone(),
            None => AgentPromptTemplate::agent_system(&self.executor.tools().definitions()),
        };
        let variables: Vec<(String, String)> = context
            .variables
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        vec![
            Message::system(system),
            Message::user(AgentPromptTemplate::task(task, &variables)),
        ]
    }

    /// The tighter of the loop's own timeout and the governor's task budget
    fn deadline(&self) -> Option<Duration> {
        match (self.params.task_timeout, self.governor.task_timeout()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
}

/// Cancelled calls and calls skipped for a failed dependency are left as is.
fn worth_recovering(error: &ToolError) -> bool {
    !error.is_cancelled() && error.code != "DEPENDENCY_FAILED"
}
