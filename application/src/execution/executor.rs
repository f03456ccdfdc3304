//! Tool Execution Subsystem.
//!
//! [`ToolExecutor::execute`] runs a batch of [`ToolCall`]s:
//!
//! ```text
//! calls ──▶ levels by depends_on ──▶ level 0: parallel (≤ max_parallel)
//!                                    level 1: bind results of level 0, parallel
//!                                    ...
//! ```
//!
//! Every call goes through [`ToolExecutor::execute_one`]:
//!
//! ```text
//! cancelled? ─▶ lookup ─▶ validate ─▶ cache ─▶ circuit ─▶ rate limit
//!            ─▶ governor ─▶ invoke (timeout, cancel) ─▶ circuit verdict
//!            ─▶ TTL ─▶ cache write
//! ```
//!
//! A failing call never cancels its siblings. Results are returned aligned
//! to the request list; `completion_order` records the order they finished.

use super::protection::{CallVerdict, CircuitRegistry, ToolRateLimiter};
use super::registry::ToolRegistry;
use crate::config::ExecutionConfig;
use crate::governor::ResourceGovernor;
use crate::ports::execution_observer::{ExecutionObserver, NoObserver};
use crate::ports::result_cache::ResultCache;
use crate::ports::tool_backend::ToolBackend;
use futures::stream::{FuturesUnordered, StreamExt};
use orchestra_domain::cache::{CacheKey, TtlRegistry};
use orchestra_domain::core::clock::{Clock, SystemClock};
use orchestra_domain::resource::ResourceKind;
use orchestra_domain::tool::{
    DefaultToolValidator, ResultSource, ToolCall, ToolCallResult, ToolError,
    ToolValidator,
};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

static NO_OBSERVER: NoObserver = NoObserver;

/// Per-run inputs threaded through every call
#[derive(Clone, Copy)]
pub struct CallScope<'a> {
    /// Tenant folded into cache keys
    pub tenant: Option<&'a str>,
    pub cancel: &'a CancellationToken,
    pub observer: &'a dyn ExecutionObserver,
    /// Call-site hints for TTL strategies (`no_cache`, `cache_ttl`, ...)
    pub ttl_hints: Option<&'a Map<String, Value>>,
}

impl<'a> CallScope<'a> {
    pub fn new(cancel: &'a CancellationToken) -> Self {
        Self {
            tenant: None,
            cancel,
            observer: &NO_OBSERVER,
            ttl_hints: None,
        }
    }

    pub fn with_tenant(mut self, tenant: Option<&'a str>) -> Self {
        self.tenant = tenant;
        self
    }

    pub fn with_observer(mut self, observer: &'a dyn ExecutionObserver) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_ttl_hints(mut self, hints: &'a Map<String, Value>) -> Self {
        self.ttl_hints = Some(hints);
        self
    }
}

/// Results of one batch
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// `results[i]` belongs to `calls[i]`
    pub results: Vec<ToolCallResult>,
    /// Indices in the order the calls finished
    pub completion_order: Vec<usize>,
}

impl BatchOutcome {
    pub fn failures(&self) -> usize {
        self.results.iter().filter(|r| !r.is_success()).count()
    }

    /// Results in completion order
    pub fn in_completion_order(&self) -> impl Iterator<Item = (usize, &ToolCallResult)> {
        self.completion_order.iter().map(|&i| (i, &self.results[i]))
    }
}

pub struct ToolExecutor {
    tools: ToolRegistry,
    config: ExecutionConfig,
    governor: Arc<ResourceGovernor>,
    cache: Option<Arc<dyn ResultCache>>,
    ttl: TtlRegistry,
    validator: Arc<dyn ToolValidator>,
    circuits: CircuitRegistry,
    limiter: ToolRateLimiter,
    clock: Arc<dyn Clock>,
}

fn elapsed_since(start: Instant) -> Duration {
    tokio::time::Instant::now().into_std().saturating_duration_since(start)
}

impl ToolExecutor {
    pub fn new(
        tools: ToolRegistry,
        config: ExecutionConfig,
        governor: Arc<ResourceGovernor>,
    ) -> Self {
        let circuits = CircuitRegistry::new(config.circuit.clone());
        Self {
            tools,
            config,
            governor,
            cache: None,
            ttl: TtlRegistry::default(),
            validator: Arc::new(DefaultToolValidator),
            circuits,
            limiter: ToolRateLimiter::new(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn ResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_ttl_registry(mut self, ttl: TtlRegistry) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_validator(mut self, validator: Arc<dyn ToolValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn circuits(&self) -> &CircuitRegistry {
        &self.circuits
    }

    pub fn cache(&self) -> Option<&Arc<dyn ResultCache>> {
        self.cache.as_ref()
    }

    /// Execute a batch. Never fails as a whole: every call gets a result.
    pub async fn execute(&self, calls: &[ToolCall], scope: CallScope<'_>) -> BatchOutcome {
        self.execute_bounded(calls, scope, self.config.max_parallel).await
    }

    /// Like [`execute`](Self::execute), but at most one call is in flight.
    /// Calls start in submission order.
    pub async fn execute_sequential(
        &self,
        calls: &[ToolCall],
        scope: CallScope<'_>,
    ) -> BatchOutcome {
        self.execute_bounded(calls, scope, 1).await
    }

    async fn execute_bounded(
        &self,
        calls: &[ToolCall],
        scope: CallScope<'_>,
        max_parallel: usize,
    ) -> BatchOutcome {
        let mut slots: Vec<Option<ToolCallResult>> = (0..calls.len()).map(|_| None).collect();
        let mut order = Vec::with_capacity(calls.len());
        let batch_cancel = scope.cancel.child_token();
        let inner = CallScope {
            cancel: &batch_cancel,
            ..scope
        };

        let (levels, invalid) = dependency_levels(calls);
        for (i, reason) in invalid {
            slots[i] = Some(ToolCallResult::failure(
                calls[i].clone(),
                ToolError::invalid_argument(reason),
                Duration::ZERO,
                self.clock.now_millis(),
            ));
            order.push(i);
        }

        let run = self.run_levels(calls, &levels, &mut slots, &mut order, inner, max_parallel);
        let timed_out = match self.config.batch_timeout {
            Some(limit) => tokio::time::timeout(limit, run).await.is_err(),
            None => {
                run.await;
                false
            }
        };
        if timed_out {
            batch_cancel.cancel();
            warn!(calls = calls.len(), "Tool batch timed out");
        }

        let limit = self.config.batch_timeout.unwrap_or_default();
        let now = self.clock.now_millis();
        let results = slots
            .into_iter()
            .enumerate()
            .map(|(i, slot)| {
                slot.unwrap_or_else(|| {
                    order.push(i);
                    ToolCallResult::failure(
                        calls[i].clone(),
                        ToolError::timeout(calls[i].label(), limit),
                        limit,
                        now,
                    )
                })
            })
            .collect();
        BatchOutcome {
            results,
            completion_order: order,
        }
    }

    async fn run_levels(
        &self,
        calls: &[ToolCall],
        levels: &[Vec<usize>],
        slots: &mut [Option<ToolCallResult>],
        order: &mut Vec<usize>,
        scope: CallScope<'_>,
        max_parallel: usize,
    ) {
        let permits = Semaphore::new(max_parallel.max(1));

        for level in levels {
            let mut ready = Vec::with_capacity(level.len());
            for &i in level {
                match bind_dependency(&calls[i], slots) {
                    Ok(call) => ready.push((i, call)),
                    Err(error) => {
                        slots[i] = Some(ToolCallResult::failure(
                            calls[i].clone(),
                            error,
                            Duration::ZERO,
                            self.clock.now_millis(),
                        ));
                        order.push(i);
                    }
                }
            }

            let mut pending: FuturesUnordered<_> = ready
                .into_iter()
                .map(|(i, call)| {
                    let permits = &permits;
                    async move {
                        let _permit = permits.acquire().await;
                        (i, self.execute_one(&call, scope).await)
                    }
                })
                .collect();

            while let Some((i, result)) = pending.next().await {
                slots[i] = Some(result);
                order.push(i);
            }
        }
    }

    /// Execute a single call through the full pipeline.
    pub async fn execute_one(&self, call: &ToolCall, scope: CallScope<'_>) -> ToolCallResult {
        let start = tokio::time::Instant::now().into_std();
        scope.observer.on_tool_call(call);
        let outcome = self.dispatch(call, scope).await;
        let completed_at = self.clock.now_millis();
        let result = match outcome {
            Ok((value, source)) => ToolCallResult::success(
                call.clone(),
                value,
                elapsed_since(start),
                source,
                completed_at,
            ),
            Err(error) => {
                debug!(
                    tool = %call.tool_id,
                    operation = %call.operation,
                    code = %error.code,
                    "Tool call failed"
                );
                ToolCallResult::failure(call.clone(), error, elapsed_since(start), completed_at)
            }
        };
        scope.observer.on_tool_result(&result);
        result
    }

    async fn dispatch(
        &self,
        call: &ToolCall,
        scope: CallScope<'_>,
    ) -> Result<(Value, ResultSource), ToolError> {
        if scope.cancel.is_cancelled() {
            return Err(ToolError::cancelled());
        }
        let backend = self
            .tools
            .get(&call.tool_id)
            .ok_or_else(|| ToolError::unknown_tool(&call.tool_id))?;
        self.validator.validate(call, backend.definition())?;

        let cache_key = self.cache_key(call, scope);
        if let (Some(cache), Some(key)) = (&self.cache, &cache_key)
            && let Some(hit) = cache.get(key).await
        {
            debug!(tool = %call.tool_id, key = %key.short(), source = ?hit.source, "Cache hit");
            scope.observer.on_cache_hit(call, hit.source);
            return Ok((hit.value, hit.source));
        }

        let permit = self
            .circuits
            .admit(&call.tool_id)
            .map_err(|retry_after| ToolError::circuit_open(&call.tool_id, retry_after))?;

        let outcome = self.invoke_guarded(backend.as_ref(), call, scope).await;

        permit.finish(match &outcome {
            Ok(_) => CallVerdict::Success,
            Err(e) if e.counts_against_backend() => CallVerdict::Failure,
            Err(_) => CallVerdict::Abandoned,
        });

        let value = outcome?;
        if let (Some(cache), Some(key)) = (&self.cache, cache_key) {
            let ttl = self.ttl_for(call, &value, scope);
            if !cache.put(key, value.clone(), ttl).await {
                debug!(tool = %call.tool_id, "Result not cached (ttl 0)");
            }
        }
        Ok((value, ResultSource::Backend))
    }

    /// Rate limit, governor, then the backend itself under timeout and cancellation.
    async fn invoke_guarded(
        &self,
        backend: &dyn ToolBackend,
        call: &ToolCall,
        scope: CallScope<'_>,
    ) -> Result<Value, ToolError> {
        self.limiter
            .acquire(&call.tool_id, self.config.rate_limit_for(&call.tool_id), scope.cancel)
            .await?;

        self.governor
            .acquire(ResourceKind::ToolCalls, 1, scope.cancel)
            .await
            .map_err(|e| e.to_tool_error())?;

        let invoke = backend.invoke(&call.operation, &call.parameters, scope.cancel);
        let timed = async {
            match self.config.call_timeout {
                Some(limit) => tokio::time::timeout(limit, invoke)
                    .await
                    .unwrap_or_else(|_| Err(ToolError::timeout(call.label(), limit))),
                None => invoke.await,
            }
        };
        tokio::select! {
            biased;
            _ = scope.cancel.cancelled() => Err(ToolError::cancelled()),
            result = timed => result,
        }
    }

    fn cache_key(&self, call: &ToolCall, scope: CallScope<'_>) -> Option<CacheKey> {
        if !self.config.cache.enabled || self.cache.is_none() {
            return None;
        }
        if scope
            .ttl_hints
            .and_then(|h| h.get("no_cache"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
        {
            return None;
        }
        Some(CacheKey::for_call(call, scope.tenant))
    }

    fn ttl_for(&self, call: &ToolCall, value: &Value, scope: CallScope<'_>) -> u64 {
        let mut ctx = self.config.cache.ttl.clone();
        if let Some(hints) = scope.ttl_hints {
            ctx.call_site.extend(hints.clone());
        }
        let strategy = self.config.cache.strategy_for(&call.tool_id);
        let ttl = self.ttl.compute(strategy, value, call, &ctx);
        debug!(tool = %call.tool_id, ttl_secs = ttl, "Computed result TTL");
        ttl
    }
}

/// Group call indices into levels: a call runs one level after its dependency.
///
/// Calls whose dependency does not point to an earlier call are returned
/// separately and belong to no level.
fn dependency_levels(calls: &[ToolCall]) -> (Vec<Vec<usize>>, Vec<(usize, String)>) {
    let mut depth = vec![Some(0usize); calls.len()];
    let mut invalid = Vec::new();
    for (i, call) in calls.iter().enumerate() {
        if let Some(dep) = &call.depends_on {
            if dep.index >= i {
                invalid.push((
                    i,
                    format!(
                        "call {} depends on call {}, which is not an earlier call",
                        i, dep.index
                    ),
                ));
                depth[i] = None;
            } else {
                depth[i] = Some(depth[dep.index].unwrap_or(0) + 1);
            }
        }
    }
    let max_depth = depth.iter().flatten().copied().max().unwrap_or(0);
    let mut levels = vec![Vec::new(); max_depth + 1];
    for (i, d) in depth.into_iter().enumerate() {
        if let Some(d) = d {
            levels[d].push(i);
        }
    }
    (levels, invalid)
}

/// Inject the dependency's result into the call, or fail it if the
/// dependency did not succeed.
fn bind_dependency(
    call: &ToolCall,
    slots: &[Option<ToolCallResult>],
) -> Result<ToolCall, ToolError> {
    let Some(dep) = &call.depends_on else {
        return Ok(call.clone());
    };
    match slots.get(dep.index).and_then(Option::as_ref) {
        Some(result) => match &result.outcome {
            Ok(value) => {
                let mut bound = call.clone();
                bound.parameters.insert(dep.bind_as.clone(), value.clone());
                Ok(bound)
            }
            Err(e) => Err(ToolError::dependency_failed(dep.index, e.message.clone())),
        },
        None => Err(ToolError::dependency_failed(dep.index, "dependency did not run")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GovernorConfig, RateLimitConfig};
    use crate::ports::result_cache::CacheHit;
    use async_trait::async_trait;
    use orchestra_domain::cache::CacheStats;
    use orchestra_domain::recovery::ErrorKind;
    use orchestra_domain::tool::{CircuitPolicy, OperationSpec, ToolDefinition, ToolParameter};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    // ==================== Mock Infrastructure ====================

    type Behavior = fn(&Map<String, Value>) -> Result<Value, ToolError>;

    struct MockBackend {
        definition: ToolDefinition,
        behavior: Behavior,
        invocations: AtomicUsize,
    }

    impl MockBackend {
        fn new(tool_id: &str, behavior: Behavior) -> Arc<Self> {
            let op = OperationSpec::new("run", "test operation")
                .with_parameter(ToolParameter::new("q", "query", false))
                .with_parameter(ToolParameter::new("ms", "delay", false).with_type("integer"))
                .with_parameter(ToolParameter::new("input", "bound input", false));
            Arc::new(Self {
                definition: ToolDefinition::new(tool_id, "mock").with_operation(op),
                behavior,
                invocations: AtomicUsize::new(0),
            })
        }

        fn count(&self) -> usize {
            self.invocations.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ToolBackend for MockBackend {
        fn definition(&self) -> &ToolDefinition {
            &self.definition
        }

        async fn invoke(
            &self,
            _operation: &str,
            parameters: &Map<String, Value>,
            _cancel: &CancellationToken,
        ) -> Result<Value, ToolError> {
            self.invocations.fetch_add(1, Ordering::SeqCst);
            if let Some(ms) = parameters.get("ms").and_then(Value::as_u64) {
                tokio::time::sleep(Duration::from_millis(ms)).await;
            }
            (self.behavior)(parameters)
        }
    }

    fn echo(params: &Map<String, Value>) -> Result<Value, ToolError> {
        Ok(json!({ "echo": params.get("q").cloned().unwrap_or(Value::Null),
                   "input": params.get("input").cloned().unwrap_or(Value::Null) }))
    }

    fn fail_on_bad(params: &Map<String, Value>) -> Result<Value, ToolError> {
        if params.get("q").and_then(Value::as_str) == Some("bad") {
            Err(ToolError::execution_failed("backend exploded"))
        } else {
            echo(params)
        }
    }

    fn always_fail(_params: &Map<String, Value>) -> Result<Value, ToolError> {
        Err(ToolError::execution_failed("connection reset"))
    }

    #[derive(Default)]
    struct MapCache {
        entries: Mutex<HashMap<String, Value>>,
    }

    #[async_trait]
    impl ResultCache for MapCache {
        async fn get(&self, key: &CacheKey) -> Option<CacheHit> {
            self.entries
                .lock()
                .unwrap()
                .get(key.as_str())
                .map(|v| CacheHit {
                    value: v.clone(),
                    source: ResultSource::FastCache,
                })
        }

        async fn put(&self, key: CacheKey, value: Value, ttl_secs: u64) -> bool {
            if ttl_secs == 0 {
                return false;
            }
            self.entries
                .lock()
                .unwrap()
                .insert(key.as_str().to_string(), value);
            true
        }

        async fn invalidate(&self, key: &CacheKey) {
            self.entries.lock().unwrap().remove(key.as_str());
        }

        async fn clear(&self) {
            self.entries.lock().unwrap().clear();
        }

        fn stats(&self) -> CacheStats {
            CacheStats::default()
        }
    }

    fn config() -> ExecutionConfig {
        ExecutionConfig {
            rate_limit: RateLimitConfig {
                calls_per_minute: 6_000,
                burst: 100,
                max_wait: Duration::from_secs(1),
            },
            ..Default::default()
        }
    }

    fn executor(backends: Vec<Arc<MockBackend>>, config: ExecutionConfig) -> ToolExecutor {
        let mut tools = ToolRegistry::new();
        for b in backends {
            tools.register(b);
        }
        ToolExecutor::new(
            tools,
            config,
            Arc::new(ResourceGovernor::new(GovernorConfig::default())),
        )
    }

    fn call(tool: &str, q: &str) -> ToolCall {
        ToolCall::new(tool, "run").with_param("q", q)
    }

    // ==================== Batch Semantics ====================

    #[tokio::test]
    async fn test_failure_is_isolated_and_index_aligned() {
        let backend = MockBackend::new("svc", fail_on_bad);
        let exec = executor(vec![backend.clone()], config());
        let cancel = CancellationToken::new();
        let calls = vec![call("svc", "a"), call("svc", "bad"), call("svc", "c")];

        let outcome = exec.execute(&calls, CallScope::new(&cancel)).await;

        assert_eq!(outcome.results.len(), 3);
        assert!(outcome.results[0].is_success());
        assert!(!outcome.results[1].is_success());
        assert!(outcome.results[2].is_success());
        assert_eq!(outcome.results[2].value().unwrap()["echo"], "c");
        assert_eq!(outcome.failures(), 1);
        assert_eq!(backend.count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_results_aligned_despite_completion_order() {
        let backend = MockBackend::new("svc", echo);
        let exec = executor(vec![backend], config());
        let cancel = CancellationToken::new();
        let calls = vec![
            call("svc", "slow").with_param("ms", 300),
            call("svc", "fast").with_param("ms", 10),
        ];

        let outcome = exec.execute(&calls, CallScope::new(&cancel)).await;

        assert_eq!(outcome.completion_order, vec![1, 0]);
        assert_eq!(outcome.results[0].value().unwrap()["echo"], "slow");
        assert_eq!(outcome.results[1].value().unwrap()["echo"], "fast");
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequential_runs_in_submission_order() {
        let backend = MockBackend::new("svc", echo);
        let exec = executor(vec![backend], config());
        let cancel = CancellationToken::new();
        let calls = vec![
            call("svc", "slow").with_param("ms", 300),
            call("svc", "fast").with_param("ms", 10),
        ];

        let outcome = exec.execute_sequential(&calls, CallScope::new(&cancel)).await;

        assert_eq!(outcome.completion_order, vec![0, 1]);
    }

    #[tokio::test]
    async fn test_dependency_result_is_bound() {
        let backend = MockBackend::new("svc", echo);
        let exec = executor(vec![backend], config());
        let cancel = CancellationToken::new();
        let calls = vec![call("svc", "first"), ToolCall::new("svc", "run").depends_on(0)];

        let outcome = exec.execute(&calls, CallScope::new(&cancel)).await;

        assert_eq!(outcome.completion_order, vec![0, 1]);
        let second = outcome.results[1].value().unwrap();
        assert_eq!(second["input"]["echo"], "first");
    }

    #[tokio::test]
    async fn test_failed_dependency_skips_dispatch() {
        let backend = MockBackend::new("svc", fail_on_bad);
        let exec = executor(vec![backend.clone()], config());
        let cancel = CancellationToken::new();
        let calls = vec![call("svc", "bad"), ToolCall::new("svc", "run").depends_on(0)];

        let outcome = exec.execute(&calls, CallScope::new(&cancel)).await;

        let err = outcome.results[1].error().unwrap();
        assert_eq!(err.code, "DEPENDENCY_FAILED");
        assert_eq!(err.kind, ErrorKind::Validation);
        assert_eq!(backend.count(), 1);
    }

    #[tokio::test]
    async fn test_forward_dependency_is_rejected() {
        let backend = MockBackend::new("svc", echo);
        let exec = executor(vec![backend.clone()], config());
        let cancel = CancellationToken::new();
        let calls = vec![call("svc", "a").depends_on(1), call("svc", "b")];

        let outcome = exec.execute(&calls, CallScope::new(&cancel)).await;

        assert_eq!(
            outcome.results[0].error().unwrap().kind,
            ErrorKind::Validation
        );
        assert!(outcome.results[1].is_success());
        assert_eq!(backend.count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_timeout_reports_stragglers() {
        let backend = MockBackend::new("svc", echo);
        let exec = executor(
            vec![backend],
            ExecutionConfig {
                batch_timeout: Some(Duration::from_millis(100)),
                call_timeout: None,
                ..config()
            },
        );
        let cancel = CancellationToken::new();
        let calls = vec![
            call("svc", "quick").with_param("ms", 10),
            call("svc", "stuck").with_param("ms", 10_000),
        ];

        let outcome = exec.execute(&calls, CallScope::new(&cancel)).await;

        assert!(outcome.results[0].is_success());
        let err = outcome.results[1].error().unwrap();
        assert_eq!(err.kind, ErrorKind::Transient);
        assert_eq!(outcome.completion_order, vec![0, 1]);
    }

    // ==================== Single-Call Pipeline ====================

    #[tokio::test]
    async fn test_unknown_tool_is_capability_gap() {
        let exec = executor(vec![], config());
        let cancel = CancellationToken::new();
        let result = exec
            .execute_one(&call("ghost", "x"), CallScope::new(&cancel))
            .await;
        assert_eq!(result.error().unwrap().kind, ErrorKind::CapabilityGap);
    }

    #[tokio::test]
    async fn test_validation_runs_before_dispatch() {
        let backend = MockBackend::new("svc", echo);
        let exec = executor(vec![backend.clone()], config());
        let cancel = CancellationToken::new();
        let result = exec
            .execute_one(
                &ToolCall::new("svc", "run").with_param("nope", 1),
                CallScope::new(&cancel),
            )
            .await;
        assert_eq!(result.error().unwrap().kind, ErrorKind::Validation);
        assert_eq!(backend.count(), 0);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_backend() {
        let backend = MockBackend::new("svc", echo);
        let exec =
            executor(vec![backend.clone()], config()).with_cache(Arc::new(MapCache::default()));
        let cancel = CancellationToken::new();

        let first = exec.execute_one(&call("svc", "x"), CallScope::new(&cancel)).await;
        let second = exec.execute_one(&call("svc", "x"), CallScope::new(&cancel)).await;

        assert_eq!(first.source, ResultSource::Backend);
        assert_eq!(second.source, ResultSource::FastCache);
        assert_eq!(first.value(), second.value());
        assert_eq!(backend.count(), 1);
    }

    #[tokio::test]
    async fn test_no_cache_hint_bypasses_cache() {
        let backend = MockBackend::new("svc", echo);
        let exec =
            executor(vec![backend.clone()], config()).with_cache(Arc::new(MapCache::default()));
        let cancel = CancellationToken::new();
        let mut hints = Map::new();
        hints.insert("no_cache".to_string(), Value::Bool(true));
        let scope = CallScope::new(&cancel).with_ttl_hints(&hints);

        exec.execute_one(&call("svc", "x"), scope).await;
        exec.execute_one(&call("svc", "x"), scope).await;
        assert_eq!(backend.count(), 2);
    }

    #[tokio::test]
    async fn test_tenant_scopes_cache() {
        let backend = MockBackend::new("svc", echo);
        let exec =
            executor(vec![backend.clone()], config()).with_cache(Arc::new(MapCache::default()));
        let cancel = CancellationToken::new();

        exec.execute_one(&call("svc", "x"), CallScope::new(&cancel).with_tenant(Some("a")))
            .await;
        exec.execute_one(&call("svc", "x"), CallScope::new(&cancel).with_tenant(Some("b")))
            .await;
        assert_eq!(backend.count(), 2);
    }

    #[tokio::test]
    async fn test_circuit_short_circuits_after_threshold() {
        let backend = MockBackend::new("flaky", always_fail);
        let exec = executor(
            vec![backend.clone()],
            ExecutionConfig {
                circuit: CircuitPolicy {
                    failure_threshold: 5,
                    cooldown: Duration::from_secs(30),
                },
                ..config()
            },
        );
        let cancel = CancellationToken::new();

        for _ in 0..5 {
            exec.execute_one(&call("flaky", "x"), CallScope::new(&cancel)).await;
        }
        let sixth = exec.execute_one(&call("flaky", "x"), CallScope::new(&cancel)).await;

        assert_eq!(backend.count(), 5);
        let err = sixth.error().unwrap();
        assert_eq!(err.code, "CIRCUIT_OPEN");
        assert_eq!(err.kind, ErrorKind::ResourceExhausted);
    }

    #[tokio::test]
    async fn test_cancelled_scope_dispatches_nothing() {
        let backend = MockBackend::new("svc", echo);
        let exec = executor(vec![backend.clone()], config());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = exec
            .execute(&[call("svc", "a"), call("svc", "b")], CallScope::new(&cancel))
            .await;
        assert!(outcome.results.iter().all(|r| r.error().is_some_and(ToolError::is_cancelled)));
        assert_eq!(backend.count(), 0);
    }
}
