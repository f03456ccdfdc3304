//! Engine wiring
//!
//! [`EngineBuilder`] turns a loaded [`FileConfig`] into a ready
//! [`EngineContext`]: governor, executor with the two-tier cache, recovery
//! with the configured planners, collaboration with its peers, and the
//! reasoning loop, all sharing one transcript logger.

use crate::cache::TwoTierCache;
use crate::config::FileConfig;
use crate::logging::JsonlExecutionLogger;
use orchestra_application::{
    CacheStore, CollaborationEngine, EngineConfig, EngineContext, ExecutionLogger,
    ExecutionObserver, LanguageModel, LocalPeerAgent, NoExecutionLogger, NoObserver, PeerAgent,
    PeerRegistry, RecoveryEngine, ResourceGovernor, RunAgentUseCase, ToolBackend, ToolExecutor,
    ToolRegistry,
};
use orchestra_domain::recovery::StrategyRegistry;
use orchestra_domain::{AgentProfile, ConfigIssue, Severity, TtlRegistry};
use std::sync::Arc;
use tracing::{info, warn};

pub struct EngineBuilder {
    config: EngineConfig,
    planners: StrategyRegistry,
    fast_capacity: u64,
    store: Option<Arc<dyn CacheStore>>,
    ttl: TtlRegistry,
    tools: ToolRegistry,
    peers: PeerRegistry,
    local_peers: Vec<(AgentProfile, Arc<dyn LanguageModel>)>,
    logger: Arc<dyn ExecutionLogger>,
    observer: Arc<dyn ExecutionObserver>,
}

impl EngineBuilder {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            planners: StrategyRegistry::default(),
            fast_capacity: 1_000,
            store: None,
            ttl: TtlRegistry::default(),
            tools: ToolRegistry::new(),
            peers: PeerRegistry::new(),
            local_peers: Vec::new(),
            logger: Arc::new(NoExecutionLogger),
            observer: Arc::new(NoObserver),
        }
    }

    /// Builder for a loaded file configuration.
    ///
    /// Configuration warnings are logged; the transcript logger is opened when
    /// `[logging] transcript_path` is set.
    pub fn from_file_config(file: &FileConfig) -> Self {
        for issue in file.validate() {
            warn!("config {}", issue);
        }
        let (planners, _) = file.recovery.planners();
        let mut builder = Self::new(file.to_engine_config())
            .with_planners(planners)
            .with_fast_capacity(file.execution.cache.fast_capacity);

        if let Some(path) = &file.logging.transcript_path {
            match JsonlExecutionLogger::new(path) {
                Some(logger) => {
                    info!(path = %path.display(), "Writing execution transcript");
                    builder = builder.with_logger(Arc::new(logger));
                }
                None => warn!(path = %path.display(), "Execution transcript disabled"),
            }
        }
        builder
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Errors in the assembled configuration; empty when it can be built
    pub fn errors(&self) -> Vec<ConfigIssue> {
        self.config
            .validate()
            .into_iter()
            .filter(|i| i.severity == Severity::Error)
            .collect()
    }

    pub fn with_planners(mut self, planners: StrategyRegistry) -> Self {
        self.planners = planners;
        self
    }

    pub fn with_fast_capacity(mut self, capacity: u64) -> Self {
        self.fast_capacity = capacity;
        self
    }

    /// Slow cache tier; in-process when not set
    pub fn with_store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_ttl_registry(mut self, ttl: TtlRegistry) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_tool(mut self, tool: Arc<dyn ToolBackend>) -> Self {
        self.tools.register(tool);
        self
    }

    pub fn with_peer(mut self, peer: Arc<dyn PeerAgent>) -> Self {
        self.peers.register(peer);
        self
    }

    /// A peer running its own reasoning loop in this process.
    ///
    /// It shares the tools, cache and governor of the engine but recovers
    /// without delegation, so delegated work cannot bounce back.
    pub fn with_local_peer(mut self, profile: AgentProfile, model: Arc<dyn LanguageModel>) -> Self {
        self.local_peers.push((profile, model));
        self
    }

    pub fn with_logger(mut self, logger: Arc<dyn ExecutionLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Receives consensus results from the collaboration engine
    pub fn with_observer(mut self, observer: Arc<dyn ExecutionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn build(self, model: Arc<dyn LanguageModel>) -> EngineContext {
        let config = self.config;
        let governor = Arc::new(ResourceGovernor::new(config.governor.clone()));

        let mut executor = ToolExecutor::new(self.tools, config.execution.clone(), governor.clone())
            .with_ttl_registry(self.ttl);
        if config.execution.cache.enabled {
            let cache = match self.store {
                Some(store) => TwoTierCache::with_store(self.fast_capacity, store),
                None => TwoTierCache::new(self.fast_capacity),
            };
            executor = executor.with_cache(Arc::new(cache));
        }
        let executor = Arc::new(executor);

        let mut peers = self.peers;
        for (profile, peer_model) in self.local_peers {
            let peer_recovery = Arc::new(
                RecoveryEngine::new(config.recovery.clone())
                    .with_planners(self.planners.clone())
                    .with_logger(self.logger.clone()),
            );
            let loop_ = RunAgentUseCase::new(
                peer_model,
                executor.clone(),
                peer_recovery,
                governor.clone(),
                config.agent.clone(),
            )
            .with_logger(self.logger.clone());
            peers.register(Arc::new(LocalPeerAgent::new(profile, Arc::new(loop_))));
        }
        let peer_count = peers.len();

        let collaboration = Arc::new(
            CollaborationEngine::new(config.collaboration.clone(), peers)
                .with_observer(self.observer)
                .with_logger(self.logger.clone()),
        );
        let recovery = Arc::new(
            RecoveryEngine::new(config.recovery.clone())
                .with_planners(self.planners)
                .with_collaboration(collaboration.clone())
                .with_logger(self.logger.clone()),
        );
        let agent = Arc::new(
            RunAgentUseCase::new(
                model,
                executor.clone(),
                recovery.clone(),
                governor.clone(),
                config.agent.clone(),
            )
            .with_logger(self.logger),
        );

        info!(
            tools = executor.tools().len(),
            peers = peer_count,
            cache = config.execution.cache.enabled,
            "Engine ready"
        );
        EngineContext::new(governor, executor, recovery, collaboration, agent)
    }
}
