//! Application layer for agent-orchestra
//!
//! This crate contains the engine subsystems, the ports they talk through
//! and the reasoning loop use case. It depends only on the domain layer.
//!
//! | Module | Role |
//! |--------|------|
//! | [`governor`] | Concurrency, rate, memory and time budgets |
//! | [`execution`] | Batched tool calls with caching, rate limits and circuit breakers |
//! | [`recovery`] | Strategy chains for failed calls |
//! | [`collaboration`] | Delegation, review, consensus and conflict resolution |
//! | [`use_cases`] | The reasoning loop |
//! | [`context`] | Owns all of the above for one engine lifetime |

pub mod collaboration;
pub mod config;
pub mod context;
pub mod execution;
pub mod governor;
pub mod ports;
pub mod recovery;
pub mod use_cases;

// Re-export commonly used types
pub use collaboration::{CollaborationEngine, CollaborationError, PeerRegistry};
pub use config::{
    CacheConfig, CollaborationConfig, EngineConfig, ExecutionConfig, GovernorConfig, LoopParams,
    RateLimitConfig, RecoveryConfig,
};
pub use context::EngineContext;
pub use execution::{BatchOutcome, CallScope, ToolExecutor, ToolRegistry};
pub use governor::{GovernorError, ResourceGovernor};
pub use ports::{
    execution_logger::{ExecutionEvent, ExecutionLogger, NoExecutionLogger},
    execution_observer::{ExecutionObserver, NoObserver},
    language_model::{GatewayError, LanguageModel, StreamHandle},
    peer_agent::{PeerAgent, PeerError},
    result_cache::{CacheHit, CacheStore, ResultCache, StoreError},
    tool_backend::ToolBackend,
};
pub use recovery::{RecoveryEngine, RecoveryFailure};
pub use use_cases::run_agent::{
    LocalPeerAgent, RunAgentError, RunAgentOutput, RunAgentUseCase, RunOptions,
};
