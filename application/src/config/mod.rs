//! Application-level configuration.
//!
//! - [`LoopParams`]: reasoning loop control (iterations, timeout, context size)
//! - [`GovernorConfig`], [`ExecutionConfig`], [`RecoveryConfig`],
//!   [`CollaborationConfig`]: one slice per engine subsystem
//! - [`EngineConfig`]: container for all of the above

pub mod engine_config;
pub mod loop_params;
pub mod subsystems;

pub use engine_config::EngineConfig;
pub use loop_params::LoopParams;
pub use subsystems::{
    CacheConfig, CollaborationConfig, ExecutionConfig, GovernorConfig, RateLimitConfig,
    RecoveryConfig,
};
