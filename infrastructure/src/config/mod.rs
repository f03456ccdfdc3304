//! Configuration file loading for agent-orchestra
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `ORCHESTRA_*` environment variables (`__` separates sections)
//! 2. `--config <path>` specified file
//! 3. Project root: `./orchestra.toml` or `./.orchestra.toml`
//! 4. Global: `$XDG_CONFIG_HOME/agent-orchestra/config.toml`
//! 5. Default values

mod error;
mod file_config;
mod loader;

pub use error::ConfigError;
pub use file_config::{
    FileAgentConfig, FileCacheConfig, FileCircuitBreakerConfig, FileCollaborationConfig,
    FileConfig, FileExecutionConfig, FileGovernorConfig, FileLoggingConfig, FileRateLimitConfig,
    FileRecoveryConfig, FileToolRateLimit,
};
pub use loader::{ConfigLoader, ConfigSource, SourceKind};
