//! Infrastructure layer for agent-orchestra
//!
//! This crate contains adapters that implement the ports defined in the
//! application layer (result cache tiers, transcript logger, replay model,
//! built-in tools), configuration file loading, and the builder that wires
//! them into an engine.

pub mod builder;
pub mod cache;
pub mod config;
pub mod logging;
pub mod providers;
pub mod tools;

// Re-export commonly used types
pub use builder::EngineBuilder;
pub use cache::{MemoryStore, TwoTierCache};
pub use config::{ConfigError, ConfigLoader, ConfigSource, FileConfig, SourceKind};
pub use logging::JsonlExecutionLogger;
pub use providers::{ScriptError, ScriptedModel};
pub use tools::{EchoTool, FileTool};
