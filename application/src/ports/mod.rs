//! Port definitions (interfaces for external adapters)
//!
//! Ports define the contracts that infrastructure adapters must implement.

pub mod execution_logger;
pub mod execution_observer;
pub mod language_model;
pub mod peer_agent;
pub mod result_cache;
pub mod tool_backend;
