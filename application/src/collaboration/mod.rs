//! Collaboration & consensus between agents.

pub mod engine;
pub mod registry;

pub use engine::{CollaborationEngine, CollaborationError};
pub use registry::PeerRegistry;
