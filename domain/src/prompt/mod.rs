//! Prompt domain
//!
//! Templates for the reasoning loop and for collaboration between agents.

pub mod agent;
mod template;

pub use agent::AgentPromptTemplate;
pub use template::PromptTemplate;
