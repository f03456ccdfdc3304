//! Tool execution: registry, protection layers and the batch executor.

pub mod executor;
pub mod protection;
pub mod registry;

pub use executor::{BatchOutcome, CallScope, ToolExecutor};
pub use protection::{CallVerdict, CircuitPermit, CircuitRegistry, ToolRateLimiter};
pub use registry::ToolRegistry;
