//! Tool result cache adapters

mod memory_store;
mod two_tier;

pub use memory_store::MemoryStore;
pub use two_tier::TwoTierCache;
