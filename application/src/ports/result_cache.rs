//! Result cache ports
//!
//! [`ResultCache`] is what the tool executor talks to. [`CacheStore`] is the
//! optional persistent store that can back the slow tier.

use async_trait::async_trait;
use orchestra_domain::cache::{CacheEntry, CacheKey, CacheStats};
use orchestra_domain::tool::ResultSource;
use serde_json::Value;

/// A cache hit and the tier that served it
#[derive(Debug, Clone, PartialEq)]
pub struct CacheHit {
    pub value: Value,
    pub source: ResultSource,
}

/// Two-tier cache of tool results
#[async_trait]
pub trait ResultCache: Send + Sync {
    /// Fast tier first, then slow tier. Expired entries are never returned.
    async fn get(&self, key: &CacheKey) -> Option<CacheHit>;

    /// Write both tiers. A zero TTL is not stored and returns `false`.
    async fn put(&self, key: CacheKey, value: Value, ttl_secs: u64) -> bool;

    async fn invalidate(&self, key: &CacheKey);

    async fn clear(&self);

    fn stats(&self) -> CacheStats;
}

/// Errors from a persistent cache store
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),
}

/// Backing store for the slow tier
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn load(&self, key: &CacheKey) -> Result<Option<CacheEntry>, StoreError>;

    async fn save(&self, entry: CacheEntry) -> Result<(), StoreError>;

    async fn remove(&self, key: &CacheKey) -> Result<(), StoreError>;

    async fn clear(&self) -> Result<(), StoreError>;
}
