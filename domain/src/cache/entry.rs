use super::key::CacheKey;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A cached tool result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub value: Value,
    /// Epoch millis
    pub inserted_at: u64,
    /// Zero means the entry must never be served
    pub ttl_secs: u64,
}

impl CacheEntry {
    pub fn new(key: CacheKey, value: Value, inserted_at: u64, ttl_secs: u64) -> Self {
        Self {
            key,
            value,
            inserted_at,
            ttl_secs,
        }
    }

    pub fn expires_at(&self) -> u64 {
        self.inserted_at.saturating_add(self.ttl_secs.saturating_mul(1000))
    }

    /// An entry is stale once `now > inserted_at + ttl`; a zero TTL is always stale.
    pub fn is_expired(&self, now: u64) -> bool {
        self.ttl_secs == 0 || now > self.expires_at()
    }

    pub fn remaining_ms(&self, now: u64) -> u64 {
        self.expires_at().saturating_sub(now)
    }
}

/// Counters for one cache
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub fast_entries: u64,
    pub fast_hits: u64,
    pub slow_hits: u64,
    pub misses: u64,
    pub writes: u64,
    /// Writes dropped because their TTL was zero
    pub skipped_writes: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let hits = self.fast_hits + self.slow_hits;
        let total = hits + self.misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}
