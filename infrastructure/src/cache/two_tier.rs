//! Two-tier tool result cache
//!
//! The fast tier is a capacity-bounded moka cache evicting by recency. The
//! slow tier is any [`CacheStore`]; by default an in-process [`MemoryStore`].
//! Both tiers hold the full [`CacheEntry`] and expiry is always checked
//! against the injected clock, so neither tier can serve a stale result.

use super::memory_store::MemoryStore;
use async_trait::async_trait;
use moka::future::Cache;
use orchestra_application::{CacheHit, CacheStore, ResultCache};
use orchestra_domain::tool::ResultSource;
use orchestra_domain::{CacheEntry, CacheKey, CacheStats, Clock, SystemClock};
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct Counters {
    fast_hits: AtomicU64,
    slow_hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    skipped_writes: AtomicU64,
}

pub struct TwoTierCache {
    fast: Cache<CacheKey, CacheEntry>,
    slow: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
    counters: Counters,
}

impl TwoTierCache {
    /// Fast tier of `fast_capacity` entries over an in-process slow tier
    pub fn new(fast_capacity: u64) -> Self {
        Self::with_store(fast_capacity, Arc::new(MemoryStore::new()))
    }

    pub fn with_store(fast_capacity: u64, slow: Arc<dyn CacheStore>) -> Self {
        Self {
            fast: Cache::builder().max_capacity(fast_capacity).build(),
            slow,
            clock: Arc::new(SystemClock),
            counters: Counters::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn miss(&self, key: &CacheKey) -> Option<CacheHit> {
        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        debug!(key = key.short(), "Cache MISS");
        None
    }
}

#[async_trait]
impl ResultCache for TwoTierCache {
    async fn get(&self, key: &CacheKey) -> Option<CacheHit> {
        let now = self.clock.now_millis();

        if let Some(entry) = self.fast.get(key).await {
            if !entry.is_expired(now) {
                self.counters.fast_hits.fetch_add(1, Ordering::Relaxed);
                debug!(key = key.short(), "Cache HIT (fast)");
                return Some(CacheHit {
                    value: entry.value,
                    source: ResultSource::FastCache,
                });
            }
            self.fast.invalidate(key).await;
        }

        let entry = match self.slow.load(key).await {
            Ok(Some(entry)) if !entry.is_expired(now) => entry,
            Ok(_) => return self.miss(key),
            Err(e) => {
                warn!(key = key.short(), error = %e, "Slow cache tier read failed");
                return self.miss(key);
            }
        };

        self.counters.slow_hits.fetch_add(1, Ordering::Relaxed);
        debug!(key = key.short(), "Cache HIT (slow), promoting");
        let value = entry.value.clone();
        self.fast.insert(key.clone(), entry).await;
        Some(CacheHit {
            value,
            source: ResultSource::SlowCache,
        })
    }

    async fn put(&self, key: CacheKey, value: Value, ttl_secs: u64) -> bool {
        if ttl_secs == 0 {
            self.counters.skipped_writes.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        let entry = CacheEntry::new(key.clone(), value, self.clock.now_millis(), ttl_secs);
        if let Err(e) = self.slow.save(entry.clone()).await {
            warn!(key = key.short(), error = %e, "Slow cache tier write failed");
        }
        self.fast.insert(key, entry).await;
        self.counters.writes.fetch_add(1, Ordering::Relaxed);
        true
    }

    async fn invalidate(&self, key: &CacheKey) {
        self.fast.invalidate(key).await;
        if let Err(e) = self.slow.remove(key).await {
            warn!(key = key.short(), error = %e, "Slow cache tier remove failed");
        }
    }

    async fn clear(&self) {
        self.fast.invalidate_all();
        if let Err(e) = self.slow.clear().await {
            warn!(error = %e, "Slow cache tier clear failed");
        }
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            fast_entries: self.fast.entry_count(),
            fast_hits: self.counters.fast_hits.load(Ordering::Relaxed),
            slow_hits: self.counters.slow_hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            writes: self.counters.writes.load(Ordering::Relaxed),
            skipped_writes: self.counters.skipped_writes.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestra_application::StoreError;
    use orchestra_domain::{ManualClock, ToolCall};
    use serde_json::json;
    use std::time::Duration;

    fn key(name: &str) -> CacheKey {
        CacheKey::for_call(&ToolCall::new(name, "get"), Some("tenant"))
    }

    fn cache(clock: Arc<ManualClock>, slow: Arc<dyn CacheStore>) -> TwoTierCache {
        TwoTierCache::with_store(16, slow).with_clock(clock)
    }

    // ==================== Mock Infrastructure ====================

    struct BrokenStore;

    #[async_trait]
    impl CacheStore for BrokenStore {
        async fn load(&self, _key: &CacheKey) -> Result<Option<CacheEntry>, StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
        async fn save(&self, _entry: CacheEntry) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
        async fn remove(&self, _key: &CacheKey) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
        async fn clear(&self) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
    }

    // ==================== Tests ====================

    #[tokio::test]
    async fn test_put_then_fast_hit() {
        let clock = Arc::new(ManualClock::new(1_000));
        let cache = cache(clock, Arc::new(MemoryStore::new()));

        assert!(cache.put(key("a"), json!({"n": 1}), 60).await);
        let hit = cache.get(&key("a")).await.unwrap();
        assert_eq!(hit.source, ResultSource::FastCache);
        assert_eq!(hit.value, json!({"n": 1}));
    }

    #[tokio::test]
    async fn test_slow_hit_repopulates_fast_tier() {
        let clock = Arc::new(ManualClock::new(1_000));
        let store = Arc::new(MemoryStore::with_clock(clock.clone()));
        store
            .save(CacheEntry::new(key("a"), json!("slow"), 1_000, 60))
            .await
            .unwrap();
        let cache = cache(clock, store);

        let first = cache.get(&key("a")).await.unwrap();
        assert_eq!(first.source, ResultSource::SlowCache);
        let second = cache.get(&key("a")).await.unwrap();
        assert_eq!(second.source, ResultSource::FastCache);

        let stats = cache.stats();
        assert_eq!(stats.slow_hits, 1);
        assert_eq!(stats.fast_hits, 1);
    }

    #[tokio::test]
    async fn test_expired_entry_is_never_returned() {
        let clock = Arc::new(ManualClock::new(0));
        let store = Arc::new(MemoryStore::with_clock(clock.clone()));
        let cache = cache(clock.clone(), store);

        cache.put(key("a"), json!(1), 5).await;
        clock.advance(Duration::from_secs(5));
        assert!(cache.get(&key("a")).await.is_some());
        clock.advance(Duration::from_millis(1));
        assert!(cache.get(&key("a")).await.is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[tokio::test]
    async fn test_zero_ttl_is_not_stored() {
        let clock = Arc::new(ManualClock::new(0));
        let cache = cache(clock, Arc::new(MemoryStore::new()));

        assert!(!cache.put(key("a"), json!(1), 0).await);
        assert!(cache.get(&key("a")).await.is_none());
        let stats = cache.stats();
        assert_eq!(stats.skipped_writes, 1);
        assert_eq!(stats.writes, 0);
    }

    #[tokio::test]
    async fn test_invalidate_and_clear_reach_both_tiers() {
        let clock = Arc::new(ManualClock::new(0));
        let store = Arc::new(MemoryStore::with_clock(clock.clone()));
        let cache = cache(clock, store.clone());

        cache.put(key("a"), json!(1), 60).await;
        cache.put(key("b"), json!(2), 60).await;
        cache.invalidate(&key("a")).await;
        assert!(cache.get(&key("a")).await.is_none());
        assert_eq!(store.len(), 1);

        cache.clear().await;
        assert!(cache.get(&key("b")).await.is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_broken_slow_tier_degrades_to_fast_only() {
        let clock = Arc::new(ManualClock::new(0));
        let cache = cache(clock, Arc::new(BrokenStore));

        assert!(cache.put(key("a"), json!(1), 60).await);
        assert_eq!(
            cache.get(&key("a")).await.map(|h| h.source),
            Some(ResultSource::FastCache)
        );
        assert!(cache.get(&key("b")).await.is_none());
    }
}
