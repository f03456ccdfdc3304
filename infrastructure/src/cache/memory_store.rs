//! In-process slow-tier store

use async_trait::async_trait;
use dashmap::DashMap;
use orchestra_application::{CacheStore, StoreError};
use orchestra_domain::{CacheEntry, CacheKey, Clock, SystemClock};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

/// How often a write sweeps out expired entries
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Map of cache entries, used as the slow tier when no external store is
/// configured.
///
/// An expired entry is dropped when it is read, and a write sweeps the whole
/// map once the sweep interval has passed, so dead entries never outlive an
/// interval plus their TTL.
#[derive(Debug)]
pub struct MemoryStore {
    entries: DashMap<CacheKey, CacheEntry>,
    clock: Arc<dyn Clock>,
    sweep_interval_ms: u64,
    next_sweep_ms: AtomicU64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
            sweep_interval_ms: DEFAULT_SWEEP_INTERVAL.as_millis() as u64,
            next_sweep_ms: AtomicU64::new(0),
        }
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now_millis();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.entries.len())
    }

    /// Purge when the sweep is due; one writer wins the race to do it
    fn sweep_if_due(&self) {
        let now = self.clock.now_millis();
        let due = self.next_sweep_ms.load(Ordering::Relaxed);
        if now < due {
            return;
        }
        let next = now.saturating_add(self.sweep_interval_ms);
        if self
            .next_sweep_ms
            .compare_exchange(due, next, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
        {
            let removed = self.purge_expired();
            if removed > 0 {
                debug!(removed, remaining = self.entries.len(), "Swept expired cache entries");
            }
        }
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn load(&self, key: &CacheKey) -> Result<Option<CacheEntry>, StoreError> {
        let now = self.clock.now_millis();
        // remove_if keeps the expiry check and the removal atomic
        if self
            .entries
            .remove_if(key, |_, entry| entry.is_expired(now))
            .is_some()
        {
            return Ok(None);
        }
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn save(&self, entry: CacheEntry) -> Result<(), StoreError> {
        self.entries.insert(entry.key.clone(), entry);
        self.sweep_if_due();
        Ok(())
    }

    async fn remove(&self, key: &CacheKey) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.entries.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestra_domain::{ManualClock, ToolCall};
    use serde_json::json;
    use std::time::Duration;

    fn key(name: &str) -> CacheKey {
        CacheKey::for_call(&ToolCall::new(name, "get"), None)
    }

    #[tokio::test]
    async fn test_expired_entries_are_not_loaded() {
        let clock = Arc::new(ManualClock::new(0));
        let store = MemoryStore::with_clock(clock.clone());
        store
            .save(CacheEntry::new(key("a"), json!(1), 0, 10))
            .await
            .unwrap();

        assert!(store.load(&key("a")).await.unwrap().is_some());
        clock.advance(Duration::from_secs(11));
        assert!(store.load(&key("a")).await.unwrap().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_writes_sweep_out_dead_entries() {
        let clock = Arc::new(ManualClock::new(0));
        let store = MemoryStore::with_clock(clock.clone());
        for i in 0..10_000 {
            store
                .save(CacheEntry::new(key(&format!("t{}", i)), json!(i), 0, 1))
                .await
                .unwrap();
        }
        assert_eq!(store.len(), 10_000);

        clock.advance(Duration::from_secs(3_600));
        store
            .save(CacheEntry::new(key("fresh"), json!("x"), clock.now_millis(), 60))
            .await
            .unwrap();
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_sweep_waits_for_interval() {
        let clock = Arc::new(ManualClock::new(0));
        let store = MemoryStore::with_clock(clock.clone())
            .with_sweep_interval(Duration::from_secs(60));
        store
            .save(CacheEntry::new(key("a"), json!(1), 0, 1))
            .await
            .unwrap();

        clock.advance(Duration::from_secs(30));
        store
            .save(CacheEntry::new(key("b"), json!(2), 30_000, 60))
            .await
            .unwrap();
        assert_eq!(store.len(), 2);

        clock.advance(Duration::from_secs(30));
        store
            .save(CacheEntry::new(key("c"), json!(3), 60_000, 60))
            .await
            .unwrap();
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let clock = Arc::new(ManualClock::new(0));
        let store = MemoryStore::with_clock(clock.clone());
        store
            .save(CacheEntry::new(key("short"), json!(1), 0, 1))
            .await
            .unwrap();
        store
            .save(CacheEntry::new(key("long"), json!(2), 0, 60))
            .await
            .unwrap();

        clock.advance(Duration::from_secs(5));
        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.len(), 1);
    }
}
