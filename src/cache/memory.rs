use std::num::NonZeroUsize;
use std::sync::Mutex;

use async_trait::async_trait;
use lru::LruCache;
use serde_json::Value as JsonValue;

use super::{CacheStats, CacheStore};
use crate::error::CoreResult;
use crate::types::CacheEntry;

/// In-memory LRU cache back-end (spec §9 `in-memory-flat` variant). Eviction
/// is delegated entirely to the `lru` crate's fixed-capacity ring; no TTL
/// sweep runs proactively — expiry is checked lazily on `get`, matching the
/// "correctness never depends on persistence" contract.
pub struct MemoryCache {
    entries: Mutex<LruCache<String, CacheEntry>>,
    evictions: std::sync::atomic::AtomicU64,
}

impl MemoryCache {
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).expect("capacity must be nonzero");
        Self {
            entries: Mutex::new(LruCache::new(cap)),
            evictions: std::sync::atomic::AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn raw_get(&self, key: &str) -> CoreResult<Option<JsonValue>> {
        let mut guard = self.entries.lock().unwrap();
        let expired = matches!(guard.peek(key), Some(e) if e.is_expired());
        if expired {
            guard.pop(key);
            return Ok(None);
        }
        match guard.get_mut(key) {
            Some(entry) => {
                entry.touch();
                Ok(Some(entry.payload.clone()))
            }
            None => Ok(None),
        }
    }

    async fn raw_set(&self, key: &str, value: JsonValue, ttl_secs: u64) -> CoreResult<()> {
        let mut guard = self.entries.lock().unwrap();
        if guard.len() == guard.cap().get() && !guard.contains(key) {
            self.evictions.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        }
        guard.put(key.to_string(), CacheEntry::new(value, ttl_secs));
        Ok(())
    }

    async fn raw_invalidate(&self, prefix: &str) -> CoreResult<u64> {
        let mut guard = self.entries.lock().unwrap();
        let matching: Vec<String> = guard
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &matching {
            guard.pop(key);
        }
        Ok(matching.len() as u64)
    }

    async fn raw_clear(&self) -> CoreResult<()> {
        self.entries.lock().unwrap().clear();
        Ok(())
    }

    async fn raw_stats(&self) -> CoreResult<CacheStats> {
        let guard = self.entries.lock().unwrap();
        let memory_bytes: u64 = guard
            .iter()
            .map(|(k, v)| (k.len() + v.payload.to_string().len()) as u64)
            .sum();
        Ok(CacheStats {
            hits: 0,
            misses: 0,
            keys: guard.len() as u64,
            memory_bytes,
            evictions: self.evictions.load(std::sync::atomic::Ordering::Relaxed),
        })
    }

    async fn raw_health_check(&self) -> CoreResult<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let cache = MemoryCache::new(10);
        cache.raw_set("content:1", json!({"a": 1}), 60).await.unwrap();
        let got = cache.raw_get("content:1").await.unwrap();
        assert_eq!(got, Some(json!({"a": 1})));
    }

    #[tokio::test]
    async fn get_expired_entry_returns_none() {
        let cache = MemoryCache::new(10);
        cache.raw_set("query:abc", json!(42), 0).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
        assert_eq!(cache.raw_get("query:abc").await.unwrap(), None);
    }

    #[tokio::test]
    async fn invalidate_removes_matching_prefix_only() {
        let cache = MemoryCache::new(10);
        cache.raw_set("query:a", json!(1), 60).await.unwrap();
        cache.raw_set("query:b", json!(2), 60).await.unwrap();
        cache.raw_set("content:c", json!(3), 60).await.unwrap();
        let removed = cache.raw_invalidate("query:").await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(cache.raw_get("content:c").await.unwrap(), Some(json!(3)));
    }

    #[tokio::test]
    async fn eviction_counted_when_capacity_exceeded() {
        let cache = MemoryCache::new(1);
        cache.raw_set("k1", json!(1), 60).await.unwrap();
        cache.raw_set("k2", json!(2), 60).await.unwrap();
        let stats = cache.raw_stats().await.unwrap();
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.keys, 1);
    }
}
