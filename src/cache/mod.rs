//! Cache Store (spec component A).
//!
//! A mapping from string keys to opaque JSON-encodable values with per-key
//! TTL. Key spaces: `query:<fingerprint>`, `embedding:<provider>:<model>:<hash>`,
//! `content:<content-id>`. Every value key has a sibling `<key>:meta` holding
//! insertion time, ttl, access count, last access (teacher's three-tier
//! `search:vec:` / `search:topk:` / `search:meta:` key pattern, generalized
//! to the spec's single key grammar with one cache-entry shape per key).
//!
//! Failure semantics: back-end errors are never fatal. The caller sees a
//! miss and the failure is logged at `warn` (§4.A); correctness never
//! depends on cache persistence.

mod memory;
mod redis;

#[cfg(test)]
mod tests;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value as JsonValue;
use tracing::warn;

use crate::config::CacheConfig;
use crate::error::CoreResult;

pub use memory::MemoryCache;
pub use redis::RedisCache;

/// Point-in-time cache statistics (§4.A `stats()`).
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub keys: u64,
    pub memory_bytes: u64,
    pub evictions: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Capability set a cache back-end must implement. Every method is
/// infallible from the caller's perspective for `get`/`mget` (failures
/// degrade to miss); `set`/`invalidate`/`clear`/`health_check` surface
/// `CoreError::Connection` so the manager can log and continue.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn raw_get(&self, key: &str) -> CoreResult<Option<JsonValue>>;
    async fn raw_set(&self, key: &str, value: JsonValue, ttl_secs: u64) -> CoreResult<()>;
    async fn raw_invalidate(&self, prefix: &str) -> CoreResult<u64>;
    async fn raw_clear(&self) -> CoreResult<()>;
    async fn raw_stats(&self) -> CoreResult<CacheStats>;
    async fn raw_health_check(&self) -> CoreResult<bool>;
}

/// Dispatches to one of the configured back-end variants. A small match in
/// the adapter, per the pluggable-back-end design note (§9): no trait
/// object indirection needed since there are only two variants today.
enum Backend {
    Memory(MemoryCache),
    Redis(RedisCache),
}

#[async_trait]
impl CacheStore for Backend {
    async fn raw_get(&self, key: &str) -> CoreResult<Option<JsonValue>> {
        match self {
            Backend::Memory(m) => m.raw_get(key).await,
            Backend::Redis(r) => r.raw_get(key).await,
        }
    }

    async fn raw_set(&self, key: &str, value: JsonValue, ttl_secs: u64) -> CoreResult<()> {
        match self {
            Backend::Memory(m) => m.raw_set(key, value, ttl_secs).await,
            Backend::Redis(r) => r.raw_set(key, value, ttl_secs).await,
        }
    }

    async fn raw_invalidate(&self, prefix: &str) -> CoreResult<u64> {
        match self {
            Backend::Memory(m) => m.raw_invalidate(prefix).await,
            Backend::Redis(r) => r.raw_invalidate(prefix).await,
        }
    }

    async fn raw_clear(&self) -> CoreResult<()> {
        match self {
            Backend::Memory(m) => m.raw_clear().await,
            Backend::Redis(r) => r.raw_clear().await,
        }
    }

    async fn raw_stats(&self) -> CoreResult<CacheStats> {
        match self {
            Backend::Memory(m) => m.raw_stats().await,
            Backend::Redis(r) => r.raw_stats().await,
        }
    }

    async fn raw_health_check(&self) -> CoreResult<bool> {
        match self {
            Backend::Memory(m) => m.raw_health_check().await,
            Backend::Redis(r) => r.raw_health_check().await,
        }
    }
}

/// Public facade used by the rest of the core. Owns the hit/miss counters
/// (stats are tracked here, not per-back-end, so memory and Redis report
/// identically) and the key-grammar helpers.
pub struct CacheManager {
    backend: Arc<Backend>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheManager {
    pub fn new_memory(capacity: usize) -> Self {
        Self {
            backend: Arc::new(Backend::Memory(MemoryCache::new(capacity))),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub async fn new_redis(config: &CacheConfig) -> CoreResult<Self> {
        let redis = RedisCache::new(config).await?;
        Ok(Self {
            backend: Arc::new(Backend::Redis(redis)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    /// `query:<64-hex fingerprint>`
    pub fn query_key(fingerprint: &str) -> String {
        format!("query:{fingerprint}")
    }

    /// `embedding:<provider>:<model>:<base36 hash>`
    pub fn embedding_key(provider: &str, model: &str, text_hash_base36: &str) -> String {
        format!("embedding:{provider}:{model}:{text_hash_base36}")
    }

    /// `content:<content-id>`
    pub fn content_key(content_id: &str) -> String {
        format!("content:{content_id}")
    }

    /// Get a typed value. Never throws: on deserialize or back-end failure
    /// this counts and logs as a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.backend.raw_get(key).await {
            Ok(Some(value)) => match serde_json::from_value(value) {
                Ok(parsed) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    Some(parsed)
                }
                Err(e) => {
                    warn!("cache value at '{key}' failed to deserialize: {e}");
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    None
                }
            },
            Ok(None) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Err(e) => {
                warn!("cache get('{key}') failed, treating as miss: {e}");
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Batch get for embedding cache lookups; each slot counts independently.
    pub async fn mget<T: DeserializeOwned>(&self, keys: &[String]) -> Vec<(String, Option<T>)> {
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            out.push((key.clone(), self.get::<T>(key).await));
        }
        out
    }

    /// `set(key, value, ttl)` with `ttl >= 1s`. Atomic per key: the back-end
    /// performs a last-write-wins overwrite. Failure is logged, never
    /// propagated.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl_secs: u64) {
        let ttl = ttl_secs.max(1);
        let encoded = match serde_json::to_value(value) {
            Ok(v) => v,
            Err(e) => {
                warn!("cache set('{key}') failed to serialize value: {e}");
                return;
            }
        };
        if let Err(e) = self.backend.raw_set(key, encoded, ttl).await {
            warn!("cache set('{key}') failed: {e}");
        }
    }

    pub async fn invalidate(&self, prefix: &str) -> u64 {
        match self.backend.raw_invalidate(prefix).await {
            Ok(n) => n,
            Err(e) => {
                warn!("cache invalidate('{prefix}') failed: {e}");
                0
            }
        }
    }

    pub async fn clear(&self) {
        if let Err(e) = self.backend.raw_clear().await {
            warn!("cache clear() failed: {e}");
        }
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    pub async fn stats(&self) -> CacheStats {
        let mut stats = self.backend.raw_stats().await.unwrap_or_default();
        stats.hits = self.hits.load(Ordering::Relaxed);
        stats.misses = self.misses.load(Ordering::Relaxed);
        stats
    }

    pub async fn health_check(&self) -> bool {
        self.backend.raw_health_check().await.unwrap_or(false)
    }
}
