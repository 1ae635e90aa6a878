//! Cache warming & GDPR-style invalidation (§4.I, supplemented feature).
//!
//! Tracks per-fingerprint usage (`UsageStats`), periodically re-reads the
//! "popular" set to keep it warm in cache, evicts stale usage records, and
//! invalidates cache entries tied to a data source when that source updates
//! or is deleted.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use tracing::debug;

use crate::cache::CacheManager;
use crate::types::UsageStats;

const WARM_BATCH_SIZE: usize = 10;
const WARM_BATCH_DELAY_MS: u64 = 50;

/// Tracks query-result popularity and keeps the hot set warm in cache.
pub struct CacheWarmer {
    cache: Arc<CacheManager>,
    usage: DashMap<String, UsageStats>,
    popularity_threshold: u64,
    max_age_secs: i64,
}

impl CacheWarmer {
    pub fn new(cache: Arc<CacheManager>, popularity_threshold: u64, max_age_secs: i64) -> Self {
        Self { cache, usage: DashMap::new(), popularity_threshold, max_age_secs }
    }

    /// Called once per completed query (§4.I "on each completed query,
    /// record usage"). `fingerprint` is the same SHA-256 hex key used for
    /// the `query:` cache key.
    pub fn record(&self, fingerprint: &str, latency_ms: f64, sources: &[String]) {
        self.usage
            .entry(fingerprint.to_string())
            .and_modify(|stats| stats.record(latency_ms, sources))
            .or_insert_with(|| UsageStats::new(fingerprint, latency_ms, sources.to_vec()));
    }

    /// The "popular" set: `count >= popularityThreshold` and
    /// `now - lastAccessed <= maxAge`, scored by
    /// `count / (now - lastAccessed + 1)` and sorted descending.
    fn popular_set(&self) -> Vec<String> {
        let now = Utc::now();
        let mut scored: Vec<(String, f64)> = self
            .usage
            .iter()
            .filter(|entry| entry.count >= self.popularity_threshold)
            .filter_map(|entry| {
                let age_secs = (now - entry.last_accessed).num_seconds();
                if age_secs < 0 || age_secs > self.max_age_secs {
                    return None;
                }
                let score = entry.count as f64 / (age_secs as f64 + 1.0);
                Some((entry.fingerprint.clone(), score))
            })
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.into_iter().map(|(fingerprint, _)| fingerprint).collect()
    }

    /// One warming tick: walks the popular set in small batches, issuing
    /// idempotent cache reads (a cache hit simply refreshes the back-end's
    /// own LRU/TTL bookkeeping; a miss is not re-populated here, since only
    /// `QueryProcessor` can regenerate a full `QueryResult`).
    pub async fn warm_tick(&self) {
        let popular = self.popular_set();
        if popular.is_empty() {
            return;
        }

        for batch in popular.chunks(WARM_BATCH_SIZE) {
            for fingerprint in batch {
                let key = CacheManager::query_key(fingerprint);
                let _ = self.cache.get::<serde_json::Value>(&key).await;
            }
            tokio::time::sleep(Duration::from_millis(WARM_BATCH_DELAY_MS)).await;
        }

        debug!("cache warming tick refreshed {} popular entries", popular.len());
    }

    /// Drops usage records older than `maxAge`, bounding the table's growth.
    pub fn evict_stale(&self) {
        let now = Utc::now();
        self.usage.retain(|_, stats| (now - stats.last_accessed).num_seconds() <= self.max_age_secs);
    }

    /// Invalidates every cached query result whose usage record mentions
    /// `source_id`, plus the source's own `content:<sourceId>*` entries.
    /// Called when a data source is updated or deleted (§4.I).
    pub async fn invalidate_source(&self, source_id: &str) -> u64 {
        let mut invalidated = 0u64;
        let stale_fingerprints: Vec<String> = self
            .usage
            .iter()
            .filter(|entry| entry.sources.iter().any(|s| s == source_id))
            .map(|entry| entry.fingerprint.clone())
            .collect();

        for fingerprint in &stale_fingerprints {
            let key = CacheManager::query_key(fingerprint);
            invalidated += self.cache.invalidate(&key).await;
            self.usage.remove(fingerprint);
        }

        invalidated += self.cache.invalidate(&CacheManager::content_key(source_id)).await;
        invalidated
    }

    pub fn tracked_fingerprints(&self) -> usize {
        self.usage.len()
    }
}
