use std::time::Duration;

use async_trait::async_trait;
use fred::{
    clients::RedisPool,
    interfaces::{ClientLike, KeysInterface},
    types::{Builder, Expiration, InfoKind, RedisConfig as FredRedisConfig, ScanType, Scanner},
};
use futures::TryStreamExt;
use serde_json::Value as JsonValue;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::{CacheStats, CacheStore};
use crate::config::CacheConfig;
use crate::error::CoreError;

/// Redis-backed generic KV cache (the `managed-B`-adjacent cache back-end;
/// vector-similarity scanning lives in `vector::redis`, not here — see
/// DESIGN.md for the split rationale).
pub struct RedisCache {
    client: RedisPool,
    health_timeout: Duration,
}

impl RedisCache {
    pub async fn new(config: &CacheConfig) -> Result<Self, CoreError> {
        let url = match &config.password {
            Some(pw) => format!("redis://:{pw}@{}:{}/{}", config.host, config.port, config.db),
            None => format!("redis://{}:{}/{}", config.host, config.port, config.db),
        };

        let redis_config = FredRedisConfig::from_url(&url)
            .map_err(|e| CoreError::Connection(format!("invalid cache connection URL: {e}")))?;

        let client = Builder::from_config(redis_config)
            .with_connection_config(|conn_config| {
                conn_config.connection_timeout = Duration::from_secs(5);
            })
            .with_performance_config(|perf_config| {
                perf_config.auto_pipeline = true;
            })
            .build_pool(10)
            .map_err(|e| CoreError::Connection(format!("failed to build cache pool: {e}")))?;

        client
            .connect()
            .await
            .map_err(|e| CoreError::Connection(format!("failed to connect to cache: {e}")))?;
        client
            .wait_for_connect()
            .await
            .map_err(|e| CoreError::Connection(format!("cache connection timed out: {e}")))?;

        Ok(Self {
            client,
            health_timeout: Duration::from_secs(5),
        })
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn raw_get(&self, key: &str) -> Result<Option<JsonValue>, CoreError> {
        let raw: Option<String> = self
            .client
            .get(key)
            .await
            .map_err(|e| CoreError::Connection(format!("cache get failed: {e}")))?;
        match raw {
            Some(s) => {
                let value: JsonValue = serde_json::from_str(&s)?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn raw_set(&self, key: &str, value: JsonValue, ttl_secs: u64) -> Result<(), CoreError> {
        let serialized = serde_json::to_string(&value)?;
        let _: () = self
            .client
            .set(key, serialized, Some(Expiration::EX(ttl_secs as i64)), None, false)
            .await
            .map_err(|e| CoreError::Connection(format!("cache set failed: {e}")))?;
        Ok(())
    }

    async fn raw_invalidate(&self, prefix: &str) -> Result<u64, CoreError> {
        let pattern = format!("{prefix}*");
        let mut matched = Vec::new();
        let mut stream = self.client.next().scan(pattern, Some(200), Some(ScanType::String));
        while let Some(page) = stream
            .try_next()
            .await
            .map_err(|e| CoreError::Connection(format!("cache scan failed: {e}")))?
        {
            if let Some(keys) = page.results() {
                matched.extend(keys.iter().filter_map(|k| k.as_str().map(str::to_string)));
            }
        }
        if matched.is_empty() {
            return Ok(0);
        }
        debug!("invalidating {} cache keys matching '{}'", matched.len(), prefix);
        let deleted: i64 = self
            .client
            .unlink(matched)
            .await
            .map_err(|e| CoreError::Connection(format!("cache unlink failed: {e}")))?;
        Ok(deleted.max(0) as u64)
    }

    async fn raw_clear(&self) -> Result<(), CoreError> {
        self.raw_invalidate("").await?;
        Ok(())
    }

    async fn raw_stats(&self) -> Result<CacheStats, CoreError> {
        let info: String = self
            .client
            .info(Some(InfoKind::Memory))
            .await
            .map_err(|e| CoreError::Connection(format!("cache info failed: {e}")))?;
        let mut memory_bytes = 0u64;
        for line in info.lines() {
            if let Some(("used_memory", value)) = line.split_once(':') {
                memory_bytes = value.trim().parse().unwrap_or(0);
            }
        }
        Ok(CacheStats {
            hits: 0,
            misses: 0,
            keys: 0,
            memory_bytes,
            evictions: 0,
        })
    }

    async fn raw_health_check(&self) -> Result<bool, CoreError> {
        match timeout(self.health_timeout, self.client.ping::<String>()).await {
            Ok(Ok(_)) => Ok(true),
            Ok(Err(e)) => {
                warn!("cache health check failed: {e}");
                Ok(false)
            }
            Err(_) => {
                warn!("cache health check timed out");
                Ok(false)
            }
        }
    }
}
