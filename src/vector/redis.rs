use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use fred::{
    clients::RedisPool,
    interfaces::{ClientLike, KeysInterface},
    types::{Builder, RedisConfig as FredRedisConfig, ScanType, Scanner},
};
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{cosine_similarity, filter_matches, normalize_score, sort_hits, DistanceMetric, SearchParams, VectorStore, VectorStoreStats};
use crate::config::VectorDatabaseConfig;
use crate::error::CoreError;
use crate::types::{Metadata, SearchHit, VectorRecord};

const KEY_PREFIX: &str = "vector:";

#[derive(Debug, Serialize, Deserialize)]
struct StoredRecord {
    vector: Vec<f32>,
    metadata: Metadata,
}

/// Redis-backed variant (§4.B `managed-service-B`). Vectors are stored as a
/// JSON document per key and scanned linearly at query time — the teacher's
/// own `RedisClient::vector_search` left this as a scan-and-score stub
/// pending a real `FT.SEARCH` KNN index; this adapts that same approach
/// into a working (if not production-scale) implementation rather than a
/// no-op, since the core must return real results.
pub struct RedisVectorStore {
    client: RedisPool,
    dim: usize,
    metric: DistanceMetric,
}

impl RedisVectorStore {
    pub async fn new(config: &VectorDatabaseConfig) -> Result<Self, CoreError> {
        let url = config
            .connection_string
            .clone()
            .unwrap_or_else(|| "redis://localhost:6379".to_string());
        let redis_config = FredRedisConfig::from_url(&url)
            .map_err(|e| CoreError::Connection(format!("invalid vector store URL: {e}")))?;
        let client = Builder::from_config(redis_config)
            .with_connection_config(|c| c.connection_timeout = Duration::from_secs(5))
            .build_pool(10)
            .map_err(|e| CoreError::Connection(format!("failed to build vector store pool: {e}")))?;
        client
            .connect()
            .await
            .map_err(|e| CoreError::Connection(format!("failed to connect vector store: {e}")))?;
        client
            .wait_for_connect()
            .await
            .map_err(|e| CoreError::Connection(format!("vector store connection timed out: {e}")))?;

        Ok(Self {
            client,
            dim: config.dimension,
            metric: DistanceMetric::parse(&config.metric),
        })
    }

    fn key(id: &str) -> String {
        format!("{KEY_PREFIX}{id}")
    }
}

#[async_trait]
impl VectorStore for RedisVectorStore {
    async fn initialize(&self) -> Result<(), CoreError> {
        Ok(())
    }

    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<(), CoreError> {
        for record in records {
            let stored = StoredRecord { vector: record.vector, metadata: record.metadata };
            let serialized = serde_json::to_string(&stored)?;
            let _: () = self
                .client
                .set(Self::key(&record.id), serialized, None, None, false)
                .await
                .map_err(|e| CoreError::Connection(format!("vector upsert failed: {e}")))?;
        }
        Ok(())
    }

    async fn delete(&self, ids: &[String]) -> Result<(), CoreError> {
        if ids.is_empty() {
            return Ok(());
        }
        let keys: Vec<String> = ids.iter().map(|id| Self::key(id)).collect();
        let _: i64 = self
            .client
            .unlink(keys)
            .await
            .map_err(|e| CoreError::Connection(format!("vector delete failed: {e}")))?;
        Ok(())
    }

    async fn search(&self, vector: &[f32], params: SearchParams) -> Result<Vec<SearchHit>, CoreError> {
        let mut keys = Vec::new();
        let pattern = format!("{KEY_PREFIX}*");
        let mut stream = self.client.next().scan(pattern, Some(200), Some(ScanType::String));
        while let Some(page) = stream
            .try_next()
            .await
            .map_err(|e| CoreError::Connection(format!("vector scan failed: {e}")))?
        {
            if let Some(found) = page.results() {
                keys.extend(found.iter().filter_map(|k| k.as_str().map(str::to_string)));
            }
        }

        let mut hits = Vec::new();
        for key in keys {
            let raw: Option<String> = self
                .client
                .get(&key)
                .await
                .map_err(|e| CoreError::Connection(format!("vector get failed: {e}")))?;
            let Some(raw) = raw else { continue };
            let stored: StoredRecord = match serde_json::from_str(&raw) {
                Ok(s) => s,
                Err(e) => {
                    warn!("skipping undecodable vector record at '{key}': {e}");
                    continue;
                }
            };
            if !params.filter.is_empty() && !filter_matches(&stored.metadata, &params.filter) {
                continue;
            }
            let raw_score = cosine_similarity(vector, &stored.vector);
            let score = normalize_score(self.metric, raw_score);
            if let Some(threshold) = params.score_threshold {
                if score < threshold {
                    continue;
                }
            }
            hits.push(SearchHit {
                id: key.trim_start_matches(KEY_PREFIX).to_string(),
                score,
                metadata: if params.include_metadata { stored.metadata } else { Metadata::new() },
            });
        }

        sort_hits(&mut hits);
        hits.truncate(params.top_k.max(1));
        Ok(hits)
    }

    async fn stats(&self) -> Result<VectorStoreStats, CoreError> {
        let mut count = 0u64;
        let pattern = format!("{KEY_PREFIX}*");
        let mut stream = self.client.next().scan(pattern, Some(200), Some(ScanType::String));
        while let Some(page) = stream
            .try_next()
            .await
            .map_err(|e| CoreError::Connection(format!("vector scan failed: {e}")))?
        {
            count += page.results().as_ref().map(|k| k.len()).unwrap_or(0) as u64;
        }
        Ok(VectorStoreStats {
            vector_count: count,
            dim: self.dim,
            index_tag: "redis-scan".to_string(),
            last_updated: Utc::now(),
            bytes: None,
        })
    }
}
