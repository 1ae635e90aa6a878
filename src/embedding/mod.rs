//! Embedding Service (spec component C).
//!
//! Produces a vector for a single text, or a batch, behind a provider
//! abstraction with its own cache layer. Mirrors the teacher's
//! `ml::bi_encoder::BiEncoder` + `ml::tokenizer::TokenizerService` split:
//! the tokenizer owns text normalization and cache-key hashing, the
//! provider owns producing the vector.

mod onnx;
mod tokenizer;

#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::timeout;

use crate::cache::CacheManager;
use crate::config::EmbeddingConfig;
use crate::error::{CoreError, CoreResult};

pub use onnx::OnnxProvider;
pub use tokenizer::TokenizerService;

/// Result of `embed`/`embedBatch` (§4.C).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    pub text: String,
    pub vector: Vec<f32>,
    pub model: String,
    pub timestamp: DateTime<Utc>,
    pub cached: bool,
}

/// Capability set a provider back-end implements. One variant today
/// (`OnnxProvider`, a deterministic placeholder matching the teacher's own
/// `BiEncoder::encode` posture); the trait exists so a real remote provider
/// can be dropped in without touching `EmbeddingService`.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed_raw(&self, text: &str) -> CoreResult<Vec<f32>>;
    fn dim(&self) -> usize;
    fn model(&self) -> &str;
}

/// Façade wrapping a provider with caching, truncation, batching, and the
/// `Timeout`/`RateLimit` error mapping (§4.C).
pub struct EmbeddingService {
    provider: Arc<dyn EmbeddingProvider>,
    tokenizer: TokenizerService,
    cache: Option<Arc<CacheManager>>,
    config: EmbeddingConfig,
}

impl EmbeddingService {
    pub fn new(config: EmbeddingConfig, cache: Option<Arc<CacheManager>>) -> Self {
        let provider = Arc::new(OnnxProvider::new(config.dimension, config.model.clone()));
        Self {
            provider,
            tokenizer: TokenizerService::new(),
            cache: if config.cache_enabled { cache } else { None },
            config,
        }
    }

    #[cfg(test)]
    fn with_provider(config: EmbeddingConfig, provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self { provider, tokenizer: TokenizerService::new(), cache: None, config }
    }

    /// Truncate to roughly `maxTokens * 4` characters, matching the
    /// spec's coarse token-to-char ratio (no real tokenizer count needed
    /// for truncation purposes).
    fn truncate(&self, text: &str) -> String {
        let max_chars = self.config.max_tokens.saturating_mul(4);
        if text.chars().count() <= max_chars {
            text.to_string()
        } else {
            text.chars().take(max_chars).collect()
        }
    }

    fn cache_key(&self, text: &str) -> String {
        let hash = self.tokenizer.hash_base36(text);
        CacheManager::embedding_key(&self.config.provider, &self.config.model, &hash)
    }

    /// `embed(text) → {text, vector, model, timestamp, cached}` (§4.C).
    pub async fn embed(&self, text: &str) -> CoreResult<Embedding> {
        let truncated = self.truncate(text);
        let key = self.cache_key(&truncated);

        if let Some(cache) = &self.cache {
            if let Some(mut hit) = cache.get::<Embedding>(&key).await {
                hit.cached = true;
                return Ok(hit);
            }
        }

        let vector = timeout(
            Duration::from_millis(self.config.timeout_ms),
            self.provider.embed_raw(&truncated),
        )
        .await
        .map_err(|_| CoreError::Timeout)??;

        let embedding = Embedding {
            text: truncated,
            vector,
            model: self.config.model.clone(),
            timestamp: Utc::now(),
            cached: false,
        };

        if let Some(cache) = &self.cache {
            cache.set(&key, &embedding, self.config.cache_ttl_secs).await;
        }

        Ok(embedding)
    }

    /// `embedBatch(texts)`; preserves index order, sub-batches by
    /// `batchSize`, and bypasses the provider for cache hits (§4.C).
    pub async fn embed_batch(&self, texts: &[String]) -> CoreResult<Vec<Embedding>> {
        let mut results = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.config.batch_size.max(1)) {
            for text in chunk {
                results.push(self.embed(text).await?);
            }
        }
        Ok(results)
    }

    /// Fixed probe reporting dim and provider (§4.C `healthCheck`).
    pub async fn health_check(&self) -> bool {
        self.provider.embed_raw("healthcheck probe").await.is_ok()
    }

    pub fn dim(&self) -> usize {
        self.provider.dim()
    }
}
