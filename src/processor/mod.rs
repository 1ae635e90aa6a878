//! Search Orchestrator (spec component F, "the hard part"): admission,
//! global deadline, cache lookup, parse/optimize/embed delegation,
//! per-source fan-out, score adjustment, merge/dedup, rank/filter, and
//! response generation.


use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use sha2::{Digest, Sha256};
use tokio::time::timeout;
use tracing::warn;
use uuid::Uuid;

use crate::cache::CacheManager;
use crate::config::{Config, ProcessorConfig};
use crate::embedding::EmbeddingService;
use crate::error::{CoreError, CoreResult};
use crate::monitoring::MonitoringService;
use crate::query;
use crate::registry::DataSourceRegistry;
use crate::response;
use crate::search::{self, keyword, CircuitBreaker, RetryExecutor};
use crate::types::{Filter, FilterOperator, Metadata, QueryResult, RankedResult, SearchContext};
use crate::vector::{SearchParams, VectorStore};

const CAPACITY_RETRY_AFTER_SECS: u64 = 1;
const MAX_MERGED_RESULTS: usize = 100;
const MAX_GENERATED_SOURCES: usize = 10;

/// Coordinates a single query end to end (§4.F). Owns the shared,
/// long-lived collaborators; per-query state lives only in `in_flight`.
pub struct QueryProcessor {
    processor_config: ProcessorConfig,
    response_config: crate::config::ResponseConfig,
    hybrid_vector_weight: f32,
    hybrid_keyword_weight: f32,
    query_result_ttl_secs: u64,
    cache: Arc<CacheManager>,
    registry: Arc<DataSourceRegistry>,
    embedding: Arc<EmbeddingService>,
    vector_store: Arc<dyn VectorStore>,
    monitoring: Option<Arc<MonitoringService>>,
    circuit_breaker: Arc<CircuitBreaker>,
    in_flight: DashMap<Uuid, SearchContext>,
}

impl QueryProcessor {
    pub fn new(
        config: &Config,
        cache: Arc<CacheManager>,
        registry: Arc<DataSourceRegistry>,
        embedding: Arc<EmbeddingService>,
        vector_store: Arc<dyn VectorStore>,
        monitoring: Option<Arc<MonitoringService>>,
    ) -> Self {
        Self {
            processor_config: config.processor.clone(),
            response_config: config.response.clone(),
            hybrid_vector_weight: config.search.hybrid.vector_weight,
            hybrid_keyword_weight: config.search.hybrid.keyword_weight,
            query_result_ttl_secs: config.cache.ttl.query_results_secs,
            cache,
            registry,
            embedding,
            vector_store,
            monitoring,
            circuit_breaker: Arc::new(CircuitBreaker::new()),
            in_flight: DashMap::new(),
        }
    }

    /// `status(queryId)` — snapshot of an in-flight query; never blocks a
    /// concurrent writer.
    pub fn status(&self, query_id: Uuid) -> Option<SearchContext> {
        self.in_flight.get(&query_id).map(|r| r.clone())
    }

    /// `cancel(queryId)` — signals the query's cancellation token, so
    /// `run_pipeline` stops at its next stage boundary and skips the
    /// result cache write, then removes the in-flight entry. A no-op on an
    /// already-completed or unknown query.
    pub fn cancel(&self, query_id: Uuid) -> bool {
        match self.in_flight.get(&query_id) {
            Some(ctx) => {
                ctx.cancel_token.cancel();
                drop(ctx);
                self.in_flight.remove(&query_id);
                true
            }
            None => false,
        }
    }

    pub fn active_count(&self) -> usize {
        self.in_flight.len()
    }

    /// `process(query|text, context?) → QueryResult` (§4.F).
    pub async fn process(
        &self,
        text: &str,
        context: Option<Metadata>,
        filters: Option<Vec<Filter>>,
    ) -> CoreResult<QueryResult> {
        let started_at = Instant::now();

        // 1. Admission.
        if self.in_flight.len() >= self.processor_config.max_concurrent_queries {
            return Err(CoreError::CapacityExceeded { retry_after_secs: CAPACITY_RETRY_AFTER_SECS });
        }

        let query = crate::types::Query::new(text, context, filters, None)?;
        // Computed once, from the trimmed `query.text`, so the cache key
        // `run_pipeline` reads/writes and the popularity fingerprint fed to
        // the cache warmer always agree (§4.I's warming contract depends on
        // both resolving to the same key for the same logical query).
        let fingerprint = fingerprint(&query.text, query.context.as_ref(), query.filters.as_deref());
        let cancel_token = tokio_util::sync::CancellationToken::new();
        let mut ctx = SearchContext::new(query.id);
        ctx.cancel_token = cancel_token.clone();
        self.in_flight.insert(query.id, ctx);

        // 2. Global deadline.
        let deadline = std::time::Duration::from_millis(self.processor_config.default_timeout_ms);
        let query_id = query.id;
        let outcome = timeout(deadline, self.run_pipeline(query, started_at, &fingerprint, &cancel_token)).await;

        self.in_flight.remove(&query_id);

        let outcome = match outcome {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(error)) if error.surfaces_to_caller() => Err(error),
            Ok(Err(error)) => {
                warn!("query {query_id} failed internally, returning sentinel: {error}");
                Ok(QueryResult::sentinel(query_id, started_at.elapsed().as_millis() as u64))
            }
            Err(_) => Err(CoreError::Timeout),
        };

        if let Some(monitoring) = &self.monitoring {
            let sources: Vec<String> = outcome.as_ref().map(|r| r.sources.iter().map(|s| s.source_id.clone()).collect()).unwrap_or_default();
            let (processing_time_ms, cached, succeeded) = match &outcome {
                Ok(result) => (result.processing_time_ms, result.cached, result.confidence > 0.0),
                Err(_) => (started_at.elapsed().as_millis() as u64, false, false),
            };
            monitoring.record_query_completion(&fingerprint, processing_time_ms, cached, &sources, succeeded).await;
        }

        outcome
    }

    async fn run_pipeline(
        &self,
        query: crate::types::Query,
        started_at: Instant,
        fingerprint: &str,
        cancel_token: &tokio_util::sync::CancellationToken,
    ) -> CoreResult<QueryResult> {
        // 3. Cache lookup.
        let cache_enabled = self.processor_config.cache_enabled;
        let cache_key = CacheManager::query_key(fingerprint);

        if cache_enabled {
            if let Some(mut cached) = self.cache.get::<QueryResult>(&cache_key).await {
                cached.cached = true;
                return Ok(cached);
            }
        }

        if cancel_token.is_cancelled() {
            return Err(CoreError::Processing("query cancelled before parsing".to_string()));
        }

        // 4. Parse & optimize.
        let parsed = query::parse(&query.text)?;
        let optimization = query::optimize(&parsed, query.context.as_ref())?;

        if cancel_token.is_cancelled() {
            return Err(CoreError::Processing("query cancelled before embedding".to_string()));
        }

        // 5. Embed, gated by the embedding-provider circuit breaker and
        // retried with exponential backoff on connection/auth failures.
        let embedding = self.embed_with_resilience(&query.text).await?;

        if cancel_token.is_cancelled() {
            return Err(CoreError::Processing("query cancelled before fan-out".to_string()));
        }

        // 6. Fetch active sources.
        let active_sources = self.registry.get_active();

        // 7. Fan-out.
        let keywords = keyword::tokenize(&query.text);
        let params_template = SearchParams {
            top_k: self.processor_config.max_results_per_source,
            filter: Vec::new(),
            include_metadata: true,
            score_threshold: Some(self.processor_config.min_confidence_threshold),
        };

        let mut context_errors = Vec::new();
        let mut merged_by_key: HashMap<String, RankedResult> = HashMap::new();

        let per_source = active_sources.into_iter().map(|source| {
            let mut filter = optimization.effective_filters.clone();
            filter.push(Filter::new("sourceId", FilterOperator::Eq, serde_json::json!(source.id.to_string())));
            let params = SearchParams { filter, ..params_template.clone() };
            self.search_one_source(&embedding.vector, &query.text, &keywords, params)
        });

        let per_source_results: Vec<CoreResult<Vec<RankedResult>>> = if self.processor_config.parallel_search_enabled {
            futures::future::join_all(per_source).await
        } else {
            let mut out = Vec::new();
            for fut in per_source {
                out.push(fut.await);
            }
            out
        };

        for result in per_source_results {
            match result {
                Ok(hits) => {
                    for hit in hits {
                        merge_candidate(&mut merged_by_key, hit, &optimization.boost);
                    }
                }
                Err(error) => context_errors.push(error.to_string()),
            }
        }

        if let Some(mut ctx) = self.in_flight.get_mut(&query.id) {
            ctx.partial_errors = context_errors;
        }

        if let Some(monitoring) = &self.monitoring {
            let stats = self.circuit_breaker.get_stats().await;
            monitoring.record_circuit_breaker_state(
                stats.vector_backend_state as u8 as f64,
                stats.embedding_provider_state as u8 as f64,
            );
        }

        if cancel_token.is_cancelled() {
            return Err(CoreError::Processing("query cancelled before ranking".to_string()));
        }

        // 10. Rank & filter.
        let mut ranked: Vec<RankedResult> = merged_by_key.into_values().collect();
        ranked.sort_by(|a, b| b.final_score.partial_cmp(&a.final_score).unwrap_or(std::cmp::Ordering::Equal));
        ranked.retain(|r| r.final_score >= self.processor_config.min_confidence_threshold);
        ranked.truncate(MAX_MERGED_RESULTS);

        let top_for_generation = search::diversity::diversify(ranked, MAX_GENERATED_SOURCES);

        // 11. Generate.
        let synthesized = response::generate(&top_for_generation, &self.response_config);
        let processing_time_ms = started_at.elapsed().as_millis() as u64;

        let result = QueryResult {
            id: query.id,
            response_text: synthesized.text,
            sources: synthesized.sources,
            confidence: synthesized.confidence,
            processing_time_ms,
            cached: false,
        };

        // 12. Cache — skipped for a cancelled query (§5: a cancelled or
        // timed-out query must never produce a cache write).
        if cache_enabled && !cancel_token.is_cancelled() {
            self.cache.set(&cache_key, &result, self.query_result_ttl_secs).await;
        }

        Ok(result)
    }

    /// Runs `embed()` behind the embedding-provider circuit breaker and an
    /// exponential-backoff retry executor, recording the outcome on the
    /// breaker so a misbehaving provider trips the breaker for subsequent
    /// queries rather than retrying forever one query at a time.
    async fn embed_with_resilience(&self, text: &str) -> CoreResult<crate::embedding::Embedding> {
        if self.circuit_breaker.is_embedding_provider_circuit_open().await {
            return Err(CoreError::Connection("embedding provider circuit open".to_string()));
        }

        let executor = RetryExecutor::with_exponential_backoff();
        let result = executor.execute(|| self.embedding.embed(text)).await;

        match &result {
            Ok(_) => self.circuit_breaker.record_embedding_provider_success().await,
            Err(error) if error.is_connection_error() || error.is_authentication_error() => {
                self.circuit_breaker.record_embedding_provider_failure().await
            }
            Err(_) => {}
        }

        result
    }

    async fn search_one_source(
        &self,
        vector: &[f32],
        query_text: &str,
        keywords: &[String],
        params: SearchParams,
    ) -> CoreResult<Vec<RankedResult>> {
        if self.circuit_breaker.is_vector_backend_circuit_open().await {
            return Err(CoreError::Connection("vector backend circuit open".to_string()));
        }

        let executor = RetryExecutor::with_exponential_backoff();
        let result = executor
            .execute(|| search::semantic::semantic_search(self.vector_store.as_ref(), vector, query_text, params.clone()))
            .await;

        match &result {
            Ok(_) => self.circuit_breaker.record_vector_backend_success().await,
            Err(error) if error.is_connection_error() || error.is_authentication_error() => {
                self.circuit_breaker.record_vector_backend_failure().await
            }
            Err(_) => {}
        }

        let mut ranked = result?;
        keyword::apply_keyword_scores(&mut ranked, keywords);
        search::hybrid::fuse_and_sort_weighted(&mut ranked, self.hybrid_vector_weight, self.hybrid_keyword_weight);
        Ok(ranked)
    }
}

/// `SHA-256(JSON({text, context, filters}))` rendered as hex (§4.F step 3,
/// §6 cache key grammar).
fn fingerprint(text: &str, context: Option<&Metadata>, filters: Option<&[Filter]>) -> String {
    let payload = serde_json::json!({
        "text": text,
        "context": context,
        "filters": filters,
    });
    let encoded = serde_json::to_vec(&payload).unwrap_or_default();
    let digest = Sha256::digest(&encoded);
    hex::encode(digest)
}

fn is_truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => false,
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        serde_json::Value::String(s) => !s.is_empty(),
        serde_json::Value::Array(a) => !a.is_empty(),
        serde_json::Value::Object(o) => !o.is_empty(),
    }
}

/// Step 8 (score adjustment) + step 9 (merge/dedup). Multiplies the
/// incoming hit's score by every boost factor whose name matches a truthy
/// metadata field, clamps to 1, then keeps whichever of the new hit and
/// any existing entry under the same dedup key has the higher score.
fn merge_candidate(merged: &mut HashMap<String, RankedResult>, mut hit: RankedResult, boost: &HashMap<String, f32>) {
    for (name, weight) in boost {
        if hit.metadata.get(name).map(is_truthy).unwrap_or(false) {
            hit.final_score = (hit.final_score * weight).min(1.0);
        }
    }

    let key = hit
        .metadata
        .get("contentId")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| hit.id.clone());

    match merged.get(&key) {
        Some(existing) if existing.final_score >= hit.final_score => {}
        _ => {
            merged.insert(key, hit);
        }
    }
}
