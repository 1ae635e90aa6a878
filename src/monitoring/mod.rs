//! Cache-Warming & Monitoring (spec component I) plus the ambient
//! observability stack: metrics, tracing/logging, health roll-up, and
//! popularity-driven cache warming.

pub mod health;
pub mod metrics;
pub mod tracing;
pub mod warming;

use std::sync::Arc;

use crate::cache::CacheManager;
use crate::config::Config;
use crate::embedding::EmbeddingService;
use crate::error::CoreResult;
use crate::vector::VectorStore;

pub use health::{HealthMonitor, HealthSnapshot, HealthStatus};
pub use metrics::{Metrics, MetricsRegistry, Timer};
pub use warming::CacheWarmer;

/// Bundles the observability collaborators `main` wires up once at startup.
pub struct MonitoringService {
    pub metrics: MetricsRegistry,
    pub health: HealthMonitor,
    pub warmer: CacheWarmer,
}

impl MonitoringService {
    pub fn new(config: &Config, cache: Arc<CacheManager>) -> CoreResult<Self> {
        let metrics = MetricsRegistry::new()?;
        let health = HealthMonitor::new(config.cache.max_memory_bytes);
        let warmer = CacheWarmer::new(cache, DEFAULT_POPULARITY_THRESHOLD, DEFAULT_MAX_AGE_SECS);
        Ok(Self { metrics, health, warmer })
    }

    /// Installs the global tracing subscriber. Call once, before any other
    /// component starts logging.
    pub fn init_tracing(config: &Config) -> CoreResult<()> {
        tracing::init_tracing(&config.monitoring.logging)
    }

    /// Records a completed query into both the metrics registry and the
    /// health monitor's rolling response-time window, then folds it into
    /// the cache warmer's popularity tracking. The single call site
    /// `QueryProcessor::process` should reach for after every query.
    pub async fn record_query_completion(
        &self,
        fingerprint: &str,
        processing_time_ms: u64,
        cached: bool,
        sources: &[String],
        succeeded: bool,
    ) {
        self.metrics.metrics.query_total.inc();
        self.metrics.metrics.query_duration_seconds.observe(processing_time_ms as f64 / 1000.0);
        if cached {
            self.metrics.metrics.query_cache_hits_total.inc();
        }
        if !succeeded {
            self.metrics.metrics.query_errors_total.inc();
        }

        self.health.record_response_time(processing_time_ms as f64).await;
        if !cached {
            self.warmer.record(fingerprint, processing_time_ms as f64, sources);
        }
    }

    /// Feeds the two circuit-breaker gauges from the processor's most
    /// recent `CircuitBreakerStats` snapshot (0=closed, 1=open,
    /// 2=half-open).
    pub fn record_circuit_breaker_state(&self, vector_backend_state: f64, embedding_provider_state: f64) {
        self.metrics.metrics.circuit_breaker_vector_backend_state.set(vector_backend_state);
        self.metrics.metrics.circuit_breaker_embedding_provider_state.set(embedding_provider_state);
    }

    pub async fn health_snapshot(
        &self,
        cache: &CacheManager,
        vector_store: &dyn VectorStore,
        embedding: &EmbeddingService,
    ) -> HealthSnapshot {
        self.health.comprehensive_check(cache, vector_store, embedding).await
    }
}

const DEFAULT_POPULARITY_THRESHOLD: u64 = 5;
const DEFAULT_MAX_AGE_SECS: i64 = 24 * 60 * 60;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monitoring_service_builds_from_default_config() {
        let config = Config::default();
        let cache = Arc::new(CacheManager::new_memory(16));
        let service = MonitoringService::new(&config, cache);
        assert!(service.is_ok());
    }

    #[test]
    fn record_circuit_breaker_state_sets_both_gauges() {
        let config = Config::default();
        let cache = Arc::new(CacheManager::new_memory(16));
        let service = MonitoringService::new(&config, cache).unwrap();

        service.record_circuit_breaker_state(1.0, 2.0);

        let output = service.metrics.gather().unwrap();
        assert!(output.contains("circuit_breaker_vector_backend_state 1"));
        assert!(output.contains("circuit_breaker_embedding_provider_state 2"));
    }

    #[tokio::test]
    async fn record_query_completion_updates_metrics_and_warmer() {
        let config = Config::default();
        let cache = Arc::new(CacheManager::new_memory(16));
        let service = MonitoringService::new(&config, cache).unwrap();
        service.record_query_completion("fp1", 42, false, &["src-a".to_string()], true).await;
        assert_eq!(service.warmer.tracked_fingerprints(), 1);
        let mean = service.health.mean_response_time_ms().await;
        assert!((mean - 42.0).abs() < 1e-9);
    }
}
