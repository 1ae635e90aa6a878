//! Prometheus registry and collectors (§4.I, §8): per-query response time,
//! cache hit rate, admission-table size, circuit-breaker state per backend.

use std::sync::Arc;
use std::time::Instant;

use prometheus::{Counter, Encoder, Gauge, Histogram, HistogramOpts, Registry, TextEncoder};

use crate::error::CoreError;

/// Prometheus registry plus the collectors it owns.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Arc<Registry>,
    pub metrics: Arc<Metrics>,
}

/// All counters/histograms/gauges the core publishes.
pub struct Metrics {
    pub query_total: Counter,
    pub query_duration_seconds: Histogram,
    pub query_errors_total: Counter,
    pub query_cache_hits_total: Counter,

    pub cache_hits_total: Counter,
    pub cache_misses_total: Counter,
    pub cache_hit_ratio: Gauge,

    pub embedding_duration_seconds: Histogram,
    pub vector_search_duration_seconds: Histogram,

    pub admission_table_size: Gauge,
    pub admission_rejections_total: Counter,

    pub circuit_breaker_vector_backend_state: Gauge,
    pub circuit_breaker_embedding_provider_state: Gauge,

    pub component_health_status: Gauge,
}

fn metric_error(name: &str, e: impl std::fmt::Display) -> CoreError {
    CoreError::Processing(format!("failed to create/register metric '{name}': {e}"))
}

impl MetricsRegistry {
    pub fn new() -> Result<Self, CoreError> {
        let registry = Arc::new(Registry::new());
        let metrics = Arc::new(Metrics::new(&registry)?);
        Ok(Self { registry, metrics })
    }

    /// Metrics in Prometheus text exposition format, for the `/metrics`
    /// route the HTTP layer (out of scope) mounts.
    pub fn gather(&self) -> Result<String, CoreError> {
        let encoder = TextEncoder::new();
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&families, &mut buffer)
            .map_err(|e| metric_error("gather", e))?;
        String::from_utf8(buffer).map_err(|e| metric_error("gather/utf8", e))
    }
}

impl Metrics {
    fn new(registry: &Registry) -> Result<Self, CoreError> {
        let query_total = Counter::new("query_total", "Total number of queries processed")
            .map_err(|e| metric_error("query_total", e))?;
        let query_duration_seconds = Histogram::with_opts(
            HistogramOpts::new("query_duration_seconds", "Query processing duration in seconds")
                .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
        )
        .map_err(|e| metric_error("query_duration_seconds", e))?;
        let query_errors_total = Counter::new("query_errors_total", "Total number of queries that surfaced an error")
            .map_err(|e| metric_error("query_errors_total", e))?;
        let query_cache_hits_total = Counter::new("query_cache_hits_total", "Total number of query-result cache hits")
            .map_err(|e| metric_error("query_cache_hits_total", e))?;

        let cache_hits_total = Counter::new("cache_hits_total", "Total cache store hits across all key spaces")
            .map_err(|e| metric_error("cache_hits_total", e))?;
        let cache_misses_total = Counter::new("cache_misses_total", "Total cache store misses across all key spaces")
            .map_err(|e| metric_error("cache_misses_total", e))?;
        let cache_hit_ratio = Gauge::new("cache_hit_ratio", "Most recently observed cache hit ratio")
            .map_err(|e| metric_error("cache_hit_ratio", e))?;

        let embedding_duration_seconds = Histogram::with_opts(
            HistogramOpts::new("embedding_duration_seconds", "Embedding provider call duration in seconds")
                .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5]),
        )
        .map_err(|e| metric_error("embedding_duration_seconds", e))?;
        let vector_search_duration_seconds = Histogram::with_opts(
            HistogramOpts::new("vector_search_duration_seconds", "Per-source vector search duration in seconds")
                .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
        )
        .map_err(|e| metric_error("vector_search_duration_seconds", e))?;

        let admission_table_size = Gauge::new("admission_table_size", "Current number of in-flight queries")
            .map_err(|e| metric_error("admission_table_size", e))?;
        let admission_rejections_total = Counter::new("admission_rejections_total", "Total queries rejected at admission")
            .map_err(|e| metric_error("admission_rejections_total", e))?;

        let circuit_breaker_vector_backend_state = Gauge::new(
            "circuit_breaker_vector_backend_state",
            "Vector backend circuit breaker state (0=closed, 1=open, 2=half-open)",
        )
        .map_err(|e| metric_error("circuit_breaker_vector_backend_state", e))?;
        let circuit_breaker_embedding_provider_state = Gauge::new(
            "circuit_breaker_embedding_provider_state",
            "Embedding provider circuit breaker state (0=closed, 1=open, 2=half-open)",
        )
        .map_err(|e| metric_error("circuit_breaker_embedding_provider_state", e))?;

        let component_health_status = Gauge::new("component_health_status", "Rolled-up health status (1=healthy, 0.5=degraded, 0=unhealthy)")
            .map_err(|e| metric_error("component_health_status", e))?;

        for collector in [
            Box::new(query_total.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(query_duration_seconds.clone()),
            Box::new(query_errors_total.clone()),
            Box::new(query_cache_hits_total.clone()),
            Box::new(cache_hits_total.clone()),
            Box::new(cache_misses_total.clone()),
            Box::new(cache_hit_ratio.clone()),
            Box::new(embedding_duration_seconds.clone()),
            Box::new(vector_search_duration_seconds.clone()),
            Box::new(admission_table_size.clone()),
            Box::new(admission_rejections_total.clone()),
            Box::new(circuit_breaker_vector_backend_state.clone()),
            Box::new(circuit_breaker_embedding_provider_state.clone()),
            Box::new(component_health_status.clone()),
        ] {
            registry.register(collector).map_err(|e| metric_error("register", e))?;
        }

        Ok(Self {
            query_total,
            query_duration_seconds,
            query_errors_total,
            query_cache_hits_total,
            cache_hits_total,
            cache_misses_total,
            cache_hit_ratio,
            embedding_duration_seconds,
            vector_search_duration_seconds,
            admission_table_size,
            admission_rejections_total,
            circuit_breaker_vector_backend_state,
            circuit_breaker_embedding_provider_state,
            component_health_status,
        })
    }
}

/// Times a histogram-backed operation; observes on drop-free `finish()`.
pub struct Timer {
    start: Instant,
    histogram: Histogram,
}

impl Timer {
    pub fn new(histogram: Histogram) -> Self {
        Self { start: Instant::now(), histogram }
    }

    pub fn finish(self) {
        self.histogram.observe(self.start.elapsed().as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_gathers_registered_metric_names() {
        let registry = MetricsRegistry::new().unwrap();
        registry.metrics.query_total.inc();
        registry.metrics.admission_table_size.set(3.0);
        let output = registry.gather().unwrap();
        assert!(output.contains("query_total"));
        assert!(output.contains("admission_table_size"));
    }

    #[test]
    fn timer_observes_elapsed_duration() {
        let registry = MetricsRegistry::new().unwrap();
        let timer = Timer::new(registry.metrics.query_duration_seconds.clone());
        std::thread::sleep(std::time::Duration::from_millis(1));
        timer.finish();
        let output = registry.gather().unwrap();
        assert!(output.contains("query_duration_seconds"));
    }
}
