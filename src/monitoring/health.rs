//! Health roll-up (§4.I): cache + vector store + embedding provider +
//! memory fraction + rolling mean response time, combined into one status.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::cache::CacheManager;
use crate::embedding::EmbeddingService;
use crate::vector::VectorStore;

const RESPONSE_TIME_WINDOW_CAPACITY: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub status: HealthStatus,
    pub last_check: DateTime<Utc>,
    pub message: Option<String>,
    pub response_time_ms: Option<f64>,
}

/// Rolled-up snapshot returned to the (out-of-scope) HTTP layer.
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub status: HealthStatus,
    pub components: HashMap<String, ComponentHealth>,
    pub memory_fraction: f64,
    pub mean_response_time_ms: f64,
}

/// Tracks component health and a rolling window of recent response times.
pub struct HealthMonitor {
    components: Arc<RwLock<HashMap<String, ComponentHealth>>>,
    response_times: Arc<RwLock<VecDeque<f64>>>,
    max_memory_bytes: u64,
}

impl HealthMonitor {
    pub fn new(max_memory_bytes: u64) -> Self {
        Self {
            components: Arc::new(RwLock::new(HashMap::new())),
            response_times: Arc::new(RwLock::new(VecDeque::with_capacity(RESPONSE_TIME_WINDOW_CAPACITY))),
            max_memory_bytes,
        }
    }

    /// Records a completed query's processing time into the rolling window
    /// used for the health roll-up's mean-response-time component.
    pub async fn record_response_time(&self, elapsed_ms: f64) {
        let mut window = self.response_times.write().await;
        if window.len() >= RESPONSE_TIME_WINDOW_CAPACITY {
            window.pop_front();
        }
        window.push_back(elapsed_ms);
    }

    pub async fn mean_response_time_ms(&self) -> f64 {
        let window = self.response_times.read().await;
        if window.is_empty() {
            return 0.0;
        }
        window.iter().sum::<f64>() / window.len() as f64
    }

    async fn update_component(&self, name: &str, status: HealthStatus, message: Option<String>, response_time_ms: Option<f64>) {
        let mut components = self.components.write().await;
        components.insert(
            name.to_string(),
            ComponentHealth { status, last_check: Utc::now(), message, response_time_ms },
        );
    }

    async fn check_cache(&self, cache: &CacheManager) {
        let start = Instant::now();
        let healthy = cache.health_check().await;
        let elapsed = start.elapsed().as_secs_f64() * 1000.0;
        let status = if healthy { HealthStatus::Healthy } else { HealthStatus::Degraded };
        let message = if healthy { None } else { Some("cache backend did not respond to health check".to_string()) };
        self.update_component("cache", status, message, Some(elapsed)).await;
    }

    async fn check_vector_store(&self, vector_store: &dyn VectorStore) {
        let start = Instant::now();
        let healthy = vector_store.health_check().await;
        let elapsed = start.elapsed().as_secs_f64() * 1000.0;
        let status = if healthy { HealthStatus::Healthy } else { HealthStatus::Unhealthy };
        let message = if healthy { None } else { Some("vector store did not respond to health check".to_string()) };
        self.update_component("vector_store", status, message, Some(elapsed)).await;
    }

    async fn check_embedding_provider(&self, embedding: &EmbeddingService) {
        let start = Instant::now();
        let healthy = embedding.health_check().await;
        let elapsed = start.elapsed().as_secs_f64() * 1000.0;
        let status = if healthy { HealthStatus::Healthy } else { HealthStatus::Unhealthy };
        let message = if healthy { None } else { Some("embedding provider did not respond to health check".to_string()) };
        self.update_component("embedding_provider", status, message, Some(elapsed)).await;
    }

    /// Runs all component checks concurrently, then rolls them up into a
    /// single status (§4.I): unhealthy if any component is unhealthy, else
    /// degraded if any is degraded, else healthy.
    pub async fn comprehensive_check(
        &self,
        cache: &CacheManager,
        vector_store: &dyn VectorStore,
        embedding: &EmbeddingService,
    ) -> HealthSnapshot {
        tokio::join!(
            self.check_cache(cache),
            self.check_vector_store(vector_store),
            self.check_embedding_provider(embedding),
        );

        let cache_stats = cache.stats().await;
        let memory_fraction = if self.max_memory_bytes == 0 {
            0.0
        } else {
            (cache_stats.memory_bytes as f64 / self.max_memory_bytes as f64).min(1.0)
        };

        let components = self.components.read().await.clone();
        let mean_response_time_ms = self.mean_response_time_ms().await;
        let status = calculate_overall_status(&components, memory_fraction);

        HealthSnapshot { status, components, memory_fraction, mean_response_time_ms }
    }
}

/// Unhealthy if any tracked component is unhealthy or memory fraction is
/// saturated; degraded if any component is degraded; healthy otherwise.
fn calculate_overall_status(components: &HashMap<String, ComponentHealth>, memory_fraction: f64) -> HealthStatus {
    if memory_fraction >= 0.95 || components.values().any(|c| c.status == HealthStatus::Unhealthy) {
        return HealthStatus::Unhealthy;
    }
    if memory_fraction >= 0.8 || components.values().any(|c| c.status == HealthStatus::Degraded) {
        return HealthStatus::Degraded;
    }
    HealthStatus::Healthy
}
