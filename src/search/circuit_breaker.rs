//! Circuit breaker for vector-backend and embedding-provider failure
//! tracking and state management (SPEC_FULL "Circuit breaker +
//! exponential-backoff retry").
//!
//! A vector backend (Postgres, Redis, or the in-memory fallback) and an
//! embedding provider fail in different ways and at different rates: an
//! embedding provider is typically a rate-limited external API that starts
//! throttling within a handful of calls, while a vector backend is a
//! connection-pooled database that tolerates more transient blips before
//! it's worth failing fast. The two are tracked as independent breakers
//! with independent defaults rather than one shared failure counter.

use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CircuitState {
    Closed = 0,
    Open = 1,
    HalfOpen = 2,
}

impl From<u8> for CircuitState {
    fn from(value: u8) -> Self {
        match value {
            0 => CircuitState::Closed,
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub recovery_timeout: Duration,
    pub success_threshold: u32,
    pub failure_window: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(30),
            success_threshold: 3,
            failure_window: Duration::from_secs(60),
        }
    }
}

impl CircuitBreakerConfig {
    /// Embedding providers are rate-limited HTTP APIs that tend to fail in
    /// clusters; trip after fewer failures and probe recovery sooner than
    /// the vector-backend default.
    pub fn for_embedding_provider() -> Self {
        Self {
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(10),
            success_threshold: 2,
            failure_window: Duration::from_secs(30),
        }
    }
}

/// One independently-tracked breaker. `CircuitBreaker` owns two of these.
struct Breaker {
    state: AtomicU8,
    failures: AtomicU32,
    success_count: AtomicU32,
    config: CircuitBreakerConfig,
    last_state_change: RwLock<Instant>,
    failure_timestamps: RwLock<Vec<Instant>>,
}

impl Breaker {
    fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            state: AtomicU8::new(CircuitState::Closed as u8),
            failures: AtomicU32::new(0),
            success_count: AtomicU32::new(0),
            config,
            last_state_change: RwLock::new(Instant::now()),
            failure_timestamps: RwLock::new(Vec::new()),
        }
    }

    fn state(&self) -> CircuitState {
        CircuitState::from(self.state.load(Ordering::Acquire))
    }

    async fn is_open(&self, label: &str) -> bool {
        match self.state() {
            CircuitState::Closed => false,
            CircuitState::Open => {
                let last_change = *self.last_state_change.read().await;
                if last_change.elapsed() >= self.config.recovery_timeout {
                    self.transition_to_half_open(label).await;
                    false
                } else {
                    true
                }
            }
            CircuitState::HalfOpen => false,
        }
    }

    async fn record_success(&self, label: &str) {
        match self.state() {
            CircuitState::Closed => {
                self.failures.store(0, Ordering::Release);
                self.clear_old_failures().await;
            }
            CircuitState::HalfOpen => {
                let success_count = self.success_count.fetch_add(1, Ordering::AcqRel) + 1;
                info!("circuit breaker: {label} success in HalfOpen ({success_count}/{})", self.config.success_threshold);
                if success_count >= self.config.success_threshold {
                    self.transition_to_closed(label).await;
                }
            }
            CircuitState::Open => warn!("circuit breaker: {label} success while Open, ignoring"),
        }
    }

    async fn record_failure(&self, label: &str) {
        let current_state = self.state();
        self.failure_timestamps.write().await.push(Instant::now());
        let failure_count = self.failures.fetch_add(1, Ordering::AcqRel) + 1;

        match current_state {
            CircuitState::Closed => {
                self.clear_old_failures().await;
                let recent = self.recent_failures().await;
                warn!("circuit breaker: {label} failure recorded ({recent} recent)");
                if recent >= self.config.failure_threshold {
                    self.transition_to_open(label).await;
                }
            }
            CircuitState::HalfOpen => {
                warn!("circuit breaker: {label} failure in HalfOpen, reopening");
                self.transition_to_open(label).await;
            }
            CircuitState::Open => debug!("circuit breaker: {label} additional failure while Open (total: {failure_count})"),
        }
    }

    async fn recent_failures(&self) -> u32 {
        let cutoff = Instant::now() - self.config.failure_window;
        self.failure_timestamps.read().await.iter().filter(|&&t| t > cutoff).count() as u32
    }

    async fn clear_old_failures(&self) {
        let cutoff = Instant::now() - self.config.failure_window;
        self.failure_timestamps.write().await.retain(|&t| t > cutoff);
    }

    async fn transition_to_open(&self, label: &str) {
        let old = CircuitState::from(self.state.swap(CircuitState::Open as u8, Ordering::AcqRel));
        if old != CircuitState::Open {
            *self.last_state_change.write().await = Instant::now();
            self.success_count.store(0, Ordering::Release);
            warn!("circuit breaker: {label} transitioned from {old:?} to Open");
        }
    }

    async fn transition_to_half_open(&self, label: &str) {
        let old = CircuitState::from(self.state.swap(CircuitState::HalfOpen as u8, Ordering::AcqRel));
        if old != CircuitState::HalfOpen {
            *self.last_state_change.write().await = Instant::now();
            self.success_count.store(0, Ordering::Release);
            info!("circuit breaker: {label} transitioned from {old:?} to HalfOpen");
        }
    }

    async fn transition_to_closed(&self, label: &str) {
        let old = CircuitState::from(self.state.swap(CircuitState::Closed as u8, Ordering::AcqRel));
        if old != CircuitState::Closed {
            *self.last_state_change.write().await = Instant::now();
            self.failures.store(0, Ordering::Release);
            self.success_count.store(0, Ordering::Release);
            self.failure_timestamps.write().await.clear();
            info!("circuit breaker: {label} transitioned from {old:?} to Closed");
        }
    }
}

/// Two independent breakers, one per collaborator the Search Orchestrator's
/// fan-out depends on.
pub struct CircuitBreaker {
    vector_backend: Breaker,
    embedding_provider: Breaker,
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self::with_configs(CircuitBreakerConfig::default(), CircuitBreakerConfig::for_embedding_provider())
    }

    /// Applies a custom config to the vector-backend breaker only; the
    /// embedding-provider breaker keeps its own domain default.
    pub fn with_config(vector_backend_config: CircuitBreakerConfig) -> Self {
        Self::with_configs(vector_backend_config, CircuitBreakerConfig::for_embedding_provider())
    }

    pub fn with_configs(vector_backend_config: CircuitBreakerConfig, embedding_provider_config: CircuitBreakerConfig) -> Self {
        Self {
            vector_backend: Breaker::new(vector_backend_config),
            embedding_provider: Breaker::new(embedding_provider_config),
        }
    }

    pub fn state(&self) -> CircuitState {
        self.vector_backend.state()
    }

    pub fn embedding_provider_state(&self) -> CircuitState {
        self.embedding_provider.state()
    }

    pub async fn is_vector_backend_circuit_open(&self) -> bool {
        self.vector_backend.is_open("vector backend").await
    }

    pub async fn is_embedding_provider_circuit_open(&self) -> bool {
        self.embedding_provider.is_open("embedding provider").await
    }

    pub async fn record_vector_backend_success(&self) {
        self.vector_backend.record_success("vector backend").await
    }

    pub async fn record_vector_backend_failure(&self) {
        self.vector_backend.record_failure("vector backend").await
    }

    pub async fn record_embedding_provider_success(&self) {
        self.embedding_provider.record_success("embedding provider").await
    }

    pub async fn record_embedding_provider_failure(&self) {
        self.embedding_provider.record_failure("embedding provider").await
    }

    pub async fn get_stats(&self) -> CircuitBreakerStats {
        CircuitBreakerStats {
            vector_backend_state: self.vector_backend.state(),
            embedding_provider_state: self.embedding_provider.state(),
            vector_backend_failures: self.vector_backend.failures.load(Ordering::Acquire),
            embedding_provider_failures: self.embedding_provider.failures.load(Ordering::Acquire),
            vector_backend_recent_failures: self.vector_backend.recent_failures().await,
            vector_backend_success_count: self.vector_backend.success_count.load(Ordering::Acquire),
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerStats {
    pub vector_backend_state: CircuitState,
    pub embedding_provider_state: CircuitState,
    pub vector_backend_failures: u32,
    pub embedding_provider_failures: u32,
    pub vector_backend_recent_failures: u32,
    pub vector_backend_success_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    #[tokio::test]
    async fn both_breakers_start_closed() {
        let cb = CircuitBreaker::new();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.embedding_provider_state(), CircuitState::Closed);
        assert!(!cb.is_vector_backend_circuit_open().await);
        assert!(!cb.is_embedding_provider_circuit_open().await);
    }

    #[tokio::test]
    async fn embedding_provider_trips_faster_than_vector_backend_under_default_configs() {
        let cb = CircuitBreaker::new();

        // Three failures opens the embedding-provider breaker under its
        // lower domain-specific threshold, while the vector-backend
        // breaker (threshold 5) is still closed.
        cb.record_embedding_provider_failure().await;
        cb.record_embedding_provider_failure().await;
        cb.record_embedding_provider_failure().await;

        assert_eq!(cb.embedding_provider_state(), CircuitState::Open);
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn the_two_breakers_track_failures_independently() {
        let cb = CircuitBreaker::new();
        cb.record_vector_backend_failure().await;
        cb.record_embedding_provider_failure().await;
        cb.record_embedding_provider_failure().await;

        let stats = cb.get_stats().await;
        assert_eq!(stats.vector_backend_failures, 1);
        assert_eq!(stats.embedding_provider_failures, 2);
        assert_eq!(stats.vector_backend_state, CircuitState::Closed);
        assert_eq!(stats.embedding_provider_state, CircuitState::Closed);
    }

    #[tokio::test]
    async fn half_open_transition_after_recovery_timeout() {
        let cb = CircuitBreaker::with_config(CircuitBreakerConfig {
            failure_threshold: 2,
            recovery_timeout: Duration::from_millis(100),
            ..Default::default()
        });

        cb.record_vector_backend_failure().await;
        cb.record_vector_backend_failure().await;
        assert_eq!(cb.state(), CircuitState::Open);

        sleep(Duration::from_millis(150)).await;
        assert!(!cb.is_vector_backend_circuit_open().await);
        assert_eq!(cb.state(), CircuitState::HalfOpen);
    }

    #[tokio::test]
    async fn closes_after_success_threshold_in_half_open() {
        let cb = CircuitBreaker::with_config(CircuitBreakerConfig {
            failure_threshold: 2,
            recovery_timeout: Duration::from_millis(50),
            success_threshold: 2,
            ..Default::default()
        });

        cb.record_vector_backend_failure().await;
        cb.record_vector_backend_failure().await;
        sleep(Duration::from_millis(100)).await;
        cb.is_vector_backend_circuit_open().await;
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        cb.record_vector_backend_success().await;
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        cb.record_vector_backend_success().await;
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn reopens_on_half_open_failure() {
        let cb = CircuitBreaker::with_config(CircuitBreakerConfig {
            failure_threshold: 2,
            recovery_timeout: Duration::from_millis(50),
            ..Default::default()
        });

        cb.record_vector_backend_failure().await;
        cb.record_vector_backend_failure().await;
        sleep(Duration::from_millis(100)).await;
        cb.is_vector_backend_circuit_open().await;
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        cb.record_vector_backend_failure().await;
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn failure_window_drops_stale_failures() {
        let cb = CircuitBreaker::with_config(CircuitBreakerConfig {
            failure_threshold: 3,
            failure_window: Duration::from_millis(100),
            ..Default::default()
        });

        cb.record_vector_backend_failure().await;
        cb.record_vector_backend_failure().await;
        sleep(Duration::from_millis(150)).await;
        cb.record_vector_backend_failure().await;

        assert_eq!(cb.state(), CircuitState::Closed);
    }
}
