//! Vector Store Adapter (spec component B).
//!
//! A narrow polymorphic capability over one of several vector back-ends:
//! store id -> vector + metadata, answer top-K queries with an optional
//! metadata filter, upsert, delete, report index stats. Variants
//! `{flat-in-memory, managed-service-A (Postgres/pgvector), managed-service-B
//! (Redis)}`, dispatched through a small match in `VectorStoreHandle`
//! (§9 pluggable-back-end design note), mirroring the teacher's
//! `database::DatabaseManager` delegation shape.

mod flat;
mod postgres;
mod redis;

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::config::VectorDatabaseConfig;
use crate::error::{CoreError, CoreResult};
use crate::types::{Filter, FilterOperator, Metadata, SearchHit, VectorRecord};

pub use flat::FlatVectorStore;
pub use postgres::PostgresVectorStore;
pub use redis::RedisVectorStore;

/// Distance metric the back-end was configured with; determines how raw
/// scores are normalized to [0,1] with "higher is better".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceMetric {
    L2,
    InnerProduct,
    Cosine,
}

impl DistanceMetric {
    pub fn parse(s: &str) -> Self {
        match s {
            "l2" => DistanceMetric::L2,
            "inner-product" => DistanceMetric::InnerProduct,
            _ => DistanceMetric::Cosine,
        }
    }
}

/// `search()` parameters (§4.B).
#[derive(Debug, Clone, Default)]
pub struct SearchParams {
    pub top_k: usize,
    pub filter: Vec<Filter>,
    pub include_metadata: bool,
    pub score_threshold: Option<f32>,
}

/// `stats()` response.
#[derive(Debug, Clone)]
pub struct VectorStoreStats {
    pub vector_count: u64,
    pub dim: usize,
    pub index_tag: String,
    pub last_updated: DateTime<Utc>,
    pub bytes: Option<u64>,
}

/// Capability set every vector back-end variant implements.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Idempotent. Fails with `Connection` if the back-end is unreachable
    /// or required config is missing.
    async fn initialize(&self) -> CoreResult<()>;

    /// Atomic per record.
    async fn upsert(&self, records: Vec<VectorRecord>) -> CoreResult<()>;

    async fn delete(&self, ids: &[String]) -> CoreResult<()>;

    /// Ordered descending by final score; ties broken by lexicographic id.
    async fn search(&self, vector: &[f32], params: SearchParams) -> CoreResult<Vec<SearchHit>>;

    async fn stats(&self) -> CoreResult<VectorStoreStats>;

    /// Healthy iff `initialize` and `stats` both succeed.
    async fn health_check(&self) -> bool {
        self.initialize().await.is_ok() && self.stats().await.is_ok()
    }
}

/// L2 back-ends normalize via `1 / (1 + distance)`; cosine/inner-product
/// back-ends use the raw back-end score, clamped to [0,1].
pub fn normalize_score(metric: DistanceMetric, raw: f32) -> f32 {
    match metric {
        DistanceMetric::L2 => 1.0 / (1.0 + raw.max(0.0)),
        DistanceMetric::Cosine | DistanceMetric::InnerProduct => raw.clamp(0.0, 1.0),
    }
}

/// Final sort imposed by every variant: score desc, then id asc for ties.
pub fn sort_hits(hits: &mut Vec<SearchHit>) {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Reject metadata field names that collide with operator sigils before
/// they reach a back-end's native filter translator (§9 open question:
/// the source's Postgres filter builder injects filter keys directly;
/// this core rejects rather than silently mis-translating).
pub fn validate_filter_field(field: &str) -> CoreResult<()> {
    if field.starts_with('$') {
        return Err(CoreError::Validation(format!(
            "metadata field '{field}' collides with a reserved operator sigil"
        )));
    }
    Ok(())
}

/// In-process filter evaluation shared by the flat and Redis variants
/// (Postgres translates filters into SQL instead; see `postgres.rs`).
pub fn filter_matches(metadata: &Metadata, filters: &[Filter]) -> bool {
    filters.iter().all(|f| match metadata.get(&f.field) {
        Some(actual) => apply_operator(f.operator, actual, &f.value),
        None => false,
    })
}

fn apply_operator(op: FilterOperator, actual: &serde_json::Value, expected: &serde_json::Value) -> bool {
    use serde_json::Value;
    match op {
        FilterOperator::Eq => actual == expected,
        FilterOperator::Ne => actual != expected,
        FilterOperator::In => expected
            .as_array()
            .map(|arr| arr.contains(actual))
            .unwrap_or(false),
        FilterOperator::Contains => match (actual, expected) {
            (Value::String(a), Value::String(e)) => a.contains(e.as_str()),
            (Value::Array(a), e) => a.contains(e),
            _ => false,
        },
        FilterOperator::Gt | FilterOperator::Lt | FilterOperator::Gte | FilterOperator::Lte => {
            match (actual.as_f64(), expected.as_f64()) {
                (Some(a), Some(e)) => match op {
                    FilterOperator::Gt => a > e,
                    FilterOperator::Lt => a < e,
                    FilterOperator::Gte => a >= e,
                    FilterOperator::Lte => a <= e,
                    _ => unreachable!(),
                },
                _ => match (actual.as_str(), expected.as_str()) {
                    (Some(a), Some(e)) => match op {
                        FilterOperator::Gt => a > e,
                        FilterOperator::Lt => a < e,
                        FilterOperator::Gte => a >= e,
                        FilterOperator::Lte => a <= e,
                        _ => unreachable!(),
                    },
                    _ => false,
                },
            }
        }
    }
}

/// Constructs the configured variant from config, matching the teacher's
/// `DatabaseManager::new` dispatch shape.
pub async fn build_vector_store(
    config: &VectorDatabaseConfig,
) -> CoreResult<Box<dyn VectorStore>> {
    match config.provider.as_str() {
        "postgres" | "pgvector" => Ok(Box::new(PostgresVectorStore::new(config).await?)),
        "redis" => Ok(Box::new(RedisVectorStore::new(config).await?)),
        _ => Ok(Box::new(FlatVectorStore::new(config.dimension))),
    }
}
