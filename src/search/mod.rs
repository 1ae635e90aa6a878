//! Search Engine (spec component G): semantic search over the vector
//! adapter, keyword scoring, hybrid fusion, and diversity re-ranking,
//! guarded by a circuit breaker and retry executor.
//!
//! Graceful degradation is realized two ways, not as a literal port of
//! the teacher's Redis-vs-Postgres `SearchMode` tiering (which doesn't
//! map onto the unified `VectorStore` abstraction): the circuit breaker
//! fails fast on a tripped vector-backend or embedding-provider circuit,
//! and the orchestrator (processor module) tolerates partial per-source
//! failures in its fan-out. Keyword scoring runs over metadata already
//! held in memory from the semantic pass, so it has no external failure
//! mode to degrade from.

pub mod circuit_breaker;
pub mod diversity;
pub mod hybrid;
pub mod keyword;
pub mod retry;
pub mod semantic;

#[cfg(test)]
mod tests;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats, CircuitState};
pub use retry::{RetryConfig, RetryExecutor};

use crate::error::CoreResult;
use crate::types::RankedResult;
use crate::vector::{SearchParams, VectorStore};

/// Runs the full pass: semantic search against `store`, keyword scoring
/// against `keywords`, hybrid fusion with `vector_weight`/`keyword_weight`,
/// and greedy diversity re-rank down to `top_k`.
#[allow(clippy::too_many_arguments)]
pub async fn hybrid_search(
    store: &dyn VectorStore,
    query_vector: &[f32],
    query_text: &str,
    keywords: &[String],
    params: SearchParams,
    vector_weight: f32,
    keyword_weight: f32,
    top_k: usize,
) -> CoreResult<Vec<RankedResult>> {
    let mut ranked = semantic::semantic_search(store, query_vector, query_text, params).await?;
    keyword::apply_keyword_scores(&mut ranked, keywords);
    hybrid::fuse_and_sort_weighted(&mut ranked, vector_weight, keyword_weight);
    Ok(diversity::diversify(ranked, top_k))
}
