use serde_json::json;

use super::*;
use crate::types::{Metadata, VectorRecord};
use crate::vector::FlatVectorStore;

fn metadata(title: &str, source_id: &str, category: &str) -> Metadata {
    let mut m = Metadata::new();
    m.insert("title".to_string(), json!(title));
    m.insert("sourceId".to_string(), json!(source_id));
    m.insert("category".to_string(), json!(category));
    m
}

async fn seeded_store() -> FlatVectorStore {
    let store = FlatVectorStore::new(3);
    store
        .upsert(vec![
            VectorRecord { id: "rust-1".to_string(), vector: vec![1.0, 0.0, 0.0], metadata: metadata("Rust Guide", "s1", "docs") },
            VectorRecord { id: "rust-2".to_string(), vector: vec![0.9, 0.1, 0.0], metadata: metadata("Rust Advanced", "s1", "docs") },
            VectorRecord { id: "cooking-1".to_string(), vector: vec![0.0, 1.0, 0.0], metadata: metadata("Cooking Basics", "s2", "food") },
        ])
        .await
        .unwrap();
    store
}

#[tokio::test]
async fn hybrid_search_ranks_and_diversifies() {
    let store = seeded_store().await;
    let params = SearchParams { top_k: 3, include_metadata: true, ..Default::default() };
    let results = hybrid_search(
        &store,
        &[1.0, 0.0, 0.0],
        "rust",
        &keyword::tokenize("rust"),
        params,
        hybrid::DEFAULT_VECTOR_WEIGHT,
        hybrid::DEFAULT_KEYWORD_WEIGHT,
        2,
    )
    .await
    .unwrap();

    assert!(results.len() <= 2);
    assert_eq!(results[0].id, "rust-1");
}

#[tokio::test]
async fn hybrid_search_deduplicates_by_source_and_category_when_possible() {
    let store = seeded_store().await;
    let params = SearchParams { top_k: 3, include_metadata: true, ..Default::default() };
    let results = hybrid_search(
        &store,
        &[1.0, 0.0, 0.0],
        "rust",
        &[],
        params,
        hybrid::DEFAULT_VECTOR_WEIGHT,
        hybrid::DEFAULT_KEYWORD_WEIGHT,
        3,
    )
    .await
    .unwrap();

    assert_eq!(results.len(), 3);
}

#[tokio::test]
async fn circuit_breaker_and_retry_executor_compose_around_a_search_call() {
    let store = seeded_store().await;
    let breaker = CircuitBreaker::new();
    let executor = RetryExecutor::with_exponential_backoff();

    let result = executor
        .execute(|| async {
            if breaker.is_vector_backend_circuit_open().await {
                return Err(crate::error::CoreError::Connection("circuit open".to_string()));
            }
            match store.search(&[1.0, 0.0, 0.0], SearchParams { top_k: 1, ..Default::default() }).await {
                Ok(hits) => {
                    breaker.record_vector_backend_success().await;
                    Ok(hits)
                }
                Err(e) => {
                    breaker.record_vector_backend_failure().await;
                    Err(e)
                }
            }
        })
        .await;

    assert!(result.is_ok());
    assert_eq!(breaker.state(), CircuitState::Closed);
}
