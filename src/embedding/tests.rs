use std::sync::Arc;

use crate::config::EmbeddingConfig;

use super::*;

fn test_config() -> EmbeddingConfig {
    EmbeddingConfig {
        provider: "local".to_string(),
        model: "test-model".to_string(),
        api_key: None,
        dimension: 16,
        batch_size: 2,
        timeout_ms: 1000,
        cache_enabled: true,
        cache_ttl_secs: 60,
        max_tokens: 4,
    }
}

#[tokio::test]
async fn embed_returns_vector_of_configured_dimension() {
    let service = EmbeddingService::new(test_config(), None);
    let embedding = service.embed("hello world").await.unwrap();
    assert_eq!(embedding.vector.len(), 16);
    assert!(!embedding.cached);
}

#[tokio::test]
async fn embed_truncates_to_max_tokens_times_four_chars() {
    let service = EmbeddingService::new(test_config(), None);
    let long_text = "a".repeat(100);
    let embedding = service.embed(&long_text).await.unwrap();
    assert_eq!(embedding.text.len(), 16);
}

#[tokio::test]
async fn embed_hits_cache_on_second_call() {
    let cache = Arc::new(CacheManager::new_memory(64));
    let service = EmbeddingService::new(test_config(), Some(cache));

    let first = service.embed("repeat me").await.unwrap();
    assert!(!first.cached);

    let second = service.embed("repeat me").await.unwrap();
    assert!(second.cached);
    assert_eq!(first.vector, second.vector);
}

#[tokio::test]
async fn embed_batch_preserves_order_and_sub_batches() {
    let service = EmbeddingService::new(test_config(), None);
    let texts = vec!["one".to_string(), "two".to_string(), "three".to_string()];
    let embeddings = service.embed_batch(&texts).await.unwrap();
    assert_eq!(embeddings.len(), 3);
    assert_eq!(embeddings[0].text, "one");
    assert_eq!(embeddings[1].text, "two");
    assert_eq!(embeddings[2].text, "three");
}

#[tokio::test]
async fn embed_batch_marks_cached_items_without_reinvoking_provider() {
    let cache = Arc::new(CacheManager::new_memory(64));
    let service = EmbeddingService::new(test_config(), Some(cache));

    service.embed("warm").await.unwrap();
    let batch = service
        .embed_batch(&["warm".to_string(), "cold".to_string()])
        .await
        .unwrap();
    assert!(batch[0].cached);
    assert!(!batch[1].cached);
}

#[tokio::test]
async fn health_check_reports_healthy_by_default() {
    let service = EmbeddingService::new(test_config(), None);
    assert!(service.health_check().await);
}

#[tokio::test]
async fn cache_disabled_in_config_skips_cache_even_when_provided() {
    let cache = Arc::new(CacheManager::new_memory(64));
    let mut config = test_config();
    config.cache_enabled = false;
    let service = EmbeddingService::new(config, Some(cache));

    service.embed("no cache please").await.unwrap();
    let second = service.embed("no cache please").await.unwrap();
    assert!(!second.cached);
}
