use super::CacheManager;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct Payload {
    text: String,
}

#[tokio::test]
async fn round_trip_through_manager_counts_hit() {
    let manager = CacheManager::new_memory(16);
    let key = CacheManager::query_key("deadbeef");
    manager
        .set(&key, &Payload { text: "hi".to_string() }, 60)
        .await;

    let got: Option<Payload> = manager.get(&key).await;
    assert_eq!(got, Some(Payload { text: "hi".to_string() }));

    let stats = manager.stats().await;
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 0);
}

#[tokio::test]
async fn miss_on_absent_key_is_counted() {
    let manager = CacheManager::new_memory(16);
    let got: Option<Payload> = manager.get("content:missing").await;
    assert_eq!(got, None);
    let stats = manager.stats().await;
    assert_eq!(stats.misses, 1);
}

#[tokio::test]
async fn mget_reports_independent_hit_miss_per_slot() {
    let manager = CacheManager::new_memory(16);
    manager
        .set(
            &CacheManager::embedding_key("local", "minilm", "abc123"),
            &Payload { text: "v".to_string() },
            60,
        )
        .await;

    let keys = vec![
        CacheManager::embedding_key("local", "minilm", "abc123"),
        CacheManager::embedding_key("local", "minilm", "zzz999"),
    ];
    let results: Vec<(String, Option<Payload>)> = manager.mget(&keys).await;
    assert!(results[0].1.is_some());
    assert!(results[1].1.is_none());
}

#[tokio::test]
async fn invalidate_only_removes_matching_prefix() {
    let manager = CacheManager::new_memory(16);
    manager.set(&CacheManager::content_key("a"), &1u32, 60).await;
    manager.set(&CacheManager::content_key("b"), &2u32, 60).await;
    manager.set(&CacheManager::query_key("fp"), &3u32, 60).await;

    let removed = manager.invalidate("content:").await;
    assert_eq!(removed, 2);

    let still_there: Option<u32> = manager.get(&CacheManager::query_key("fp")).await;
    assert_eq!(still_there, Some(3));
}

#[tokio::test]
async fn clear_resets_stats_and_entries() {
    let manager = CacheManager::new_memory(16);
    manager.set("content:x", &1u32, 60).await;
    let _: Option<u32> = manager.get("content:x").await;
    manager.clear().await;

    let stats = manager.stats().await;
    assert_eq!(stats.hits, 0);
    assert_eq!(stats.misses, 0);
    assert_eq!(stats.keys, 0);
}

#[tokio::test]
async fn health_check_passes_for_memory_backend() {
    let manager = CacheManager::new_memory(4);
    assert!(manager.health_check().await);
}

#[test]
fn hit_rate_is_zero_with_no_activity() {
    let stats = super::CacheStats::default();
    assert_eq!(stats.hit_rate(), 0.0);
}

#[tokio::test]
async fn stats_report_hit_rate_after_mixed_access() {
    let manager = CacheManager::new_memory(16);
    manager.set("content:x", &1u32, 60).await;
    let _: Option<u32> = manager.get("content:x").await;
    let _: Option<u32> = manager.get("content:missing").await;

    let stats = manager.stats().await;
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
    assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
}
