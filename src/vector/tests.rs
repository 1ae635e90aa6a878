use super::*;
use crate::types::Metadata;
use serde_json::json;

#[test]
fn l2_normalization_maps_zero_distance_to_one() {
    assert!((normalize_score(DistanceMetric::L2, 0.0) - 1.0).abs() < 1e-6);
}

#[test]
fn l2_normalization_stays_in_unit_range_for_large_distance() {
    let score = normalize_score(DistanceMetric::L2, 1_000_000.0);
    assert!(score > 0.0 && score < 1.0);
}

#[test]
fn cosine_normalization_clamps_out_of_range_scores() {
    assert_eq!(normalize_score(DistanceMetric::Cosine, 1.5), 1.0);
    assert_eq!(normalize_score(DistanceMetric::Cosine, -0.2), 0.0);
}

#[test]
fn sort_hits_breaks_ties_by_lexicographic_id() {
    let mut hits = vec![
        SearchHit { id: "b".to_string(), score: 0.5, metadata: Metadata::new() },
        SearchHit { id: "a".to_string(), score: 0.5, metadata: Metadata::new() },
    ];
    sort_hits(&mut hits);
    assert_eq!(hits[0].id, "a");
    assert_eq!(hits[1].id, "b");
}

#[test]
fn filter_matches_requires_every_clause() {
    let mut metadata = Metadata::new();
    metadata.insert("category".to_string(), json!("docs"));
    metadata.insert("views".to_string(), json!(42));

    let filters = vec![
        Filter::new("category", FilterOperator::Eq, json!("docs")),
        Filter::new("views", FilterOperator::Gt, json!(10)),
    ];
    assert!(filter_matches(&metadata, &filters));

    let failing = vec![Filter::new("views", FilterOperator::Gt, json!(100))];
    assert!(!filter_matches(&metadata, &failing));
}

#[test]
fn validate_filter_field_rejects_sigil_prefixed_names() {
    assert!(validate_filter_field("$ne").is_err());
    assert!(validate_filter_field("category").is_ok());
}

#[tokio::test]
async fn flat_store_health_check_passes_when_empty() {
    let store = FlatVectorStore::new(4);
    assert!(store.health_check().await);
}
