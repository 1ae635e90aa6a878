//! Semantic search pass (spec §4.G): embed, query the vector adapter, wrap
//! each hit as a Ranked Result, then apply the ranking-factor overlay
//! (metadata boost + recency boost) and re-sort.

use chrono::Utc;

use crate::error::CoreResult;
use crate::types::{Metadata, RankedResult, SearchHit};
use crate::vector::{SearchParams, VectorStore};

const METADATA_BOOST_WEIGHT: f32 = 0.1;
const RECENCY_BOOST_WEIGHT: f32 = 0.05;
const RECENCY_WINDOW_DAYS: i64 = 30;

/// `metadataBoost` in [0, 0.5]: title substring match contributes +0.3,
/// category/tags substring match +0.2.
fn metadata_boost(metadata: &Metadata, query_text: &str) -> f32 {
    let needle = query_text.to_lowercase();
    if needle.is_empty() {
        return 0.0;
    }

    let mut boost = 0.0f32;
    if let Some(title) = metadata.get("title").and_then(|v| v.as_str()) {
        if title.to_lowercase().contains(&needle) {
            boost += 0.3;
        }
    }

    let category_or_tags_match = metadata
        .get("category")
        .and_then(|v| v.as_str())
        .map(|c| c.to_lowercase().contains(&needle))
        .unwrap_or(false)
        || metadata
            .get("tags")
            .and_then(|v| v.as_array())
            .map(|tags| {
                tags.iter()
                    .filter_map(|t| t.as_str())
                    .any(|t| t.to_lowercase().contains(&needle))
            })
            .unwrap_or(false);
    if category_or_tags_match {
        boost += 0.2;
    }

    boost.min(0.5)
}

/// `recencyBoost` in [0, 0.2], linear decay over a 30-day window from
/// `metadata.modifiedAt || createdAt`.
fn recency_boost(metadata: &Metadata) -> f32 {
    let timestamp = metadata
        .get("modifiedAt")
        .or_else(|| metadata.get("createdAt"))
        .and_then(|v| v.as_str())
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok());

    let Some(timestamp) = timestamp else { return 0.0 };
    let age_days = (Utc::now() - timestamp.with_timezone(&Utc)).num_days();
    if age_days < 0 || age_days > RECENCY_WINDOW_DAYS {
        return 0.0;
    }

    let fraction = 1.0 - (age_days as f32 / RECENCY_WINDOW_DAYS as f32);
    (fraction * 0.2).clamp(0.0, 0.2)
}

fn apply_overlay(hit: SearchHit, query_text: &str) -> RankedResult {
    let mut ranked = RankedResult::from_hit(hit);
    let metadata_boost = metadata_boost(&ranked.metadata, query_text);
    let recency_boost = recency_boost(&ranked.metadata);

    ranked.factors.metadata = Some(metadata_boost);
    ranked.factors.recency = Some(recency_boost);
    ranked.final_score = (ranked.vector_score + metadata_boost * METADATA_BOOST_WEIGHT + recency_boost * RECENCY_BOOST_WEIGHT).min(1.0);
    ranked
}

/// Embeds `query_vector` against `store` and returns Ranked Results with
/// the overlay applied, re-sorted by final score.
pub async fn semantic_search(
    store: &dyn VectorStore,
    query_vector: &[f32],
    query_text: &str,
    params: SearchParams,
) -> CoreResult<Vec<RankedResult>> {
    let hits = store.search(query_vector, params).await?;
    let mut ranked: Vec<RankedResult> = hits.into_iter().map(|hit| apply_overlay(hit, query_text)).collect();
    ranked.sort_by(|a, b| {
        b.final_score
            .partial_cmp(&a.final_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    Ok(ranked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn metadata_with_title(title: &str) -> Metadata {
        let mut m = Metadata::new();
        m.insert("title".to_string(), json!(title));
        m
    }

    #[test]
    fn metadata_boost_rewards_title_substring_match() {
        let metadata = metadata_with_title("Rust Programming Guide");
        assert_eq!(metadata_boost(&metadata, "rust"), 0.3);
    }

    #[test]
    fn metadata_boost_caps_at_half() {
        let mut metadata = metadata_with_title("Rust Programming Guide");
        metadata.insert("category".to_string(), json!("rust"));
        assert_eq!(metadata_boost(&metadata, "rust"), 0.5);
    }

    #[test]
    fn metadata_boost_is_zero_for_no_match() {
        let metadata = metadata_with_title("Cooking Basics");
        assert_eq!(metadata_boost(&metadata, "rust"), 0.0);
    }

    #[test]
    fn recency_boost_is_zero_without_timestamp() {
        let metadata = Metadata::new();
        assert_eq!(recency_boost(&metadata), 0.0);
    }

    #[test]
    fn recency_boost_is_near_max_for_freshly_modified_content() {
        let mut metadata = Metadata::new();
        metadata.insert("modifiedAt".to_string(), json!(Utc::now().to_rfc3339()));
        let boost = recency_boost(&metadata);
        assert!(boost > 0.18 && boost <= 0.2);
    }

    #[test]
    fn recency_boost_is_zero_outside_thirty_day_window() {
        let mut metadata = Metadata::new();
        let old = Utc::now() - chrono::Duration::days(60);
        metadata.insert("createdAt".to_string(), json!(old.to_rfc3339()));
        assert_eq!(recency_boost(&metadata), 0.0);
    }

    #[test]
    fn overlay_clamps_final_score_to_one() {
        let hit = SearchHit { id: "a".to_string(), score: 0.99, metadata: metadata_with_title("rust") };
        let mut metadata = metadata_with_title("rust");
        metadata.insert("category".to_string(), json!("rust"));
        let hit = SearchHit { metadata, ..hit };
        let ranked = apply_overlay(hit, "rust");
        assert!(ranked.final_score <= 1.0);
    }
}
