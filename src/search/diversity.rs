//! Greedy diversity re-rank (spec §4.G): the top-ranked result is always
//! kept; subsequent candidates are admitted only if they don't share both
//! `sourceId` and `category` with an already-selected result, until
//! `top_k` is reached — then remaining slots are filled with the
//! next-best candidates regardless of overlap.

use crate::types::RankedResult;

fn source_and_category(result: &RankedResult) -> (Option<String>, Option<String>) {
    let source_id = result.metadata.get("sourceId").and_then(|v| v.as_str()).map(str::to_string);
    let category = result.metadata.get("category").and_then(|v| v.as_str()).map(str::to_string);
    (source_id, category)
}

fn overlaps(a: &RankedResult, b: &RankedResult) -> bool {
    let (a_source, a_category) = source_and_category(a);
    let (b_source, b_category) = source_and_category(b);
    a_source.is_some() && a_source == b_source && a_category.is_some() && a_category == b_category
}

/// Assumes `ranked` is already sorted descending by final score.
pub fn diversify(ranked: Vec<RankedResult>, top_k: usize) -> Vec<RankedResult> {
    if ranked.is_empty() || top_k == 0 {
        return Vec::new();
    }

    let mut selected: Vec<RankedResult> = Vec::with_capacity(top_k.min(ranked.len()));
    let mut leftover: Vec<RankedResult> = Vec::new();

    for (index, candidate) in ranked.into_iter().enumerate() {
        if selected.len() >= top_k {
            leftover.push(candidate);
            continue;
        }
        if index == 0 {
            selected.push(candidate);
            continue;
        }
        if selected.iter().any(|s| overlaps(s, &candidate)) {
            leftover.push(candidate);
        } else {
            selected.push(candidate);
        }
    }

    for candidate in leftover {
        if selected.len() >= top_k {
            break;
        }
        selected.push(candidate);
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Metadata, RankingFactors};
    use serde_json::json;

    fn result(id: &str, score: f32, source_id: &str, category: &str) -> RankedResult {
        let mut metadata = Metadata::new();
        metadata.insert("sourceId".to_string(), json!(source_id));
        metadata.insert("category".to_string(), json!(category));
        RankedResult {
            id: id.to_string(),
            metadata,
            vector_score: score,
            keyword_score: None,
            final_score: score,
            factors: RankingFactors { semantic: score, ..Default::default() },
        }
    }

    #[test]
    fn always_keeps_top_result() {
        let ranked = vec![result("a", 0.9, "s1", "docs")];
        let diversified = diversify(ranked, 5);
        assert_eq!(diversified.len(), 1);
        assert_eq!(diversified[0].id, "a");
    }

    #[test]
    fn excludes_duplicates_of_source_and_category_until_top_k_reached() {
        let ranked = vec![
            result("a", 0.9, "s1", "docs"),
            result("b", 0.8, "s1", "docs"), // same source+category as a, excluded first pass
            result("c", 0.7, "s2", "docs"),
        ];
        let diversified = diversify(ranked, 2);
        let ids: Vec<&str> = diversified.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn backfills_with_excluded_candidates_when_not_enough_diverse_results() {
        let ranked = vec![
            result("a", 0.9, "s1", "docs"),
            result("b", 0.8, "s1", "docs"),
            result("c", 0.7, "s1", "docs"),
        ];
        let diversified = diversify(ranked, 3);
        assert_eq!(diversified.len(), 3);
        let ids: Vec<&str> = diversified.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn different_source_but_same_category_is_not_excluded() {
        let ranked = vec![result("a", 0.9, "s1", "docs"), result("b", 0.8, "s2", "docs")];
        let diversified = diversify(ranked, 2);
        assert_eq!(diversified.len(), 2);
    }

    #[test]
    fn empty_input_returns_empty() {
        assert!(diversify(Vec::new(), 5).is_empty());
    }
}
