//! Score fusion pass (spec §4.G): combine a Ranked Result's vector and
//! keyword components into a single final score.

use crate::types::RankedResult;

pub const DEFAULT_VECTOR_WEIGHT: f32 = 0.7;
pub const DEFAULT_KEYWORD_WEIGHT: f32 = 0.3;

/// `finalScore = vectorWeight * vectorScore + keywordWeight * keywordScore`.
/// A missing keyword score contributes 0 rather than being imputed.
pub fn fuse(result: &RankedResult, vector_weight: f32, keyword_weight: f32) -> f32 {
    let vector_component = vector_weight * result.vector_score;
    let keyword_component = keyword_weight * result.keyword_score.unwrap_or(0.0);
    (vector_component + keyword_component).clamp(0.0, 1.0)
}

/// Applies `fuse` with the default 0.7/0.3 weighting and re-sorts
/// descending by the resulting `final_score`.
pub fn fuse_and_sort(results: &mut Vec<RankedResult>) {
    fuse_and_sort_weighted(results, DEFAULT_VECTOR_WEIGHT, DEFAULT_KEYWORD_WEIGHT);
}

pub fn fuse_and_sort_weighted(results: &mut Vec<RankedResult>, vector_weight: f32, keyword_weight: f32) {
    for result in results.iter_mut() {
        result.final_score = fuse(result, vector_weight, keyword_weight);
    }
    results.sort_by(|a, b| {
        b.final_score
            .partial_cmp(&a.final_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Metadata, RankingFactors};

    fn result(vector_score: f32, keyword_score: Option<f32>) -> RankedResult {
        RankedResult {
            id: "a".to_string(),
            metadata: Metadata::new(),
            vector_score,
            keyword_score,
            final_score: vector_score,
            factors: RankingFactors { semantic: vector_score, ..Default::default() },
        }
    }

    #[test]
    fn fuse_uses_default_seven_three_weighting() {
        let r = result(1.0, Some(1.0));
        assert_eq!(fuse(&r, DEFAULT_VECTOR_WEIGHT, DEFAULT_KEYWORD_WEIGHT), 1.0);
    }

    #[test]
    fn missing_keyword_score_contributes_zero() {
        let r = result(0.8, None);
        let fused = fuse(&r, DEFAULT_VECTOR_WEIGHT, DEFAULT_KEYWORD_WEIGHT);
        assert!((fused - 0.56).abs() < 1e-6);
    }

    #[test]
    fn fuse_and_sort_reorders_by_fused_score() {
        let mut results = vec![result(0.5, Some(0.9)), result(0.9, Some(0.1))];
        results[0].id = "low-vector-high-keyword".to_string();
        results[1].id = "high-vector-low-keyword".to_string();
        fuse_and_sort(&mut results);
        assert_eq!(results[0].id, "high-vector-low-keyword");
    }

    #[test]
    fn custom_weights_are_respected() {
        let r = result(0.0, Some(1.0));
        assert_eq!(fuse(&r, 0.2, 0.8), 0.8);
    }
}
