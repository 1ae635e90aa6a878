//! Keyword scoring pass (spec §4.G): tokenize the query, count
//! case-insensitive occurrences of each keyword across a candidate's
//! serialized metadata, and normalize into a [0,1] score.

use std::collections::HashSet;

use crate::types::{Metadata, RankedResult};

const STOPWORDS: &[&str] = &[
    "the", "a", "an", "of", "to", "in", "on", "for", "and", "or", "is", "are", "was", "were",
    "be", "by", "with", "at", "from", "as", "that", "this", "it", "do", "does", "did",
];

const MIN_TOKEN_LEN: usize = 3;
const PER_KEYWORD_BOOST: f32 = 0.1;

/// Lower-cases, strips punctuation, and drops short tokens and stopwords.
pub fn tokenize(query_text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    query_text
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= MIN_TOKEN_LEN)
        .filter(|t| !STOPWORDS.contains(t))
        .filter(|t| seen.insert(t.to_string()))
        .map(|t| t.to_string())
        .collect()
}

fn count_occurrences(haystack: &str, keyword: &str) -> usize {
    if keyword.is_empty() {
        return 0;
    }
    haystack.matches(keyword).count()
}

/// Counts case-insensitive occurrences of each keyword in `metadata`'s
/// serialized form, applies a per-keyword boost, and normalizes by
/// `keywords.len() * 10`, clamped to [0,1].
pub fn keyword_score(metadata: &Metadata, keywords: &[String]) -> f32 {
    if keywords.is_empty() {
        return 0.0;
    }

    let haystack = serde_json::to_string(metadata).unwrap_or_default().to_lowercase();
    let total_occurrences: usize = keywords.iter().map(|k| count_occurrences(&haystack, k)).sum();
    let raw_score = total_occurrences as f32 * PER_KEYWORD_BOOST;
    let normalizer = (keywords.len() as f32) * 10.0;
    (raw_score / normalizer).clamp(0.0, 1.0)
}

/// Scores every candidate against `keywords` and folds the result into
/// `keyword_score`/`factors.keyword`, leaving `final_score` untouched —
/// fusion happens in `hybrid::fuse`.
pub fn apply_keyword_scores(candidates: &mut [RankedResult], keywords: &[String]) {
    for candidate in candidates.iter_mut() {
        let score = keyword_score(&candidate.metadata, keywords);
        candidate.keyword_score = Some(score);
        candidate.factors.keyword = Some(score);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RankingFactors;
    use serde_json::json;

    #[test]
    fn tokenize_drops_stopwords_and_short_tokens() {
        let tokens = tokenize("the quick fox is in a box");
        assert!(!tokens.contains(&"the".to_string()));
        assert!(!tokens.contains(&"is".to_string()));
        assert!(!tokens.contains(&"in".to_string()));
        assert!(!tokens.contains(&"a".to_string()));
        assert!(tokens.contains(&"quick".to_string()));
        assert!(tokens.contains(&"fox".to_string()));
        assert!(tokens.contains(&"box".to_string()));
    }

    #[test]
    fn tokenize_strips_punctuation_and_dedups() {
        let tokens = tokenize("rust, rust! rust?");
        assert_eq!(tokens, vec!["rust".to_string()]);
    }

    #[test]
    fn keyword_score_is_zero_for_no_keywords() {
        let metadata = Metadata::new();
        assert_eq!(keyword_score(&metadata, &[]), 0.0);
    }

    #[test]
    fn keyword_score_rewards_occurrences() {
        let mut metadata = Metadata::new();
        metadata.insert("body".to_string(), json!("rust rust rust programming"));
        let keywords = vec!["rust".to_string()];
        let score = keyword_score(&metadata, &keywords);
        assert!(score > 0.0 && score <= 1.0);
    }

    #[test]
    fn keyword_score_clamps_to_one() {
        let mut metadata = Metadata::new();
        let repeated = "rust ".repeat(200);
        metadata.insert("body".to_string(), json!(repeated));
        let keywords = vec!["rust".to_string()];
        assert_eq!(keyword_score(&metadata, &keywords), 1.0);
    }

    #[test]
    fn apply_keyword_scores_sets_factors_without_touching_final_score() {
        let mut metadata = Metadata::new();
        metadata.insert("body".to_string(), json!("rust programming"));
        let mut candidates = vec![RankedResult {
            id: "a".to_string(),
            metadata,
            vector_score: 0.5,
            keyword_score: None,
            final_score: 0.5,
            factors: RankingFactors { semantic: 0.5, ..Default::default() },
        }];
        apply_keyword_scores(&mut candidates, &["rust".to_string()]);
        assert!(candidates[0].keyword_score.unwrap() > 0.0);
        assert_eq!(candidates[0].final_score, 0.5);
    }
}
