//! Response Generator (spec component H): filters and deduplicates ranked
//! candidates, synthesizes response text, scores confidence and coherence,
//! and applies the configured citation style.

mod citation;
mod synthesis;


use std::collections::HashSet;

use crate::config::ResponseConfig;
use crate::types::{RankedResult, SourceReference};

/// A candidate source carried through the pipeline before it is narrowed
/// down to the `SourceReference`s that ship in the final Query Result.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub source_id: String,
    pub content_id: String,
    pub title: Option<String>,
    pub url: Option<String>,
    pub excerpt: String,
    pub relevance_score: f32,
}

impl Candidate {
    pub fn from_ranked(result: &RankedResult) -> Self {
        let metadata = &result.metadata;
        Self {
            source_id: metadata.get("sourceId").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
            content_id: result.id.clone(),
            title: metadata.get("title").and_then(|v| v.as_str()).map(str::to_string),
            url: metadata.get("url").and_then(|v| v.as_str()).map(str::to_string),
            excerpt: metadata.get("excerpt").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
            relevance_score: result.final_score,
        }
    }
}

pub struct SynthesizedResponse {
    pub text: String,
    pub sources: Vec<SourceReference>,
    pub confidence: f32,
    pub coherence: Option<f32>,
}

/// Tokenizes into a lower-cased word set for Jaccard comparison.
fn word_set(text: &str) -> HashSet<String> {
    text.to_lowercase().split_whitespace().map(str::to_string).collect()
}

fn jaccard_similarity(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count() as f32;
    let union = a.union(b).count() as f32;
    if union == 0.0 {
        0.0
    } else {
        intersection / union
    }
}

const DEDUP_THRESHOLD: f32 = 0.8;

/// Step 1-3: filter by confidence threshold and non-empty excerpt,
/// deduplicate by excerpt similarity, sort by relevance and truncate.
fn select_candidates(candidates: Vec<Candidate>, config: &ResponseConfig) -> Vec<Candidate> {
    let mut filtered: Vec<Candidate> = candidates
        .into_iter()
        .filter(|c| c.relevance_score >= config.confidence_threshold && !c.excerpt.is_empty())
        .collect();
    filtered.sort_by(|a, b| b.relevance_score.partial_cmp(&a.relevance_score).unwrap_or(std::cmp::Ordering::Equal));

    let mut deduped: Vec<Candidate> = Vec::new();
    let mut kept_word_sets: Vec<HashSet<String>> = Vec::new();
    for candidate in filtered.drain(..) {
        let words = word_set(&candidate.excerpt);
        let is_duplicate = kept_word_sets.iter().any(|kept| jaccard_similarity(kept, &words) > DEDUP_THRESHOLD);
        if !is_duplicate {
            kept_word_sets.push(words);
            deduped.push(candidate);
        }
    }

    deduped.truncate(config.max_sources_in_response);
    deduped
}

/// Runs the full generator pipeline (§4.H) over ranked candidates.
pub fn generate(ranked: &[RankedResult], config: &ResponseConfig) -> SynthesizedResponse {
    let candidates: Vec<Candidate> = ranked.iter().map(Candidate::from_ranked).collect();
    let selected = select_candidates(candidates, config);

    let body = synthesis::synthesize(&selected, config.max_response_length);
    let confidence = synthesis::confidence_score(&selected, &body);
    let coherence = if config.coherence_check_enabled {
        Some(synthesis::coherence_score(&selected, &body))
    } else {
        None
    };
    let text = citation::apply(&body, &selected, config.citation_style);

    let sources = selected
        .into_iter()
        .map(|c| SourceReference {
            source_id: c.source_id,
            content_id: c.content_id,
            title: c.title,
            url: c.url,
            excerpt: c.excerpt,
            relevance_score: c.relevance_score,
        })
        .collect();

    SynthesizedResponse { text, sources, confidence, coherence }
}
