//! Query Parser / Optimizer (spec component E).
//!
//! Deterministic, side-effect-free preprocessing pipeline: normalize text,
//! extract entities from the raw text, classify intent over the
//! normalized text (the asymmetry is intentional, §9), extract filters by
//! regex, then derive an `Optimization` (term expansion, synonyms,
//! context-driven boosts). Mirrors the teacher's `ml::tokenizer`
//! normalization shape, generalized from query-cache-key hashing into a
//! full linguistic pipeline.

mod optimizer;


use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{CoreError, CoreResult};
use crate::types::{Filter, FilterOperator, Intent, Metadata, ParsedQuery, Query};

pub use optimizer::optimize;

const QUESTION_WORDS: &[&str] = &["what", "how", "why", "when", "where", "who", "which"];
const SEARCH_WORDS: &[&str] = &["find", "search", "get", "show", "list", "explain"];
const QUESTION_WORD_STOPLIST: &[&str] = &["What", "How", "Why", "When", "Where", "Who", "Which"];

static DATE_FILTER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(after|before|since|until)\s+(\d{4}-\d{2}-\d{2}|\d{1,2}/\d{1,2}/\d{4})").unwrap()
});
static TYPE_FILTER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)type:\s*(\w+)").unwrap());
static QUOTED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#""([^"]+)""#).unwrap());
static CAPITALIZED_RUN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Z][a-zA-Z]*(?:\s+[A-Z][a-zA-Z]*)*\b").unwrap());

/// Step 1: trim, lower-case, replace non-word characters (keeping `- _ .`)
/// with space, collapse whitespace. Idempotent: `normalize(normalize(t)) ==
/// normalize(t)`.
pub fn normalize(text: &str) -> String {
    let lowered = text.trim().to_lowercase();
    let replaced: String = lowered
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();

    let mut result = String::with_capacity(replaced.len());
    let mut prev_was_space = false;
    for ch in replaced.chars() {
        if ch.is_whitespace() {
            if !prev_was_space {
                result.push(' ');
                prev_was_space = true;
            }
        } else {
            result.push(ch);
            prev_was_space = false;
        }
    }
    result.trim().to_string()
}

/// Step 2: quoted substrings preserved as-is, plus capitalized-word runs in
/// the raw text minus the question-word stop list; de-duplicated
/// preserving first occurrence.
fn extract_entities(raw_text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut entities = Vec::new();

    for capture in QUOTED_RE.captures_iter(raw_text) {
        let entity = capture[1].to_string();
        if seen.insert(entity.clone()) {
            entities.push(entity);
        }
    }

    for capture in CAPITALIZED_RUN_RE.find_iter(raw_text) {
        let entity = capture.as_str().to_string();
        if QUESTION_WORD_STOPLIST.contains(&entity.as_str()) {
            continue;
        }
        if seen.insert(entity.clone()) {
            entities.push(entity);
        }
    }

    entities
}

/// Step 3: over normalized tokens.
fn classify_intent(normalized_text: &str) -> Intent {
    let tokens: HashSet<&str> = normalized_text.split_whitespace().collect();
    if tokens.iter().any(|t| QUESTION_WORDS.contains(t)) {
        Intent::Question
    } else if tokens.iter().any(|t| SEARCH_WORDS.contains(t)) {
        Intent::Search
    } else {
        Intent::General
    }
}

/// Step 4: date comparators and `type:X` tags, extracted from the raw
/// text.
fn extract_filters(raw_text: &str) -> Vec<Filter> {
    let mut filters = Vec::new();

    if let Some(capture) = DATE_FILTER_RE.captures(raw_text) {
        let comparator = capture[1].to_lowercase();
        let date = capture[2].to_string();
        let operator = match comparator.as_str() {
            "after" | "since" => FilterOperator::Gte,
            _ => FilterOperator::Lte,
        };
        filters.push(Filter::new("date", operator, serde_json::json!(date)));
    }

    if let Some(capture) = TYPE_FILTER_RE.captures(raw_text) {
        filters.push(Filter::new("type", FilterOperator::Eq, serde_json::json!(capture[1].to_string())));
    }

    filters
}

/// Runs the full preprocessing pipeline over a Query's raw text (§4.E).
/// Empty / whitespace-only text fails with `Validation` — in practice
/// unreachable once `Query::new` has already enforced the non-empty
/// invariant, but parsing is also callable standalone.
pub fn parse(text: &str) -> CoreResult<ParsedQuery> {
    if text.trim().is_empty() {
        return Err(CoreError::Validation("query text is empty".to_string()));
    }

    let normalized_text = normalize(text);
    Ok(ParsedQuery {
        original_text: text.to_string(),
        normalized_text: normalized_text.clone(),
        intent: classify_intent(&normalized_text),
        entities: extract_entities(text),
        filters: extract_filters(text),
    })
}

/// Convenience wrapper parsing a `Query`'s text directly.
pub fn parse_query(query: &Query) -> CoreResult<ParsedQuery> {
    parse(&query.text)
}

pub fn context_metadata(context: Option<&Metadata>) -> Metadata {
    context.cloned().unwrap_or_default()
}
