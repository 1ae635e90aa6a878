//! Steps 5-7 of the Query Parser/Optimizer pipeline: term expansion,
//! synonym lookup, and context-driven boosts (§4.E, §9 "stemming rules
//! overshoot English morphology — reproduced for behavioural parity").

use std::collections::HashMap;

use crate::error::CoreResult;
use crate::types::{Metadata, Optimization, ParsedQuery};

fn stem(token: &str) -> Option<String> {
    if token.len() <= 3 {
        return None;
    }
    if let Some(stripped) = token.strip_suffix("ing") {
        return Some(stripped.to_string());
    }
    if let Some(stripped) = token.strip_suffix("ed") {
        return Some(stripped.to_string());
    }
    if let Some(stripped) = token.strip_suffix('s') {
        return Some(stripped.to_string());
    }
    None
}

fn synonym_map() -> &'static HashMap<&'static str, &'static [&'static str]> {
    use std::sync::OnceLock;
    static MAP: OnceLock<HashMap<&'static str, &'static [&'static str]>> = OnceLock::new();
    MAP.get_or_init(|| {
        let mut m: HashMap<&'static str, &'static [&'static str]> = HashMap::new();
        m.insert("document", &["file", "paper", "text", "record"]);
        m.insert("error", &["bug", "issue", "fault"]);
        m.insert("config", &["configuration", "settings"]);
        m.insert("user", &["account", "member"]);
        m
    })
}

/// Step 5: rule-based stems for each normalized token, deduplicated.
fn expand_terms(normalized_text: &str) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for token in normalized_text.split_whitespace() {
        if let Some(stemmed) = stem(token) {
            if !seen.contains(&stemmed) {
                seen.push(stemmed);
            }
        }
    }
    seen
}

/// Step 6: fixed small map over recognized entity surface forms
/// (lower-cased before lookup); entities not in the map contribute
/// nothing.
fn lookup_synonyms(entities: &[String]) -> Vec<String> {
    let map = synonym_map();
    let mut synonyms = Vec::new();
    for entity in entities {
        if let Some(values) = map.get(entity.to_lowercase().as_str()) {
            for v in *values {
                if !synonyms.contains(&v.to_string()) {
                    synonyms.push(v.to_string());
                }
            }
        }
    }
    synonyms
}

/// Step 7: `{domain: X}` -> boost[X] = 1.5; `{recency: "recent"}` ->
/// boost["recent"] = 1.2. Other context fields are ignored.
fn compute_boosts(context: Option<&Metadata>) -> HashMap<String, f32> {
    let mut boosts = HashMap::new();
    let Some(context) = context else { return boosts };

    if let Some(domain) = context.get("domain").and_then(|v| v.as_str()) {
        boosts.insert(domain.to_string(), 1.5);
    }
    if context.get("recency").and_then(|v| v.as_str()) == Some("recent") {
        boosts.insert("recent".to_string(), 1.2);
    }

    boosts
}

/// Derives an `Optimization` from a `ParsedQuery` plus the Query's context
/// bag (§4.E).
pub fn optimize(parsed: &ParsedQuery, context: Option<&Metadata>) -> CoreResult<Optimization> {
    let optimization = Optimization {
        expanded_terms: expand_terms(&parsed.normalized_text),
        synonyms: lookup_synonyms(&parsed.entities),
        effective_filters: parsed.filters.clone(),
        boost: compute_boosts(context),
    };
    optimization.validate()?;
    Ok(optimization)
}
