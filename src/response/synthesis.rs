//! Steps 4-6 of the Response Generator pipeline: text synthesis,
//! confidence scoring, coherence scoring.

use super::Candidate;

const COHERENCE_MARKERS: &[&str] = &["additionally", "furthermore", "however", "therefore", "moreover"];
const TRUNCATE_SEARCH_FRACTION: f32 = 0.7;

/// Step 4: zero/one/many-source synthesis, then length-budgeted truncation
/// preferring a clean sentence boundary past 70% of the budget.
pub fn synthesize(selected: &[Candidate], max_response_length: usize) -> String {
    let body = match selected.len() {
        0 => "No information found for this query.".to_string(),
        1 => format!("Based on the available information: {}", selected[0].excerpt),
        _ => {
            let excerpts: Vec<&str> = selected.iter().take(3).map(|c| c.excerpt.as_str()).collect();
            format!("Based on multiple sources: {}", excerpts.join(" Additionally, "))
        }
    };

    truncate_to_budget(&body, max_response_length)
}

fn truncate_to_budget(text: &str, max_len: usize) -> String {
    if text.len() <= max_len {
        return text.to_string();
    }

    let search_start = (max_len as f32 * TRUNCATE_SEARCH_FRACTION) as usize;
    let window = &text[..max_len.min(text.len())];

    let boundary = window
        .char_indices()
        .filter(|&(i, c)| i >= search_start && matches!(c, '.' | '!' | '?'))
        .map(|(i, _)| i + 1)
        .last();

    match boundary {
        Some(cut) => window[..cut].to_string(),
        None => {
            let mut truncated = window.to_string();
            truncated.push('\u{2026}');
            truncated
        }
    }
}

/// Step 5: mean relevance + 0.1 per extra source − 0.2 if total excerpt
/// bytes < 100 − 0.1 if mean relevance < 0.5; clamp [0,1], round to 3dp.
pub fn confidence_score(selected: &[Candidate], body: &str) -> f32 {
    if selected.is_empty() {
        return 0.0;
    }

    let mean_relevance: f32 = selected.iter().map(|c| c.relevance_score).sum::<f32>() / selected.len() as f32;
    let extra_sources_bonus = 0.1 * (selected.len() as f32 - 1.0);
    let total_excerpt_bytes: usize = selected.iter().map(|c| c.excerpt.len()).sum();

    let mut score = mean_relevance + extra_sources_bonus;
    if total_excerpt_bytes < 100 {
        score -= 0.2;
    }
    if mean_relevance < 0.5 {
        score -= 0.1;
    }

    let _ = body;
    round3(score.clamp(0.0, 1.0))
}

fn round3(value: f32) -> f32 {
    (value * 1000.0).round() / 1000.0
}

fn mean_sentence_length(text: &str) -> f32 {
    let sentences: Vec<&str> = text
        .split(|c: char| matches!(c, '.' | '!' | '?'))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if sentences.is_empty() {
        return 0.0;
    }
    let total: usize = sentences.iter().map(|s| s.len()).sum();
    total as f32 / sentences.len() as f32
}

/// Step 6: baseline 0.5; +0.2 if mean sentence length in (20,100) chars;
/// +0.2 if >= 2 sources; +0.1 if a coherence marker appears; clamp [0,1].
pub fn coherence_score(selected: &[Candidate], body: &str) -> f32 {
    let mut score: f32 = 0.5;

    let avg_len = mean_sentence_length(body);
    if avg_len > 20.0 && avg_len < 100.0 {
        score += 0.2;
    }
    if selected.len() >= 2 {
        score += 0.2;
    }
    let lower = body.to_lowercase();
    if COHERENCE_MARKERS.iter().any(|m| lower.contains(m)) {
        score += 0.1;
    }

    score.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(excerpt: &str, relevance: f32) -> Candidate {
        Candidate {
            source_id: "s1".to_string(),
            content_id: "c1".to_string(),
            title: None,
            url: None,
            excerpt: excerpt.to_string(),
            relevance_score: relevance,
        }
    }

    #[test]
    fn synthesize_handles_zero_sources() {
        assert_eq!(synthesize(&[], 2000), "No information found for this query.");
    }

    #[test]
    fn synthesize_handles_single_source() {
        let selected = vec![candidate("Rust is memory safe.", 0.9)];
        assert_eq!(synthesize(&selected, 2000), "Based on the available information: Rust is memory safe.");
    }

    #[test]
    fn synthesize_joins_up_to_three_excerpts_for_many_sources() {
        let selected = vec![
            candidate("one", 0.9),
            candidate("two", 0.8),
            candidate("three", 0.7),
            candidate("four", 0.6),
        ];
        let text = synthesize(&selected, 2000);
        assert!(text.contains("one Additionally, two Additionally, three"));
        assert!(!text.contains("four"));
    }

    #[test]
    fn truncate_prefers_sentence_boundary_past_seventy_percent() {
        let text = "Short sentence one. Short sentence two. Short sentence three is much longer than the rest of them combined here.";
        let truncated = truncate_to_budget(text, 60);
        assert!(truncated.ends_with('.'));
        assert!(truncated.len() <= 60);
    }

    #[test]
    fn truncate_ellipsizes_when_no_boundary_found() {
        let text = "a".repeat(100);
        let truncated = truncate_to_budget(&text, 50);
        assert!(truncated.ends_with('\u{2026}'));
    }

    #[test]
    fn confidence_score_penalizes_short_excerpts_and_low_relevance() {
        let selected = vec![candidate("short", 0.2)];
        let body = synthesize(&selected, 2000);
        let confidence = confidence_score(&selected, &body);
        assert!(confidence < 0.2);
    }

    #[test]
    fn confidence_score_rewards_extra_sources() {
        let selected = vec![
            candidate(&"x".repeat(80), 0.9),
            candidate(&"y".repeat(80), 0.9),
        ];
        let body = synthesize(&selected, 2000);
        let confidence = confidence_score(&selected, &body);
        assert!((confidence - 1.0).abs() < 1e-6);
    }

    #[test]
    fn coherence_score_rewards_markers_and_multiple_sources() {
        let selected = vec![candidate(&"x".repeat(40), 0.9), candidate(&"y".repeat(40), 0.9)];
        let body = format!("Based on multiple sources: {} Additionally, {}", "x".repeat(40), "y".repeat(40));
        let score = coherence_score(&selected, &body);
        assert!(score > 0.5);
    }
}
