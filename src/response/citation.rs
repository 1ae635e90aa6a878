//! Step 7 of the Response Generator pipeline: citation styling.

use super::Candidate;
use crate::types::CitationStyle;

/// Appends `[n]` after each sentence terminator in `body`, cycling through
/// `selected` in order until sources are exhausted.
fn inline_citations(body: &str, selected: &[Candidate]) -> String {
    if selected.is_empty() {
        return body.to_string();
    }

    let mut result = String::with_capacity(body.len() + selected.len() * 4);
    let mut source_index = 0;

    for c in body.chars() {
        result.push(c);
        if matches!(c, '.' | '!' | '?') && source_index < selected.len() {
            result.push_str(&format!("[{}]", source_index + 1));
            source_index += 1;
        }
    }
    result
}

fn source_line(index: usize, candidate: &Candidate) -> String {
    let title = candidate.title.as_deref().unwrap_or("untitled");
    match &candidate.url {
        Some(url) => format!("[{}] {} - {} ({})", index + 1, candidate.source_id, title, url),
        None => format!("[{}] {} - {}", index + 1, candidate.source_id, title),
    }
}

/// Applies the configured citation style to the synthesized body.
pub fn apply(body: &str, selected: &[Candidate], style: CitationStyle) -> String {
    match style {
        CitationStyle::Inline => inline_citations(body, selected),
        CitationStyle::Numbered => {
            let cited = inline_citations(body, selected);
            if selected.is_empty() {
                return cited;
            }
            let lines: Vec<String> = selected.iter().enumerate().map(|(i, c)| source_line(i, c)).collect();
            format!("{cited}\n\nSources:\n{}", lines.join("\n"))
        }
        CitationStyle::Footnote => {
            let cited = inline_citations(body, selected);
            if selected.is_empty() {
                return cited;
            }
            let lines: Vec<String> = selected.iter().enumerate().map(|(i, c)| source_line(i, c)).collect();
            format!("{cited}\n\n---\n{}", lines.join("\n"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(source_id: &str, title: &str, url: Option<&str>) -> Candidate {
        Candidate {
            source_id: source_id.to_string(),
            content_id: "c1".to_string(),
            title: Some(title.to_string()),
            url: url.map(str::to_string),
            excerpt: "excerpt".to_string(),
            relevance_score: 0.9,
        }
    }

    #[test]
    fn inline_style_appends_bracketed_index_after_terminators() {
        let body = "First sentence. Second sentence.";
        let selected = vec![candidate("s1", "Title A", None), candidate("s2", "Title B", None)];
        let cited = apply(body, &selected, CitationStyle::Inline);
        assert_eq!(cited, "First sentence.[1] Second sentence.[2]");
    }

    #[test]
    fn numbered_style_appends_sources_block() {
        let body = "Answer.";
        let selected = vec![candidate("s1", "Title A", Some("http://example.com"))];
        let cited = apply(body, &selected, CitationStyle::Numbered);
        assert!(cited.contains("Sources:"));
        assert!(cited.contains("[1] s1 - Title A (http://example.com)"));
    }

    #[test]
    fn footnote_style_appends_separator_and_footnotes() {
        let body = "Answer.";
        let selected = vec![candidate("s1", "Title A", None)];
        let cited = apply(body, &selected, CitationStyle::Footnote);
        assert!(cited.contains("---"));
        assert!(cited.contains("[1] s1 - Title A"));
    }

    #[test]
    fn no_sources_returns_body_unchanged() {
        let body = "No information found for this query.";
        let cited = apply(body, &[], CitationStyle::Numbered);
        assert_eq!(cited, body);
    }
}
