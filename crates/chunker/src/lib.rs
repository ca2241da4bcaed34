//! Structure-aware chunking: component C3.
//!
//! A greedy forward scan over a `[start, start+chunk_size]` window, picking
//! the rightmost acceptable break point under the five-tier priority from
//! SPEC_FULL §4.3. Offsets are byte offsets into the input `&str`.

use std::sync::OnceLock;

use docrag_common::BreakType;
use regex::Regex;

#[derive(Debug, Clone, PartialEq)]
pub struct ChunkSpan {
    pub start: usize,
    pub end: usize,
    pub content: String,
    pub break_type: BreakType,
}

fn markdown_header_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^#{2,6}[ \t]").expect("static regex is valid"))
}

fn sentence_end_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[.!?][ \t\n]").expect("static regex is valid"))
}

fn header_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^(#{1,6})[ \t]+(.+)$").expect("static regex is valid"))
}

/// Rightmost markdown-header break within `window`, excluding a match at the
/// very first character (that would produce a zero-length chunk).
fn find_markdown_header_break(window: &str) -> Option<usize> {
    markdown_header_regex()
        .find_iter(window)
        .map(|m| m.start())
        .filter(|&pos| pos > 0)
        .max()
}

fn find_paragraph_break(window: &str) -> Option<usize> {
    window.rfind("\n\n").map(|idx| idx + 2)
}

fn find_newline_break(window: &str) -> Option<usize> {
    window.rfind('\n').map(|idx| idx + 1)
}

fn find_sentence_break(window: &str) -> Option<usize> {
    sentence_end_regex().find_iter(window).map(|m| m.end()).max()
}

fn next_break(window: &str) -> (usize, BreakType) {
    if let Some(pos) = find_markdown_header_break(window) {
        return (pos, BreakType::MarkdownHeader);
    }
    if let Some(pos) = find_paragraph_break(window) {
        return (pos, BreakType::Paragraph);
    }
    if let Some(pos) = find_newline_break(window) {
        return (pos, BreakType::Newline);
    }
    if let Some(pos) = find_sentence_break(window) {
        return (pos, BreakType::Sentence);
    }
    (window.len(), BreakType::Force)
}

/// Split `markdown` into chunks of at most `chunk_size` bytes, preferring
/// structural break points over a hard split.
pub fn chunk(markdown: &str, chunk_size: usize) -> Vec<ChunkSpan> {
    if markdown.is_empty() {
        return Vec::new();
    }

    let len = markdown.len();
    if len <= chunk_size {
        let break_type = if markdown.contains("\n\n") {
            BreakType::Paragraph
        } else {
            BreakType::Force
        };
        return vec![ChunkSpan {
            start: 0,
            end: len,
            content: markdown.to_string(),
            break_type,
        }];
    }

    let mut spans = Vec::new();
    let mut start = 0usize;

    while start < len {
        let window_end = (start + chunk_size).min(len);
        if window_end == len {
            spans.push(ChunkSpan {
                start,
                end: len,
                content: markdown[start..len].to_string(),
                break_type: BreakType::Force,
            });
            break;
        }

        let window = &markdown[start..window_end];
        let (relative_break, break_type) = next_break(window);
        let absolute_break = (start + relative_break).max(start + 1);

        spans.push(ChunkSpan {
            start,
            end: absolute_break,
            content: markdown[start..absolute_break].to_string(),
            break_type,
        });
        start = absolute_break;
    }

    spans
}

/// The enclosing heading breadcrumb (e.g. `"Guide > Authentication"`) for
/// the chunk beginning at `chunk_start`, used to populate
/// [`docrag_common::Chunk::context`] when contextual annotation is enabled.
/// Returns `None` when no heading precedes the chunk.
pub fn enclosing_header_context(markdown: &str, chunk_start: usize) -> Option<String> {
    let mut stack: Vec<(usize, String)> = Vec::new();

    for caps in header_line_regex().captures_iter(markdown) {
        let whole = caps.get(0).unwrap();
        if whole.start() >= chunk_start {
            break;
        }
        let level = caps[1].len();
        let title = caps[2].trim().to_string();
        while stack.last().is_some_and(|(top_level, _)| *top_level >= level) {
            stack.pop();
        }
        stack.push((level, title));
    }

    if stack.is_empty() {
        None
    } else {
        Some(stack.into_iter().map(|(_, title)| title).collect::<Vec<_>>().join(" > "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_empty_list() {
        assert_eq!(chunk("", 100), Vec::new());
    }

    #[test]
    fn document_smaller_than_chunk_size_is_a_single_paragraph_chunk() {
        let markdown = "Intro.\n\nBody text.";
        let spans = chunk(markdown, 1000);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].break_type, BreakType::Paragraph);
        assert_eq!(spans[0].content, markdown);
    }

    #[test]
    fn document_smaller_than_chunk_size_without_paragraph_break_is_force() {
        let markdown = "one line of text with no blank separator";
        let spans = chunk(markdown, 1000);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].break_type, BreakType::Force);
    }

    #[test]
    fn prefers_markdown_header_over_paragraph_break() {
        let markdown = format!("{}\n\n## Next Section\nmore body text here", "a".repeat(20));
        let spans = chunk(&markdown, 25);
        assert_eq!(spans[0].break_type, BreakType::MarkdownHeader);
        assert!(spans[0].content.ends_with('\n') || !spans[0].content.contains("## Next"));
    }

    #[test]
    fn falls_back_to_newline_when_no_paragraph_or_header_break_in_window() {
        let markdown = format!("{}\n{}", "a".repeat(30), "b".repeat(30));
        let spans = chunk(&markdown, 35);
        assert_eq!(spans[0].break_type, BreakType::Newline);
    }

    #[test]
    fn falls_back_to_sentence_when_no_newline_in_window() {
        let markdown = format!("{}. {}", "a".repeat(30), "b".repeat(30));
        let spans = chunk(&markdown, 35);
        assert_eq!(spans[0].break_type, BreakType::Sentence);
    }

    #[test]
    fn force_split_when_no_break_candidates_exist() {
        let markdown = "a".repeat(100);
        let spans = chunk(&markdown, 30);
        assert!(spans.iter().all(|s| s.break_type == BreakType::Force));
        assert_eq!(spans.iter().map(|s| s.content.len()).sum::<usize>(), 100);
    }

    #[test]
    fn chunks_cover_the_document_with_no_gaps_or_overlap() {
        let markdown = format!(
            "# Title\n\n{}\n\n## Section\n\n{}",
            "para one ".repeat(50),
            "para two ".repeat(50)
        );
        let spans = chunk(&markdown, 80);
        let mut cursor = 0;
        for span in &spans {
            assert_eq!(span.start, cursor);
            assert_eq!(span.end - span.start, span.content.len());
            cursor = span.end;
        }
        assert_eq!(cursor, markdown.len());
    }

    #[test]
    fn enclosing_header_context_builds_breadcrumb_and_pops_deeper_siblings() {
        let markdown = "# Guide\n\n## Authentication\n\n### Tokens\n\nBody text here.\n\n## Errors\n\nMore body.";
        let tokens_pos = markdown.find("Body text here").unwrap();
        assert_eq!(
            enclosing_header_context(markdown, tokens_pos),
            Some("Guide > Authentication > Tokens".to_string())
        );

        let errors_pos = markdown.find("More body").unwrap();
        assert_eq!(
            enclosing_header_context(markdown, errors_pos),
            Some("Guide > Errors".to_string())
        );
    }

    #[test]
    fn enclosing_header_context_is_none_before_first_heading() {
        let markdown = "No heading yet.\n\n# First Heading\n\nBody.";
        assert_eq!(enclosing_header_context(markdown, 5), None);
    }
}
