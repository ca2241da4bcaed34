//! HTML to pollution-free markdown extraction: component C2.
//!
//! A five-stage pipeline, each stage performing only whole-line drops or the
//! single title-link rewrite described in SPEC_FULL §4.2 — never trimming a
//! retained line so code-block indentation survives byte-for-byte.

use std::sync::OnceLock;

use docrag_common::Result;
use regex::Regex;
use scraper::{Html, Selector};

mod error;
pub use error::ExtractError;

/// Tags stripped wholesale from the selected content root before conversion:
/// navigational chrome that a CSS selector alone can't exclude because it
/// lives inside the content root in many documentation themes.
const EXCLUDED_TAGS: &[&str] = &["nav", "header", "footer", "aside"];

/// Host substrings identifying "share this page" anchors, dropped alongside
/// the excluded tags.
const SOCIAL_LINK_HOSTS: &[&str] = &[
    "twitter.com",
    "x.com",
    "facebook.com",
    "linkedin.com",
    "reddit.com/submit",
];

/// Substring patterns identifying navigation chrome lines that survive HTML
/// structural removal because they render as plain text. A pure data table —
/// extend it without touching extraction logic.
pub const DEFAULT_POLLUTION_PATTERNS: &[&str] = &[
    "Skip Navigation",
    "Skip to main content",
    "Global Nav",
    "Search Developer",
    "Use Up and Down arrow keys",
    "press Enter to select",
    "Choose a language",
    "symbols inside",
];

#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub content_selector: String,
    pub pollution_patterns: Vec<String>,
    pub case_sensitive: bool,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            content_selector: "main, article, .content, #content".to_string(),
            pollution_patterns: DEFAULT_POLLUTION_PATTERNS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            case_sensitive: true,
        }
    }
}

fn image_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^!\[[^\]]*\]\([^)]*\)$").expect("static regex is valid"))
}

fn title_link_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\s*)(#{1,6})\s*\[([^\]]*)\]\([^)]*\)\s*$").expect("static regex is valid")
    })
}

/// Strip `nav`/`header`/`footer`/`aside` elements and social-share anchors
/// from a fragment's serialized HTML via substring removal of each matched
/// element's outer HTML. `scraper`'s tree is read-only, so structural
/// removal works by collecting offending subtrees first and cutting their
/// serialized form out of the parent's markup.
fn strip_excluded_elements(fragment_html: &str) -> String {
    let document = Html::parse_fragment(fragment_html);
    let mut to_remove: Vec<String> = Vec::new();

    for tag in EXCLUDED_TAGS {
        let selector = Selector::parse(tag).expect("static tag selector is valid");
        for element in document.select(&selector) {
            to_remove.push(element.html());
        }
    }

    let anchor_selector = Selector::parse("a[href]").expect("static selector is valid");
    for element in document.select(&anchor_selector) {
        if let Some(href) = element.value().attr("href") {
            if SOCIAL_LINK_HOSTS.iter().any(|host| href.contains(host)) {
                to_remove.push(element.html());
            }
        }
    }

    let mut cleaned = fragment_html.to_string();
    for snippet in to_remove {
        cleaned = cleaned.replace(&snippet, "");
    }
    cleaned
}

fn html_to_markdown(html: &str) -> Result<String> {
    let markdown = html2text::from_read(html.as_bytes(), 100_000);
    Ok(markdown)
}

fn apply_pollution_filter(markdown: &str, config: &ExtractorConfig) -> String {
    markdown
        .lines()
        .filter(|line| {
            let haystack = if config.case_sensitive {
                line.to_string()
            } else {
                line.to_ascii_lowercase()
            };
            !config.pollution_patterns.iter().any(|pattern| {
                let needle = if config.case_sensitive {
                    pattern.clone()
                } else {
                    pattern.to_ascii_lowercase()
                };
                haystack.contains(&needle)
            })
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn strip_image_lines(markdown: &str) -> String {
    markdown
        .lines()
        .filter(|line| !image_line_regex().is_match(line))
        .collect::<Vec<_>>()
        .join("\n")
}

fn truncate_at_see_also(markdown: &str) -> String {
    let lines: Vec<&str> = markdown.lines().collect();
    let cutoff = lines
        .iter()
        .position(|line| line.to_ascii_lowercase().contains("see also"));
    match cutoff {
        Some(idx) => lines[..idx].join("\n"),
        None => markdown.to_string(),
    }
}

fn rewrite_title_links(markdown: &str) -> String {
    markdown
        .lines()
        .map(|line| match title_link_regex().captures(line) {
            Some(caps) => format!("{}{} {}", &caps[1], &caps[2], &caps[3]),
            None => line.to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Run the full five-stage extraction pipeline over raw page HTML.
///
/// Returns an error only when the content selector matches nothing or the
/// conversion step itself fails; an empty-but-present content root yields an
/// empty string, which the caller (C8) treats as `MalformedContent`.
pub fn extract(html: &str, config: &ExtractorConfig) -> Result<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(&config.content_selector)
        .map_err(|e| ExtractError::Configuration(format!("invalid content selector: {e:?}")))?;

    let root = document
        .select(&selector)
        .next()
        .ok_or_else(|| ExtractError::MalformedContent("content selector matched no element".into()))?;

    let stripped = strip_excluded_elements(&root.html());
    let markdown = html_to_markdown(&stripped)?;

    let stage2 = apply_pollution_filter(&markdown, config);
    let stage3 = strip_image_lines(&stage2);
    let stage4 = truncate_at_see_also(&stage3);
    let stage5 = rewrite_title_links(&stage4);

    Ok(stage5)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn html_doc(body: &str) -> String {
        format!("<html><body><main>{body}</main></body></html>")
    }

    #[test]
    fn extraction_is_idempotent() {
        let config = ExtractorConfig::default();
        let html = html_doc("<p>Hello world.</p><p>See Also</p><p>Dropped.</p>");
        let first = extract(&html, &config).unwrap();
        let second = extract(&html_doc(&first), &config).unwrap();
        assert_eq!(first.trim(), second.trim());
    }

    #[test]
    fn pollution_filter_drops_matching_lines_only() {
        let config = ExtractorConfig::default();
        let markdown = "Keep this line\nSkip Navigation to content\nKeep this too";
        let filtered = apply_pollution_filter(markdown, &config);
        assert_eq!(filtered, "Keep this line\nKeep this too");
    }

    #[test]
    fn image_lines_are_dropped_exactly() {
        let markdown = "before\n![alt text](http://example.com/x.png)\nafter";
        assert_eq!(strip_image_lines(markdown), "before\nafter");
    }

    #[test]
    fn see_also_truncation_is_case_insensitive_and_drops_remainder() {
        let markdown = "Intro line\nSEE ALSO\nFurther Reading\nAnother Link";
        assert_eq!(truncate_at_see_also(markdown), "Intro line");
    }

    #[test]
    fn title_link_rewrite_preserves_heading_level_and_indentation() {
        let markdown = "  ## [Getting Started](https://docs.example.com/start)";
        assert_eq!(rewrite_title_links(markdown), "  ## Getting Started");
    }

    #[test]
    fn title_link_rewrite_leaves_non_matching_lines_untouched() {
        let markdown = "Just a [regular link](https://example.com) in a sentence.";
        assert_eq!(rewrite_title_links(markdown), markdown);
    }

    #[test]
    fn code_block_indentation_survives_pollution_filter() {
        let config = ExtractorConfig::default();
        let markdown = "    fn main() {\n        println!(\"hi\");\n    }";
        let filtered = apply_pollution_filter(markdown, &config);
        assert_eq!(filtered, markdown);
    }
}
