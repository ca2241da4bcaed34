use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;

/// A retrieved URL and its extracted textual content.
///
/// `url` is canonicalized (scheme and host lower-cased, fragment removed)
/// before it is ever persisted — see [`canonicalize_url`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page {
    pub url: String,
    pub content: String,
    pub crawl_count: i64,
    pub last_crawled_at: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The rule that produced a chunk's trailing boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BreakType {
    MarkdownHeader,
    Paragraph,
    Newline,
    Sentence,
    Force,
}

/// A segment of a page with an embedding.
///
/// `content` is the chunk's raw textual payload. When contextual annotation
/// is enabled (see [`crate::config::ChunkingConfig::contextual_annotation`])
/// the text actually embedded is `context + "\n\n" + content`, per the
/// deployment-time choice recorded in DESIGN.md; `content` itself is always
/// stored as the plain chunk text and `context` as a separate field so a
/// deployment can switch rendering strategy without re-chunking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub id: uuid::Uuid,
    pub page_url: String,
    pub ordinal: i32,
    pub content: String,
    pub context: Option<String>,
    pub break_type: BreakType,
    pub char_start: i64,
    pub char_end: i64,
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
}

impl Chunk {
    /// The text that should actually be fed to the embedder: the contextual
    /// wrapper when present, otherwise the raw content.
    pub fn embeddable_text(&self) -> String {
        match &self.context {
            Some(context) if !context.is_empty() => format!("{context}\n\n{}", self.content),
            _ => self.content.clone(),
        }
    }
}

/// A single retrieved result as returned by the retrieval engine and the
/// `perform_rag_query` tool contract.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievedChunk {
    pub chunk_id: uuid::Uuid,
    pub url: String,
    pub content: String,
    pub similarity: f32,
}

/// Canonicalize a URL per spec §3: lower-case scheme and host, drop the
/// fragment. Query strings and path casing are left untouched — they are
/// semantically significant for most documentation sites.
pub fn canonicalize_url(raw: &str) -> Result<String, url::ParseError> {
    let mut parsed = url::Url::parse(raw)?;
    let scheme = parsed.scheme().to_ascii_lowercase();
    let _ = parsed.set_scheme(&scheme);
    if let Some(host) = parsed.host_str() {
        let lowered = host.to_ascii_lowercase();
        let _ = parsed.set_host(Some(&lowered));
    }
    parsed.set_fragment(None);
    Ok(parsed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalize_lowercases_scheme_and_host_and_drops_fragment() {
        let canon = canonicalize_url("HTTPS://Docs.Example.COM/guide/Intro#section-2").unwrap();
        assert_eq!(canon, "https://docs.example.com/guide/Intro");
    }

    #[test]
    fn canonicalize_preserves_query_string() {
        let canon = canonicalize_url("https://docs.example.com/search?q=Foo").unwrap();
        assert_eq!(canon, "https://docs.example.com/search?q=Foo");
    }

    #[test]
    fn embeddable_text_wraps_with_context_when_present() {
        let chunk = Chunk {
            id: uuid::Uuid::new_v4(),
            page_url: "https://docs.example.com/a".into(),
            ordinal: 0,
            content: "Body text.".into(),
            context: Some("Guide > Intro".into()),
            break_type: BreakType::Paragraph,
            char_start: 0,
            char_end: 10,
            embedding: vec![0.0; 4],
            created_at: Utc::now(),
        };
        assert_eq!(chunk.embeddable_text(), "Guide > Intro\n\nBody text.");
    }

    #[test]
    fn embeddable_text_falls_back_to_content_without_context() {
        let chunk = Chunk {
            id: uuid::Uuid::new_v4(),
            page_url: "https://docs.example.com/a".into(),
            ordinal: 0,
            content: "Body text.".into(),
            context: None,
            break_type: BreakType::Force,
            char_start: 0,
            char_end: 10,
            embedding: vec![],
            created_at: Utc::now(),
        };
        assert_eq!(chunk.embeddable_text(), "Body text.");
    }
}
