//! Persistent page/chunk storage: component C6.
//!
//! Built around the `PgPoolOptions` idiom from the teacher's
//! `postgres.rs`, extended into the pages/chunks schema, the atomic
//! replace-chunks write path, and the three read methods SPEC_FULL §4.6
//! describes.

mod error;
mod postgres;

pub use error::StoreError;
pub use postgres::Store;

#[derive(Debug, Clone)]
pub struct NearestMatch {
    pub chunk_id: uuid::Uuid,
    pub url: String,
    pub content: String,
    pub embedding: Vec<f32>,
    pub distance: f32,
}

#[derive(Debug, Clone)]
pub struct KeywordMatch {
    pub chunk_id: uuid::Uuid,
    pub url: String,
    pub content: String,
    pub embedding: Vec<f32>,
    pub lex_score: f32,
}

/// A fused hybrid-search result paired with its chunk embedding, used by the
/// retrieval engine to build reranker candidates without a second round
/// trip to the store.
#[derive(Debug, Clone)]
pub struct HybridMatch {
    pub retrieved: docrag_common::RetrievedChunk,
    pub embedding: Vec<f32>,
}

/// A chunk row as shown by the dashboard, stripped of its embedding vector.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ChunkSummary {
    pub id: uuid::Uuid,
    pub page_url: String,
    pub ordinal: i32,
    pub content: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Copy)]
pub struct StoreStats {
    pub pages_count: i64,
    pub chunks_count: i64,
    pub pages_with_content: i64,
    pub pages_processed: i64,
}

impl StoreStats {
    pub fn content_percentage(&self) -> f64 {
        percentage(self.pages_with_content, self.pages_count)
    }

    pub fn processing_percentage(&self) -> f64 {
        percentage(self.pages_processed, self.pages_count)
    }
}

fn percentage(part: i64, whole: i64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        (part as f64 / whole as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_is_zero_when_no_pages_exist() {
        let stats = StoreStats { pages_count: 0, chunks_count: 0, pages_with_content: 0, pages_processed: 0 };
        assert_eq!(stats.content_percentage(), 0.0);
        assert_eq!(stats.processing_percentage(), 0.0);
    }

    #[test]
    fn percentage_reflects_processed_fraction() {
        let stats = StoreStats { pages_count: 4, chunks_count: 10, pages_with_content: 3, pages_processed: 2 };
        assert_eq!(stats.content_percentage(), 75.0);
        assert_eq!(stats.processing_percentage(), 50.0);
    }
}
