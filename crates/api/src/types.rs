//! Wire types for the tool-call surface and the dashboard's read-only API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

fn default_match_count() -> u32 {
    5
}

/// Input to the `perform_rag_query` tool call, per SPEC_FULL §6.
#[derive(Debug, Deserialize)]
pub struct QueryToolRequest {
    pub query: String,
    #[serde(default = "default_match_count")]
    pub match_count: u32,
}

#[derive(Debug, Serialize)]
pub struct RetrievedChunkDto {
    pub url: String,
    pub content: String,
    pub similarity: f32,
}

impl From<docrag_common::RetrievedChunk> for RetrievedChunkDto {
    fn from(chunk: docrag_common::RetrievedChunk) -> Self {
        Self { url: chunk.url, content: chunk.content, similarity: chunk.similarity }
    }
}

#[derive(Debug, Serialize)]
pub struct QueryToolResponse {
    pub success: bool,
    pub query: String,
    pub search_mode: &'static str,
    pub reranking_applied: bool,
    pub results: Vec<RetrievedChunkDto>,
    pub count: usize,
}

/// Generic tool/dashboard failure envelope. The tool surface always answers
/// with HTTP 200 and `success: false` so the contract is inspectable without
/// parsing status codes; the dashboard surface preserves HTTP status.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self { success: false, error: error.into() }
    }
}

#[derive(Debug, Deserialize)]
pub struct PageListQuery {
    #[serde(default = "default_sort")]
    pub sort: String,
    #[serde(default = "default_order")]
    pub order: String,
    pub search: Option<String>,
}

fn default_sort() -> String {
    "created_at".to_string()
}

fn default_order() -> String {
    "desc".to_string()
}

#[derive(Debug, Serialize)]
pub struct ListResponse<T: Serialize> {
    pub success: bool,
    pub data: Vec<T>,
    pub count: usize,
}

#[derive(Debug, Deserialize)]
pub struct ChunkListQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_size")]
    pub size: i64,
    pub search: Option<String>,
}

fn default_page() -> i64 {
    1
}

fn default_size() -> i64 {
    50
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub page: i64,
    pub size: i64,
    pub total: i64,
    pub pages: i64,
}

#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T: Serialize> {
    pub success: bool,
    pub data: Vec<T>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct StatsDto {
    pub pages_count: i64,
    pub chunks_count: i64,
    pub pages_with_content: i64,
    pub content_percentage: f64,
    pub pages_processed: i64,
    pub processing_percentage: f64,
}

impl From<docrag_store::StoreStats> for StatsDto {
    fn from(stats: docrag_store::StoreStats) -> Self {
        Self {
            pages_count: stats.pages_count,
            chunks_count: stats.chunks_count,
            pages_with_content: stats.pages_with_content,
            content_percentage: stats.content_percentage(),
            pages_processed: stats.pages_processed,
            processing_percentage: stats.processing_percentage(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub success: bool,
    pub data: StatsDto,
}

/// Health check response, used by the process's own startup probe and by
/// an external uptime check.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_tool_request_defaults_match_count_to_five() {
        let req: QueryToolRequest = serde_json::from_str(r#"{"query": "how do I authenticate?"}"#).unwrap();
        assert_eq!(req.match_count, 5);
    }

    #[test]
    fn page_list_query_defaults_sort_to_created_at_desc() {
        let params: PageListQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(params.sort, "created_at");
        assert_eq!(params.order, "desc");
    }

    #[test]
    fn retrieved_chunk_dto_drops_chunk_id() {
        let chunk = docrag_common::RetrievedChunk {
            chunk_id: uuid::Uuid::new_v4(),
            url: "https://docs.example.com/a".into(),
            content: "body".into(),
            similarity: 0.9,
        };
        let dto = RetrievedChunkDto::from(chunk);
        assert_eq!(dto.url, "https://docs.example.com/a");
        assert_eq!(dto.similarity, 0.9);
    }
}
