//! Query engine: component C9.
//!
//! Embeds the query, oversamples candidates from the store, optionally
//! reranks, and returns the final top-k — the same embed→search→rerank shape
//! as the teacher's retrieval stage, generalized from a fixed Qdrant
//! collection to the hybrid/vector store built for this spec.

use std::cmp::Ordering;
use std::sync::Arc;

use docrag_common::{Result, RetrievedChunk};
use docrag_embedder::Embedder;
use docrag_reranker::{Candidate, Reranker};
use docrag_store::Store;
use tracing::{debug, instrument};

/// Candidates are oversampled by this factor ahead of reranking, so the
/// reranker has enough headroom to promote a result the vector/lexical pass
/// ranked outside the final top-k.
const RERANK_OVERSAMPLE_FACTOR: usize = 3;

pub struct QueryEngine {
    embedder: Arc<dyn Embedder>,
    store: Arc<Store>,
    reranker: Option<Arc<dyn Reranker>>,
    hybrid_search: bool,
}

impl QueryEngine {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<Store>,
        reranker: Option<Arc<dyn Reranker>>,
        hybrid_search: bool,
    ) -> Self {
        Self { embedder, store, reranker, hybrid_search }
    }

    #[instrument(skip(self), fields(query_len = query_text.len(), top_k))]
    pub async fn query(&self, query_text: &str, top_k: usize) -> Result<Vec<RetrievedChunk>> {
        let query_vec = self.embedder.embed_one(query_text).await?;

        let oversample = if self.reranker.is_some() {
            (top_k * RERANK_OVERSAMPLE_FACTOR) as i64
        } else {
            top_k as i64
        };

        let candidates = self.fetch_candidates(&query_vec, query_text, oversample).await?;
        debug!(candidate_count = candidates.len(), "fetched oversampled candidates");

        let mut results = match &self.reranker {
            Some(reranker) => self.rerank(reranker.as_ref(), query_text, &query_vec, candidates).await?,
            None => candidates.into_iter().map(|(chunk, _)| chunk).collect(),
        };

        sort_by_similarity_desc(&mut results);
        results.truncate(top_k);
        Ok(results)
    }

    async fn fetch_candidates(
        &self,
        query_vec: &[f32],
        query_text: &str,
        oversample: i64,
    ) -> Result<Vec<(RetrievedChunk, Vec<f32>)>> {
        if self.hybrid_search {
            let matches = self.store.hybrid(query_vec, query_text, oversample).await?;
            Ok(matches.into_iter().map(|m| (m.retrieved, m.embedding)).collect())
        } else {
            let matches = self.store.nearest(query_vec, oversample).await?;
            Ok(matches
                .into_iter()
                .map(|m| {
                    let chunk = RetrievedChunk {
                        chunk_id: m.chunk_id,
                        url: m.url,
                        content: m.content,
                        similarity: 1.0 - m.distance,
                    };
                    (chunk, m.embedding)
                })
                .collect())
        }
    }

    async fn rerank(
        &self,
        reranker: &dyn Reranker,
        query_text: &str,
        query_vec: &[f32],
        candidates: Vec<(RetrievedChunk, Vec<f32>)>,
    ) -> Result<Vec<RetrievedChunk>> {
        let reranker_candidates: Vec<Candidate> = candidates
            .iter()
            .map(|(chunk, embedding)| Candidate { content: chunk.content.clone(), embedding: embedding.clone() })
            .collect();

        let outcome = reranker.rerank(query_text, query_vec, &reranker_candidates).await?;
        debug!(reranking_applied = outcome.reranking_applied, "rerank pass complete");

        Ok(outcome
            .scores
            .into_iter()
            .filter_map(|(index, score)| {
                candidates.get(index).map(|(chunk, _)| RetrievedChunk { similarity: score, ..chunk.clone() })
            })
            .collect())
    }
}

/// Descending similarity, ties broken by chunk id ascending for a
/// deterministic result order across repeated identical queries.
fn sort_by_similarity_desc(results: &mut [RetrievedChunk]) {
    results.sort_by(|a, b| {
        b.similarity.partial_cmp(&a.similarity).unwrap_or(Ordering::Equal).then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(id_byte: u8, similarity: f32) -> RetrievedChunk {
        RetrievedChunk {
            chunk_id: uuid::Uuid::from_bytes([id_byte; 16]),
            url: "https://docs.example.com/a".into(),
            content: "body".into(),
            similarity,
        }
    }

    #[test]
    fn sort_by_similarity_desc_orders_descending() {
        let mut results = vec![sample(1, 0.2), sample(2, 0.9), sample(3, 0.5)];
        sort_by_similarity_desc(&mut results);
        let scores: Vec<f32> = results.iter().map(|r| r.similarity).collect();
        assert_eq!(scores, vec![0.9, 0.5, 0.2]);
    }

    #[test]
    fn sort_by_similarity_desc_breaks_ties_by_chunk_id_ascending() {
        let mut results = vec![sample(9, 0.5), sample(1, 0.5), sample(5, 0.5)];
        sort_by_similarity_desc(&mut results);
        let ids: Vec<u8> = results.iter().map(|r| r.chunk_id.as_bytes()[0]).collect();
        assert_eq!(ids, vec![1, 5, 9]);
    }
}
