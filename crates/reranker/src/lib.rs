//! Candidate reranking: component C5.
//!
//! A cross-encoder primary strategy with a cosine-similarity fallback when
//! the model failed to load at startup, per SPEC_FULL §4.5. Grounded on the
//! scoring/sorting shape of the teacher's `reranker.rs`, rebuilt around a
//! templated yes/no prompt and left-padded tokenization instead of the
//! teacher's boost-weight heuristics.

mod calibration;
mod cross_encoder;
mod error;

pub use calibration::CalibrationPolynomial;
pub use cross_encoder::CrossEncoderReranker;
pub use error::RerankError;

use async_trait::async_trait;
use docrag_common::Result;

#[derive(Debug, Clone)]
pub struct Candidate {
    pub content: String,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct RerankOutcome {
    /// `(candidate index, score)` pairs, in no particular order — callers
    /// sort and break ties themselves.
    pub scores: Vec<(usize, f32)>,
    pub reranking_applied: bool,
}

#[async_trait]
pub trait Reranker: Send + Sync {
    async fn rerank(
        &self,
        query: &str,
        query_embedding: &[f32],
        candidates: &[Candidate],
    ) -> Result<RerankOutcome>;
}

/// Cosine similarity of two L2-normalized vectors, rescaled from `[-1, 1]`
/// to the `[0, 1]` range the reranker contract requires.
pub(crate) fn cosine_score(query_embedding: &[f32], candidate_embedding: &[f32]) -> f32 {
    let dot: f32 = query_embedding
        .iter()
        .zip(candidate_embedding.iter())
        .map(|(a, b)| a * b)
        .sum();
    (dot + 1.0) / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_score_maps_identical_vectors_to_one() {
        let v = vec![0.6, 0.8];
        assert!((cosine_score(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_score_maps_opposite_vectors_to_zero() {
        let v = vec![1.0, 0.0];
        let neg = vec![-1.0, 0.0];
        assert!((cosine_score(&v, &neg) - 0.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_score_maps_orthogonal_vectors_to_half() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!((cosine_score(&a, &b) - 0.5).abs() < 1e-6);
    }
}
