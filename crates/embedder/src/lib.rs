//! Dense embedding generation: component C4.
//!
//! Two interchangeable providers behind one [`Embedder`] contract, grounded
//! on the HTTP-client idiom of the teacher's `searxng_client.rs` for the
//! remote path and on the close-domain `coderag` manifest's candle stack for
//! the local path (SPEC_FULL §4.4, §4.10).

mod error;
mod local;
mod remote;

pub use error::EmbedError;
pub use local::LocalEmbedder;
pub use remote::RemoteEmbedder;

use async_trait::async_trait;
use docrag_common::Result;

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts in one call, L2-normalizing each output
    /// vector. The returned vectors preserve input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let mut batch = self.embed_batch(&[text.to_string()]).await?;
        Ok(batch.pop().unwrap_or_default())
    }

    fn dimension(&self) -> usize;
}

/// L2-normalize a vector in place; a zero vector is left unchanged (there is
/// no meaningful unit direction to normalize to).
pub(crate) fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn l2_normalize_produces_unit_length_vector() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[test]
    fn l2_normalize_leaves_zero_vector_untouched() {
        let mut v = vec![0.0, 0.0, 0.0];
        l2_normalize(&mut v);
        assert_eq!(v, vec![0.0, 0.0, 0.0]);
    }
}
