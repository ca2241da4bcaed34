use std::sync::Arc;
use std::time::Duration;

use docrag_common::{EmbeddingConfig, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{debug, instrument, warn};

use crate::{l2_normalize, Embedder, EmbedError};

const REMOTE_CALL_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
    index: usize,
}

/// Calls a configured embeddings endpoint, bounding in-flight requests with
/// a semaphore the way the teacher bounds parallel crawls in
/// `crawl_urls_parallel`.
pub struct RemoteEmbedder {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    dim: usize,
    concurrency: Arc<Semaphore>,
}

impl RemoteEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let endpoint = config.api_base_url.clone().ok_or_else(|| {
            EmbedError::Configuration("EMBEDDING_API_BASE_URL is required in api mode".into())
        })?;
        let api_key = config.api_key.clone().ok_or_else(|| {
            EmbedError::Configuration("EMBEDDING_API_KEY is required in api mode".into())
        })?;

        let client = reqwest::Client::builder()
            .timeout(REMOTE_CALL_TIMEOUT)
            .build()
            .map_err(|e| EmbedError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            api_key,
            model: config.model.clone(),
            dim: config.dim,
            concurrency: Arc::new(Semaphore::new(config.max_concurrent_remote_calls.max(1))),
        })
    }

    #[instrument(skip(self, texts), fields(batch_size = texts.len()))]
    async fn call(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let _permit = self.concurrency.acquire().await.map_err(|e| {
            EmbedError::Embedding(format!("embedding concurrency semaphore closed: {e}"))
        })?;

        let body = EmbeddingRequest { model: &self.model, input: texts };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| EmbedError::Transient(format!("embedding request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            if status.as_u16() >= 500 || status.as_u16() == 429 {
                return Err(EmbedError::Transient(format!(
                    "embedding endpoint returned {status}: {text}"
                ))
                .into());
            }
            return Err(EmbedError::Embedding(format!(
                "embedding endpoint returned {status}: {text}"
            ))
            .into());
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbedError::Embedding(format!("malformed embedding response: {e}")))?;

        let mut ordered = vec![Vec::new(); texts.len()];
        for datum in parsed.data {
            if datum.index < ordered.len() {
                ordered[datum.index] = datum.embedding;
            }
        }

        for vector in &mut ordered {
            if vector.len() != self.dim {
                warn!(got = vector.len(), expected = self.dim, "embedding dimension mismatch");
            }
            l2_normalize(vector);
        }

        debug!("remote embedding call complete");
        Ok(ordered)
    }
}

#[async_trait::async_trait]
impl Embedder for RemoteEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.call(texts).await
    }

    fn dimension(&self) -> usize {
        self.dim
    }
}
