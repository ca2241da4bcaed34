use std::path::PathBuf;
use std::sync::Arc;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use docrag_common::{EmbeddingConfig, Result};
use hf_hub::api::sync::Api;
use tokenizers::{PaddingDirection, PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};
use tracing::{info, instrument};

use crate::{l2_normalize, Embedder, EmbedError};

struct LoadedModel {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
}

/// A transformer loaded once at startup and run in 32-bit precision so its
/// output matches the remote provider to the cosine-distance tolerance
/// required by SPEC_FULL §4.4's conformance test.
///
/// Inference is CPU-bound and the model is not `Sync`-safe to call
/// concurrently, so every call is routed through `spawn_blocking` behind a
/// `tokio::sync::Mutex`, serializing requests to the single accelerator.
pub struct LocalEmbedder {
    inner: Arc<tokio::sync::Mutex<LoadedModel>>,
    dim: usize,
    max_length: usize,
}

impl LocalEmbedder {
    pub fn load(config: &EmbeddingConfig) -> Result<Self> {
        let device = Device::Cpu;

        let api = Api::new()
            .map_err(|e| EmbedError::Configuration(format!("failed to reach model hub: {e}")))?;
        let repo = api.model(config.model.clone());

        let config_path: PathBuf = repo
            .get("config.json")
            .map_err(|e| EmbedError::Configuration(format!("missing model config.json: {e}")))?;
        let tokenizer_path: PathBuf = repo
            .get("tokenizer.json")
            .map_err(|e| EmbedError::Configuration(format!("missing tokenizer.json: {e}")))?;
        let weights_path: PathBuf = repo
            .get("model.safetensors")
            .map_err(|e| EmbedError::Configuration(format!("missing model weights: {e}")))?;

        let bert_config: BertConfig = serde_json::from_str(
            &std::fs::read_to_string(&config_path)
                .map_err(|e| EmbedError::Configuration(format!("cannot read config.json: {e}")))?,
        )
        .map_err(|e| EmbedError::Configuration(format!("malformed config.json: {e}")))?;

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| EmbedError::Configuration(format!("cannot load tokenizer: {e}")))?;
        tokenizer.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::BatchLongest,
            direction: PaddingDirection::Right,
            pad_id: bert_config.pad_token_id as u32,
            ..Default::default()
        }));
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: config.max_length,
                ..Default::default()
            }))
            .map_err(|e| EmbedError::Configuration(format!("invalid truncation params: {e}")))?;

        // 32-bit precision, not 16-bit, to match the remote provider's
        // numerical output within the required tolerance.
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, &device)
                .map_err(|e| EmbedError::Configuration(format!("failed to load weights: {e}")))?
        };
        let model = BertModel::load(vb, &bert_config)
            .map_err(|e| EmbedError::Configuration(format!("failed to build model: {e}")))?;

        info!(model = %config.model, dim = config.dim, "local embedding model loaded");

        Ok(Self {
            inner: Arc::new(tokio::sync::Mutex::new(LoadedModel { model, tokenizer, device })),
            dim: config.dim,
            max_length: config.max_length,
        })
    }

    /// Last-token pooling under right-padded tokenization: the
    /// representation of the last non-pad token of each sequence. Pooling
    /// happens on host-side vectors rather than via a tensor gather op —
    /// batches here are small (a processing wave's chunk count) so the
    /// extra copy is negligible next to the forward pass itself.
    fn pool_last_token(
        hidden_states: &Tensor,
        attention_mask: &[Vec<u32>],
    ) -> Result<Vec<Vec<f32>>> {
        let hidden: Vec<Vec<Vec<f32>>> = hidden_states
            .to_dtype(DType::F32)
            .and_then(|t| t.to_vec3())
            .map_err(|e| EmbedError::Embedding(format!("failed to read hidden states: {e}")))?;

        let mut pooled = Vec::with_capacity(hidden.len());
        for (sequence, mask) in hidden.iter().zip(attention_mask.iter()) {
            let last_real_index = mask
                .iter()
                .rposition(|&m| m == 1)
                .unwrap_or(sequence.len().saturating_sub(1));
            pooled.push(sequence[last_real_index].clone());
        }
        Ok(pooled)
    }
}

#[instrument(skip(texts, state), fields(batch_size = texts.len()))]
fn forward(texts: &[String], state: &mut LoadedModel) -> Result<Vec<Vec<f32>>> {
    let encodings = state
        .tokenizer
        .encode_batch(texts.to_vec(), true)
        .map_err(|e| EmbedError::Embedding(format!("tokenization failed: {e}")))?;

    let attention_masks: Vec<Vec<u32>> =
        encodings.iter().map(|e| e.get_attention_mask().to_vec()).collect();

    let token_ids: Vec<Vec<u32>> = encodings.iter().map(|e| e.get_ids().to_vec()).collect();

    let input_ids = Tensor::new(token_ids, &state.device)
        .map_err(|e| EmbedError::Embedding(format!("failed to build input tensor: {e}")))?;
    let mask_tensor = Tensor::new(attention_masks.clone(), &state.device)
        .map_err(|e| EmbedError::Embedding(format!("failed to build attention mask: {e}")))?;
    let token_type_ids = input_ids
        .zeros_like()
        .map_err(|e| EmbedError::Embedding(format!("failed to build token type ids: {e}")))?;

    let hidden_states = state
        .model
        .forward(&input_ids, &token_type_ids, Some(&mask_tensor))
        .map_err(|e| EmbedError::Embedding(format!("forward pass failed: {e}")))?;

    let mut pooled = LocalEmbedder::pool_last_token(&hidden_states, &attention_masks)?;
    for vector in &mut pooled {
        l2_normalize(vector);
    }
    Ok(pooled)
}

#[async_trait::async_trait]
impl Embedder for LocalEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let inner = self.inner.clone();
        let texts = texts.to_vec();
        tokio::task::spawn_blocking(move || {
            let mut state = inner.blocking_lock();
            forward(&texts, &mut state)
        })
        .await
        .map_err(|e| EmbedError::Embedding(format!("embedding task panicked: {e}")))?
    }

    fn dimension(&self) -> usize {
        self.dim
    }
}
