use std::path::PathBuf;
use std::sync::Arc;

use candle_core::{DType, Device, Tensor};
use candle_nn::{Linear, Module, VarBuilder};
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use docrag_common::Result;
use hf_hub::api::sync::Api;
use tokenizers::{PaddingDirection, PaddingParams, PaddingStrategy, Tokenizer};
use tracing::{info, instrument, warn};

use crate::calibration::CalibrationPolynomial;
use crate::{cosine_score, Candidate, Reranker, RerankError, RerankOutcome};

struct LoadedCrossEncoder {
    model: BertModel,
    /// Two-way head over the final-position hidden state: logit 0 is "no",
    /// logit 1 is "yes".
    classifier: Linear,
    tokenizer: Tokenizer,
    device: Device,
}

/// Scores `(query, candidate)` pairs with a templated yes/no prompt,
/// extracting the affirmative probability from the final-position logits.
/// Falls back to [`cosine_score`] for every call if the model failed to
/// load at construction time, per SPEC_FULL §4.5.
pub struct CrossEncoderReranker {
    inner: Option<Arc<tokio::sync::Mutex<LoadedCrossEncoder>>>,
    calibration: Option<CalibrationPolynomial>,
}

impl CrossEncoderReranker {
    /// Attempts to load the configured model; never fails construction —
    /// a load failure degrades this instance to cosine-only for its
    /// lifetime, matching the "reranker unavailable at startup" case.
    pub fn load(model_id: &str, apply_calibration: bool) -> Self {
        let calibration = apply_calibration.then(CalibrationPolynomial::identity);

        match Self::try_load(model_id) {
            Ok(loaded) => {
                info!(model = model_id, "cross-encoder reranker model loaded");
                Self { inner: Some(Arc::new(tokio::sync::Mutex::new(loaded))), calibration }
            }
            Err(e) => {
                warn!(model = model_id, error = %e, "reranker model unavailable, falling back to cosine similarity");
                Self { inner: None, calibration }
            }
        }
    }

    fn try_load(model_id: &str) -> Result<LoadedCrossEncoder> {
        let device = Device::Cpu;
        let api = Api::new()
            .map_err(|e| RerankError::Configuration(format!("failed to reach model hub: {e}")))?;
        let repo = api.model(model_id.to_string());

        let config_path: PathBuf = repo
            .get("config.json")
            .map_err(|e| RerankError::Configuration(format!("missing config.json: {e}")))?;
        let tokenizer_path: PathBuf = repo
            .get("tokenizer.json")
            .map_err(|e| RerankError::Configuration(format!("missing tokenizer.json: {e}")))?;
        let weights_path: PathBuf = repo
            .get("model.safetensors")
            .map_err(|e| RerankError::Configuration(format!("missing weights: {e}")))?;

        let bert_config: BertConfig = serde_json::from_str(
            &std::fs::read_to_string(&config_path)
                .map_err(|e| RerankError::Configuration(format!("cannot read config.json: {e}")))?,
        )
        .map_err(|e| RerankError::Configuration(format!("malformed config.json: {e}")))?;

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| RerankError::Configuration(format!("cannot load tokenizer: {e}")))?;
        // Left padding so the last sequence position is always the final
        // real token, the position the yes/no decision is read from.
        tokenizer.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::BatchLongest,
            direction: PaddingDirection::Left,
            pad_id: bert_config.pad_token_id as u32,
            ..Default::default()
        }));

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, &device)
                .map_err(|e| RerankError::Configuration(format!("failed to load weights: {e}")))?
        };
        let model = BertModel::load(vb.pp("bert"), &bert_config)
            .map_err(|e| RerankError::Configuration(format!("failed to build model: {e}")))?;
        let classifier = candle_nn::linear(bert_config.hidden_size, 2, vb.pp("classifier"))
            .map_err(|e| RerankError::Configuration(format!("failed to build classifier head: {e}")))?;

        Ok(LoadedCrossEncoder { model, classifier, tokenizer, device })
    }

    fn prompt(query: &str, candidate: &str) -> String {
        format!("query: {query}\ndocument: {candidate}\nRelevant (yes/no)?")
    }

    #[instrument(skip(texts, state), fields(batch_size = texts.len()))]
    fn score_batch(texts: &[String], state: &mut LoadedCrossEncoder) -> Result<Vec<f32>> {
        let encodings = state
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| RerankError::Embedding(format!("tokenization failed: {e}")))?;

        let token_ids: Vec<Vec<u32>> = encodings.iter().map(|e| e.get_ids().to_vec()).collect();
        let attention_masks: Vec<Vec<u32>> =
            encodings.iter().map(|e| e.get_attention_mask().to_vec()).collect();

        let input_ids = Tensor::new(token_ids, &state.device)
            .map_err(|e| RerankError::Embedding(format!("failed to build input tensor: {e}")))?;
        let mask_tensor = Tensor::new(attention_masks, &state.device)
            .map_err(|e| RerankError::Embedding(format!("failed to build attention mask: {e}")))?;
        let token_type_ids = input_ids
            .zeros_like()
            .map_err(|e| RerankError::Embedding(format!("failed to build token type ids: {e}")))?;

        let hidden_states = state
            .model
            .forward(&input_ids, &token_type_ids, Some(&mask_tensor))
            .map_err(|e| RerankError::Embedding(format!("forward pass failed: {e}")))?;

        let (_, seq_len, _) = hidden_states
            .dims3()
            .map_err(|e| RerankError::Embedding(format!("unexpected hidden state shape: {e}")))?;
        let final_position = hidden_states
            .narrow(1, seq_len - 1, 1)
            .and_then(|t| t.squeeze(1))
            .map_err(|e| RerankError::Embedding(format!("failed to select final position: {e}")))?;

        let logits = state
            .classifier
            .forward(&final_position)
            .map_err(|e| RerankError::Embedding(format!("classifier head failed: {e}")))?;
        let probabilities = candle_nn::ops::softmax(&logits, 1)
            .map_err(|e| RerankError::Embedding(format!("softmax failed: {e}")))?;

        let yes_probabilities: Vec<f32> = probabilities
            .narrow(1, 1, 1)
            .and_then(|t| t.squeeze(1))
            .and_then(|t| t.to_vec1())
            .map_err(|e| RerankError::Embedding(format!("failed to read scores: {e}")))?;

        Ok(yes_probabilities)
    }
}

#[async_trait::async_trait]
impl Reranker for CrossEncoderReranker {
    async fn rerank(
        &self,
        query: &str,
        query_embedding: &[f32],
        candidates: &[Candidate],
    ) -> Result<RerankOutcome> {
        let Some(inner) = &self.inner else {
            let scores = candidates
                .iter()
                .enumerate()
                .map(|(idx, c)| (idx, cosine_score(query_embedding, &c.embedding)))
                .collect();
            return Ok(RerankOutcome { scores, reranking_applied: false });
        };

        let prompts: Vec<String> =
            candidates.iter().map(|c| Self::prompt(query, &c.content)).collect();

        let inner = inner.clone();
        let raw_scores = tokio::task::spawn_blocking(move || {
            let mut state = inner.blocking_lock();
            Self::score_batch(&prompts, &mut state)
        })
        .await
        .map_err(|e| RerankError::Embedding(format!("reranker task panicked: {e}")))??;

        let scores = raw_scores
            .into_iter()
            .enumerate()
            .map(|(idx, raw)| {
                let score = match &self.calibration {
                    Some(calibration) => calibration.apply(raw),
                    None => raw,
                };
                (idx, score)
            })
            .collect();

        Ok(RerankOutcome { scores, reranking_applied: true })
    }
}
