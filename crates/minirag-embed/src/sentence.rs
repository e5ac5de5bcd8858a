use std::collections::HashMap;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use minirag_core::config::EmbeddingSettings;
use minirag_core::traits::Embedder;

use crate::device::select_device;
use crate::files::{self, ModelFiles};
use crate::pool::masked_mean_l2;
use crate::tokenize::tokenize_batch;

/// BERT-family sentence encoder with mean pooling, e.g. all-MiniLM-L6-v2.
pub struct SentenceEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    model_id: String,
    dim: usize,
    max_len: usize,
    pad_id: u32,
}

impl SentenceEmbedder {
    pub fn load(settings: &EmbeddingSettings) -> Result<Self> {
        let files = files::resolve(&settings.model, settings.resolved_model_dir().as_deref())?;
        Self::from_files(&settings.model, &files, settings.max_len)
    }

    pub fn from_files(model_id: &str, files: &ModelFiles, max_len: usize) -> Result<Self> {
        let start = Instant::now();
        let device = select_device();

        let tokenizer = Tokenizer::from_file(&files.tokenizer)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {e}", files.tokenizer.display()))?;
        let config: BertConfig = serde_json::from_str(
            &std::fs::read_to_string(&files.config).with_context(|| format!("read {}", files.config.display()))?,
        )?;

        let tensors: HashMap<String, Tensor> = if files.is_safetensors() {
            candle_core::safetensors::load(&files.weights, &device)?
        } else {
            candle_core::pickle::read_all(&files.weights)?.into_iter().collect()
        };
        let vb = VarBuilder::from_tensors(tensors, DType::F32, &device);
        let model = BertModel::load(vb, &config)?;

        let max_len = max_len.min(config.max_position_embeddings);
        let pad_id = tokenizer.token_to_id("[PAD]").unwrap_or(0);
        info!(
            model = model_id,
            dim = config.hidden_size,
            max_len,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "sentence embedder loaded"
        );
        Ok(Self {
            model,
            tokenizer,
            device,
            model_id: model_id.to_string(),
            dim: config.hidden_size,
            max_len,
            pad_id,
        })
    }
}

impl Embedder for SentenceEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn max_len(&self) -> usize {
        self.max_len
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let start = Instant::now();
        let (input_ids, attention_mask) =
            tokenize_batch(&self.tokenizer, texts, self.max_len, self.pad_id, &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;
        let hidden = self.model.forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
        let pooled = masked_mean_l2(&hidden, &attention_mask)?;
        let vectors: Vec<Vec<f32>> = pooled.to_device(&Device::Cpu)?.to_dtype(DType::F32)?.to_vec2()?;

        let elapsed = start.elapsed().as_millis();
        if elapsed > 1_000 {
            warn!(batch = texts.len(), elapsed_ms = elapsed as u64, "slow embedding batch");
        } else {
            debug!(batch = texts.len(), elapsed_ms = elapsed as u64, "embedded batch");
        }
        Ok(vectors)
    }
}
