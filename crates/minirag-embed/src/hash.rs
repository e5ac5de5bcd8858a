use std::hash::Hasher;

use anyhow::Result;
use twox_hash::XxHash64;

use minirag_core::traits::Embedder;

/// Bag-of-words feature hashing.
///
/// Each lowercased alphanumeric token adds 1.0 to bucket `xxh64(token) % dim`
/// and the result is L2-normalised, so texts sharing words land close
/// together. Text without any token sets the single bucket `xxh64(text) % dim`,
/// so every output has unit norm.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    model_id: String,
    dim: usize,
    max_len: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { model_id: format!("feature-hash-{dim}"), dim: dim.max(1), max_len: 256 }
    }

    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len;
        self
    }

    fn bucket(&self, bytes: &[u8]) -> usize {
        let mut hasher = XxHash64::with_seed(0);
        hasher.write(bytes);
        (hasher.finish() % self.dim as u64) as usize
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for token in text.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            v[self.bucket(token.to_lowercase().as_bytes())] += 1.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm == 0.0 {
            v[self.bucket(text.as_bytes())] = 1.0;
            return v;
        }
        for x in &mut v {
            *x /= norm;
        }
        v
    }
}

impl Embedder for HashEmbedder {
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
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}
