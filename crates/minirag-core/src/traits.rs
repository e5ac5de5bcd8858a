use async_trait::async_trait;

use crate::types::Chunk;

/// Maps text to fixed-length, L2-normalised vectors.
///
/// Given a fixed model, outputs are a pure function of the input text.
pub trait Embedder: Send + Sync {
    /// Identifier recorded next to every index built with this embedder.
    fn model_id(&self) -> &str;
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("embedder returned no vector"))
    }
}

/// Produces an answer to a question from retrieved context.
///
/// Implementations are expected (not guaranteed) to answer "I don't know"
/// when the contexts do not support an answer. An unreachable backend must
/// surface as `Error::ServiceUnavailable`, a slow one as `Error::Timeout`.
#[async_trait]
pub trait Generator: Send + Sync {
    fn model(&self) -> &str;
    async fn generate(&self, question: &str, contexts: &[Chunk]) -> crate::Result<String>;
    async fn is_available(&self) -> bool;
}
