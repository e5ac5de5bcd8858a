//! Query-time retrieval and answer synthesis.
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use minirag_core::config::{LlmSettings, Settings};
use minirag_core::traits::{Embedder, Generator};
use minirag_core::types::{Answer, AnswerMode, Chunk, SearchHit};
use minirag_core::{Error, Result};
use minirag_vector::VectorIndex;

/// What to do when the generator cannot be reached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AnswerPolicy {
    /// Return the retrieved contexts with no answer text.
    #[default]
    FallbackToRetrieval,
    /// Surface the generator's `ServiceUnavailable`/`Timeout` error.
    RequireGenerator,
}

impl AnswerPolicy {
    pub fn from_settings(llm: &LlmSettings) -> Self {
        if llm.fallback_to_retrieval {
            Self::FallbackToRetrieval
        } else {
            Self::RequireGenerator
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub embed: Duration,
    pub generate: Duration,
}

impl Timeouts {
    pub fn from_settings(settings: &Settings) -> Self {
        Self { embed: settings.embedding.timeout(), generate: settings.llm.timeout() }
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

/// Embed `query` off the async runtime and return the `k` nearest chunks.
pub async fn retrieve(
    index: &VectorIndex,
    embedder: Arc<dyn Embedder>,
    query: &str,
    k: usize,
    timeout: Duration,
) -> Result<Vec<SearchHit>> {
    let query = query.trim();
    if query.is_empty() {
        return Err(Error::Validation("query must not be empty".into()));
    }
    let vector = embed_query(embedder, query, timeout).await?;
    let hits = index.search(&vector, k)?;
    debug!(k, hits = hits.len(), "retrieved contexts");
    Ok(hits)
}

/// Retrieve contexts for `question`, then ask the generator.
///
/// The retrieved chunks are never passed off as the answer: when generation
/// is skipped the answer is `None` and the mode says so.
pub async fn answer(
    question: &str,
    k: usize,
    index: &VectorIndex,
    embedder: Arc<dyn Embedder>,
    generator: Option<Arc<dyn Generator>>,
    policy: AnswerPolicy,
    timeouts: Timeouts,
) -> Result<Answer> {
    let contexts = retrieve(index, embedder, question, k, timeouts.embed).await?;

    let generated = match generator {
        Some(generator) => {
            let chunks: Vec<Chunk> = contexts.iter().map(|h| h.chunk.clone()).collect();
            match tokio::time::timeout(timeouts.generate, generator.generate(question, &chunks)).await {
                Ok(result) => result,
                Err(_) => Err(Error::Timeout(format!("generation exceeded {:?}", timeouts.generate))),
            }
        }
        None => Err(Error::ServiceUnavailable("no answer generator is available".into())),
    };

    match generated {
        Ok(text) => Ok(Answer { question: question.to_string(), answer: Some(text), contexts, mode: AnswerMode::Generated }),
        Err(e) if e.is_unavailable() && policy == AnswerPolicy::FallbackToRetrieval => {
            warn!(error = %e, "answering in retrieval-only mode");
            Ok(Answer { question: question.to_string(), answer: None, contexts, mode: AnswerMode::RetrievalOnly })
        }
        Err(e) => Err(e),
    }
}

async fn embed_query(embedder: Arc<dyn Embedder>, text: &str, timeout: Duration) -> Result<Vec<f32>> {
    let text = text.to_string();
    let task = tokio::task::spawn_blocking(move || embedder.embed(&text));
    match tokio::time::timeout(timeout, task).await {
        Err(_) => Err(Error::Timeout(format!("query embedding exceeded {timeout:?}"))),
        Ok(Err(join)) => Err(Error::Operation(format!("embedding task failed: {join}"))),
        Ok(Ok(Err(e))) => Err(Error::Operation(format!("embedding failed: {e:#}"))),
        Ok(Ok(Ok(vector))) => Ok(vector),
    }
}
