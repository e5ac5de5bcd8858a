use std::sync::Arc;

use tracing::{error, info, warn};

use minirag_core::config::Settings;
use minirag_core::traits::{Embedder, Generator};
use minirag_core::types::{Answer, SearchHit};
use minirag_core::{Error, Result};
use minirag_llm::OllamaGenerator;
use minirag_vector::{IndexError, VectorIndex};

use crate::pipeline::{self, AnswerPolicy, Timeouts};

/// Long-lived components shared by every request.
///
/// Each component is optional: a failure while starting one is logged and
/// the service runs degraded rather than refusing to start.
#[derive(Clone)]
pub struct AppContext {
    pub settings: Settings,
    pub embedder: Option<Arc<dyn Embedder>>,
    pub index: Option<Arc<VectorIndex>>,
    pub generator: Option<Arc<dyn Generator>>,
}

impl AppContext {
    pub fn new(
        settings: Settings,
        embedder: Option<Arc<dyn Embedder>>,
        index: Option<Arc<VectorIndex>>,
        generator: Option<Arc<dyn Generator>>,
    ) -> Self {
        Self { settings, embedder, index, generator }
    }

    /// Start the embedder, then the index, then the generator.
    pub async fn initialize(settings: Settings) -> Self {
        let embedder = load_embedder(&settings).await;
        let index = match &embedder {
            Some(embedder) => load_index(&settings, embedder.as_ref()).await,
            None => {
                warn!("vector store not loaded: no embedder");
                None
            }
        };
        let generator = connect_generator(&settings).await;
        info!(
            embedder = embedder.is_some(),
            index = index.is_some(),
            generator = generator.is_some(),
            "service ready"
        );
        Self { settings, embedder, index, generator }
    }

    pub fn policy(&self) -> AnswerPolicy {
        AnswerPolicy::from_settings(&self.settings.llm)
    }

    pub fn timeouts(&self) -> Timeouts {
        Timeouts::from_settings(&self.settings)
    }

    pub fn indexed_chunks(&self) -> usize {
        self.index.as_ref().map_or(0, |i| i.len())
    }

    fn ready(&self) -> Result<(&VectorIndex, Arc<dyn Embedder>)> {
        let index = self.index.as_deref().ok_or_else(|| Error::ServiceUnavailable("Vector store not initialized".into()))?;
        let embedder = self.embedder.clone().ok_or_else(|| Error::ServiceUnavailable("Embedder not initialized".into()))?;
        Ok((index, embedder))
    }

    pub async fn query(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        let (index, embedder) = self.ready()?;
        pipeline::retrieve(index, embedder, query, k, self.timeouts().embed).await
    }

    pub async fn ask(&self, question: &str, k: usize) -> Result<Answer> {
        let (index, embedder) = self.ready()?;
        pipeline::answer(question, k, index, embedder, self.generator.clone(), self.policy(), self.timeouts()).await
    }

    pub fn shutdown(&self) {
        info!("shutting down");
    }
}

async fn load_embedder(settings: &Settings) -> Option<Arc<dyn Embedder>> {
    let embedding = settings.embedding.clone();
    info!(model = %embedding.model, fake = embedding.use_fake, "loading embedder");
    match tokio::task::spawn_blocking(move || minirag_embed::load_embedder(&embedding)).await {
        Ok(Ok(embedder)) => Some(embedder),
        Ok(Err(e)) => {
            error!(error = %format!("{e:#}"), "failed to load embedder");
            None
        }
        Err(e) => {
            error!(error = %e, "embedder loader task failed");
            None
        }
    }
}

async fn load_index(settings: &Settings, embedder: &dyn Embedder) -> Option<Arc<VectorIndex>> {
    let path = settings.index.resolved_path();
    match VectorIndex::load(&path, embedder).await {
        Ok(index) => Some(Arc::new(index)),
        Err(IndexError::NotFound(_)) => {
            warn!(path = %path.display(), "vector store not found; run `minirag-ingest <path>` first");
            None
        }
        Err(e) => {
            error!(path = %path.display(), error = %e, "vector store not loaded");
            None
        }
    }
}

async fn connect_generator(settings: &Settings) -> Option<Arc<dyn Generator>> {
    if !settings.llm.enabled {
        info!("answer generation disabled");
        return None;
    }
    let generator = match OllamaGenerator::from_settings(&settings.llm) {
        Ok(generator) => generator,
        Err(e) => {
            error!(error = %e, "failed to create ollama client");
            return None;
        }
    };
    if generator.is_available().await {
        info!(model = %settings.llm.model, url = generator.base_url(), "ollama connected");
        Some(Arc::new(generator))
    } else {
        warn!(url = generator.base_url(), "ollama not available; answers will be retrieval-only");
        warn!(model = %settings.llm.model, "start it with `ollama serve` and `ollama pull <model>`");
        None
    }
}
