//! Text embedders: a BERT sentence encoder on candle and a deterministic
//! hashing embedder for tests and offline runs.
use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use minirag_core::config::EmbeddingSettings;
use minirag_core::traits::Embedder;

pub mod device;
pub mod files;
pub mod hash;
pub mod pool;
pub mod sentence;
pub mod tokenize;

pub use hash::HashEmbedder;
pub use pool::masked_mean_l2;
pub use sentence::SentenceEmbedder;

/// Build the embedder the settings ask for.
pub fn load_embedder(settings: &EmbeddingSettings) -> Result<Arc<dyn Embedder>> {
    if settings.use_fake {
        info!(dim = settings.dim, "using hashing embedder");
        return Ok(Arc::new(HashEmbedder::new(settings.dim).with_max_len(settings.max_len)));
    }
    Ok(Arc::new(SentenceEmbedder::load(settings)?))
}
