//! Offline ingestion: files on disk to a saved vector index.
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use minirag_core::chunker;
use minirag_core::config::Settings;
use minirag_core::loader::{self, DEFAULT_EXTENSIONS};
use minirag_core::traits::Embedder;
use minirag_core::{Error, Result};
use minirag_vector::{VectorIndex, WriteLock};

#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// File or directory to ingest.
    pub source: PathBuf,
    pub index_path: PathBuf,
    pub chunk_size: usize,
    pub overlap: usize,
    pub extensions: Vec<String>,
    /// Add to an existing store instead of replacing it.
    pub append: bool,
    pub batch_size: usize,
}

impl IngestOptions {
    pub fn from_settings(source: impl Into<PathBuf>, settings: &Settings) -> Self {
        Self {
            source: source.into(),
            index_path: settings.index.resolved_path(),
            chunk_size: settings.retrieval.chunk_size,
            overlap: settings.retrieval.chunk_overlap,
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| (*e).to_string()).collect(),
            append: false,
            batch_size: settings.embedding.batch_size,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub files_loaded: usize,
    pub files_skipped: usize,
    pub documents: usize,
    pub chunks: usize,
    /// Entries newly embedded in this run (duplicates are not counted).
    pub added: usize,
    pub total_entries: usize,
    pub saved: bool,
}

/// Load, chunk, embed and save, holding the store's write lock throughout.
///
/// Finding no documents is reported, not an error, and leaves any existing
/// store untouched.
pub async fn ingest(options: &IngestOptions, embedder: Arc<dyn Embedder>) -> Result<IngestReport> {
    let _lock = WriteLock::acquire(&options.index_path)?;

    let source = options.source.clone();
    let extensions = options.extensions.clone();
    let (chunk_size, overlap) = (options.chunk_size, options.overlap);
    let (outcome, chunks) = blocking(move || {
        let exts: Vec<&str> = extensions.iter().map(String::as_str).collect();
        let outcome = loader::load_path(&source, &exts)?;
        let chunks = chunker::chunk(&outcome.documents, chunk_size, overlap)?;
        Ok((outcome, chunks))
    })
    .await?;

    let mut report = IngestReport {
        files_loaded: outcome.files_loaded,
        files_skipped: outcome.skipped.len(),
        documents: outcome.documents.len(),
        chunks: chunks.len(),
        ..IngestReport::default()
    };
    for skipped in &outcome.skipped {
        warn!(path = %skipped.path.display(), reason = %skipped.reason, "file skipped");
    }
    if outcome.documents.is_empty() {
        warn!(source = %options.source.display(), "no documents found; nothing written");
        return Ok(report);
    }

    let index = if options.append && minirag_vector::exists(&options.index_path) {
        VectorIndex::load(&options.index_path, embedder.as_ref()).await?
    } else {
        VectorIndex::new(index_name(&options.index_path), embedder.model_id(), embedder.dim())
    };

    let batch_size = options.batch_size;
    let (index, added) = blocking(move || {
        let mut index = index;
        let added = index.add(chunks, embedder.as_ref(), batch_size)?;
        Ok((index, added))
    })
    .await?;

    index.save(&options.index_path).await?;
    report.added = added;
    report.total_entries = index.len();
    report.saved = true;
    info!(
        source = %options.source.display(),
        store = %options.index_path.display(),
        documents = report.documents,
        chunks = report.chunks,
        added,
        total = report.total_entries,
        "ingestion complete"
    );
    Ok(report)
}

fn index_name(path: &Path) -> String {
    path.file_name().map_or_else(|| "vectorstore".to_string(), |n| n.to_string_lossy().into_owned())
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| Error::Operation(format!("ingest task failed: {e}")))?
}
