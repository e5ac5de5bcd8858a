//! Exact (flat) nearest-neighbour index held in memory.
use std::collections::HashSet;

use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{debug, info};

use minirag_core::traits::Embedder;
use minirag_core::types::{Chunk, SearchHit};

use crate::error::{IndexError, Result};

pub const DEFAULT_BATCH_SIZE: usize = 32;

#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
    pub content_hash: String,
}

/// What the store records about an index, readable without loading vectors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexManifest {
    pub name: String,
    pub embedding_model: String,
    pub dimension: usize,
    pub entries: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub format_version: String,
}

/// Entries are append-only: never mutated in place, never removed.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    pub(crate) name: String,
    pub(crate) embedding_model: String,
    pub(crate) dim: usize,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) entries: Vec<IndexEntry>,
    pub(crate) hashes: HashSet<String>,
}

impl VectorIndex {
    pub fn new(name: impl Into<String>, embedding_model: impl Into<String>, dim: usize) -> Self {
        Self {
            name: name.into(),
            embedding_model: embedding_model.into(),
            dim,
            created_at: Utc::now(),
            entries: Vec::new(),
            hashes: HashSet::new(),
        }
    }

    /// Embed every chunk and collect the entries into a fresh index.
    pub fn build(name: &str, chunks: Vec<Chunk>, embedder: &dyn Embedder, batch_size: usize) -> Result<Self> {
        let mut index = Self::new(name, embedder.model_id(), embedder.dim());
        let added = index.add(chunks, embedder, batch_size)?;
        info!(index = name, entries = added, model = embedder.model_id(), "index built");
        Ok(index)
    }

    /// Append chunks not already present (by content hash). Returns how many
    /// were added; existing entries are never re-embedded.
    pub fn add(&mut self, chunks: Vec<Chunk>, embedder: &dyn Embedder, batch_size: usize) -> Result<usize> {
        self.ensure_compatible(embedder)?;

        let mut seen = HashSet::new();
        let fresh: Vec<(Chunk, String)> = chunks
            .into_iter()
            .map(|c| {
                let hash = c.content_hash();
                (c, hash)
            })
            .filter(|(_, hash)| !self.hashes.contains(hash) && seen.insert(hash.clone()))
            .collect();
        if fresh.is_empty() {
            debug!(index = %self.name, "nothing new to add");
            return Ok(0);
        }

        let pb = progress_bar(fresh.len());
        let mut added = 0usize;
        let mut batch = Vec::with_capacity(batch_size.max(1));
        let total = fresh.len();
        for (i, item) in fresh.into_iter().enumerate() {
            batch.push(item);
            if batch.len() >= batch_size.max(1) || i + 1 == total {
                added += self.embed_and_push(std::mem::take(&mut batch), embedder)?;
                pb.set_position(added as u64);
            }
        }
        pb.finish_and_clear();
        Ok(added)
    }

    fn embed_and_push(&mut self, batch: Vec<(Chunk, String)>, embedder: &dyn Embedder) -> Result<usize> {
        let texts: Vec<String> = batch.iter().map(|(c, _)| c.content.clone()).collect();
        let vectors = embedder.embed_batch(&texts).map_err(IndexError::Embedding)?;
        if vectors.len() != batch.len() {
            return Err(IndexError::Embedding(anyhow::anyhow!(
                "embedder returned {} vectors for {} texts",
                vectors.len(),
                batch.len()
            )));
        }
        let count = batch.len();
        for ((chunk, content_hash), vector) in batch.into_iter().zip(vectors) {
            self.push(IndexEntry { chunk, vector, content_hash })?;
        }
        Ok(count)
    }

    pub(crate) fn push(&mut self, entry: IndexEntry) -> Result<()> {
        if entry.vector.len() != self.dim {
            return Err(IndexError::Dimension { expected: self.dim, got: entry.vector.len() });
        }
        self.hashes.insert(entry.content_hash.clone());
        self.entries.push(entry);
        Ok(())
    }

    /// The `k` nearest entries by squared Euclidean distance, ascending.
    /// Equal distances keep insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if query.len() != self.dim {
            return Err(IndexError::Dimension { expected: self.dim, got: query.len() });
        }
        if k == 0 || self.entries.is_empty() {
            return Ok(Vec::new());
        }
        let mut scored: Vec<(usize, f32)> =
            self.entries.iter().enumerate().map(|(i, e)| (i, squared_l2(query, &e.vector))).collect();
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(k);
        Ok(scored
            .into_iter()
            .map(|(i, distance)| SearchHit { chunk: self.entries[i].chunk.clone(), distance })
            .collect())
    }

    pub fn ensure_compatible(&self, embedder: &dyn Embedder) -> Result<()> {
        if embedder.model_id() != self.embedding_model || embedder.dim() != self.dim {
            return Err(IndexError::ModelMismatch {
                index_model: self.embedding_model.clone(),
                index_dim: self.dim,
                embedder_model: embedder.model_id().to_string(),
                embedder_dim: embedder.dim(),
            });
        }
        Ok(())
    }

    pub fn contains_hash(&self, content_hash: &str) -> bool {
        self.hashes.contains(content_hash)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%)")
        .map(|s| s.progress_chars("#>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb
}
