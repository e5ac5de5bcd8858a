//! LanceDB persistence for [`VectorIndex`].
//!
//! A store is a LanceDB database directory holding a `chunks` table and a
//! key/value `meta` table. Saves are written to a sibling staging directory
//! and swapped into place, so a reader sees either the old store or the new
//! one.
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow_array::types::Float32Type;
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, Int32Array, Int64Array, RecordBatch, RecordBatchIterator, StringArray,
    TimestampMillisecondArray,
};
use arrow_schema::Schema;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection};
use tracing::{debug, info, warn};

use minirag_core::traits::Embedder;
use minirag_core::types::{Chunk, ChunkMetadata, DocumentFormat};

use crate::error::{IndexError, Result};
use crate::index::{IndexEntry, IndexManifest, VectorIndex};
use crate::schema::{chunks_schema, meta_schema, CHUNKS_TABLE, META_TABLE};

pub const FORMAT_VERSION: &str = "1";

const WRITE_BATCH_ROWS: usize = 1024;
const META_ROW_LIMIT: usize = 64;

/// True when something that could be a store exists at `path`.
pub fn exists(path: &Path) -> bool {
    path.is_dir()
}

/// Read the stored metadata without loading any vectors.
pub async fn read_manifest(path: &Path) -> Result<IndexManifest> {
    let conn = open_existing(path).await?;
    read_manifest_from(&conn).await
}

impl VectorIndex {
    /// Write the index to `path`, replacing any store already there.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let parent = parent_dir(path);
        fs::create_dir_all(&parent)?;
        let name = store_name(path);
        let stamp = Utc::now().format("%Y%m%d%H%M%S%3f");
        let staging = parent.join(format!(".{name}.staging-{stamp}"));
        let old = parent.join(format!(".{name}.old-{stamp}"));
        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }

        if let Err(e) = self.write_store(&staging).await {
            if let Err(cleanup) = fs::remove_dir_all(&staging) {
                warn!(staging = %staging.display(), error = %cleanup, "failed to remove staging store");
            }
            return Err(e);
        }
        swap_into_place(&staging, path, &old)?;
        info!(path = %path.display(), entries = self.len(), model = %self.embedding_model, "index saved");
        Ok(())
    }

    /// Open the store at `path` for use with `embedder`.
    ///
    /// Fails with `ModelMismatch` when the store was built with a different
    /// model or dimension; vectors from another model are never mixed in.
    pub async fn load(path: &Path, embedder: &dyn Embedder) -> Result<Self> {
        let conn = open_existing(path).await?;
        let manifest = read_manifest_from(&conn).await?;
        if manifest.embedding_model != embedder.model_id() || manifest.dimension != embedder.dim() {
            return Err(IndexError::ModelMismatch {
                index_model: manifest.embedding_model,
                index_dim: manifest.dimension,
                embedder_model: embedder.model_id().to_string(),
                embedder_dim: embedder.dim(),
            });
        }

        let table = conn.open_table(CHUNKS_TABLE).execute().await?;
        let rows = table.count_rows(None).await?;
        let mut decoded: Vec<(i64, IndexEntry)> = Vec::with_capacity(rows);
        if rows > 0 {
            // Plain queries carry a small default limit; ask for every row.
            let mut stream = table.query().limit(rows).execute().await?;
            while let Some(batch) = stream.try_next().await? {
                decode_batch(&batch, &mut decoded)?;
            }
        }
        if decoded.len() != rows {
            return Err(IndexError::Corrupt(format!("expected {rows} rows, read {}", decoded.len())));
        }
        decoded.sort_by_key(|(seq, _)| *seq);

        let mut index = VectorIndex {
            name: manifest.name,
            embedding_model: manifest.embedding_model,
            dim: manifest.dimension,
            created_at: manifest.created_at,
            entries: Vec::with_capacity(rows),
            hashes: HashSet::with_capacity(rows),
        };
        for (_, entry) in decoded {
            index.push(entry)?;
        }
        info!(path = %path.display(), entries = index.len(), model = %index.embedding_model, "index loaded");
        Ok(index)
    }

    async fn write_store(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;
        let conn = open_db(dir).await?;
        let dim = i32::try_from(self.dim).map_err(|_| IndexError::Corrupt(format!("dimension {} too large", self.dim)))?;

        let schema = chunks_schema(dim);
        let mut batches = Vec::new();
        for (n, rows) in self.entries.chunks(WRITE_BATCH_ROWS).enumerate() {
            batches.push(entries_to_batch(&schema, n * WRITE_BATCH_ROWS, rows, dim)?);
        }
        debug!(rows = self.entries.len(), batches = batches.len(), "writing chunks table");
        let reader = RecordBatchIterator::new(batches.into_iter().map(Ok), schema.clone());
        conn.create_table(CHUNKS_TABLE, Box::new(reader)).execute().await?;

        let meta: [(&str, String); 5] = [
            ("embedding_model", self.embedding_model.clone()),
            ("dimension", self.dim.to_string()),
            ("name", self.name.clone()),
            ("created_at", self.created_at.to_rfc3339()),
            ("format_version", FORMAT_VERSION.to_string()),
        ];
        let now = Utc::now().timestamp_millis();
        let rb = RecordBatch::try_new(
            meta_schema(),
            vec![
                Arc::new(StringArray::from(meta.iter().map(|(k, _)| *k).collect::<Vec<_>>())),
                Arc::new(StringArray::from(meta.iter().map(|(_, v)| v.as_str()).collect::<Vec<_>>())),
                Arc::new(TimestampMillisecondArray::from(vec![now; meta.len()])),
            ],
        )?;
        let reader = RecordBatchIterator::new(vec![Ok(rb)].into_iter(), meta_schema());
        conn.create_table(META_TABLE, Box::new(reader)).execute().await?;
        Ok(())
    }
}

async fn open_db(path: &Path) -> Result<Connection> {
    Ok(connect(path.to_string_lossy().as_ref()).execute().await?)
}

async fn open_existing(path: &Path) -> Result<Connection> {
    if !exists(path) {
        return Err(IndexError::NotFound(path.to_path_buf()));
    }
    let conn = open_db(path).await?;
    let names = conn.table_names().execute().await?;
    if ![CHUNKS_TABLE, META_TABLE].iter().all(|t| names.iter().any(|n| n == t)) {
        return Err(IndexError::NotFound(path.to_path_buf()));
    }
    Ok(conn)
}

async fn read_manifest_from(conn: &Connection) -> Result<IndexManifest> {
    let meta = conn.open_table(META_TABLE).execute().await?;
    let mut stream = meta.query().limit(META_ROW_LIMIT).execute().await?;
    let mut values = HashMap::new();
    let mut updated_ms: Option<i64> = None;
    while let Some(batch) = stream.try_next().await? {
        let keys = column::<StringArray>(&batch, "key")?;
        let vals = column::<StringArray>(&batch, "value")?;
        let stamps = column::<TimestampMillisecondArray>(&batch, "updated_at")?;
        for i in 0..batch.num_rows() {
            values.insert(keys.value(i).to_string(), vals.value(i).to_string());
            updated_ms = updated_ms.max(Some(stamps.value(i)));
        }
    }

    let get = |key: &str| {
        values.get(key).cloned().ok_or_else(|| IndexError::Corrupt(format!("meta key `{key}` is missing")))
    };
    let dimension = get("dimension")?
        .parse::<usize>()
        .map_err(|e| IndexError::Corrupt(format!("meta key `dimension` is not a number: {e}")))?;
    let created_at = DateTime::parse_from_rfc3339(&get("created_at")?)
        .map_err(|e| IndexError::Corrupt(format!("meta key `created_at` is not a timestamp: {e}")))?
        .with_timezone(&Utc);
    let updated_at = updated_ms.and_then(DateTime::<Utc>::from_timestamp_millis).unwrap_or(created_at);

    let chunks = conn.open_table(CHUNKS_TABLE).execute().await?;
    let entries = chunks.count_rows(None).await?;

    Ok(IndexManifest {
        name: get("name")?,
        embedding_model: get("embedding_model")?,
        dimension,
        entries,
        created_at,
        updated_at,
        format_version: get("format_version")?,
    })
}

fn entries_to_batch(schema: &Arc<Schema>, first_seq: usize, rows: &[IndexEntry], dim: i32) -> Result<RecordBatch> {
    let to_i64 = |v: usize| i64::try_from(v).unwrap_or(i64::MAX);
    let seq: Vec<i64> = (first_seq..first_seq + rows.len()).map(to_i64).collect();
    let meta = |f: fn(&ChunkMetadata) -> usize| rows.iter().map(|e| to_i64(f(&e.chunk.metadata))).collect::<Vec<_>>();
    let vectors = rows.iter().map(|e| Some(e.vector.iter().copied().map(Some)));

    Ok(RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Int64Array::from(seq)),
            Arc::new(StringArray::from(rows.iter().map(|e| e.chunk.id.as_str()).collect::<Vec<_>>())),
            Arc::new(StringArray::from(rows.iter().map(|e| e.chunk.metadata.source.as_str()).collect::<Vec<_>>())),
            Arc::new(Int32Array::from(
                rows.iter().map(|e| e.chunk.metadata.page.and_then(|p| i32::try_from(p).ok())).collect::<Vec<_>>(),
            )),
            Arc::new(StringArray::from(rows.iter().map(|e| e.chunk.metadata.format.as_str()).collect::<Vec<_>>())),
            Arc::new(Int64Array::from(meta(|m| m.chunk_index))),
            Arc::new(Int64Array::from(meta(|m| m.total_chunks))),
            Arc::new(Int64Array::from(meta(|m| m.start_index))),
            Arc::new(StringArray::from(rows.iter().map(|e| e.chunk.content.as_str()).collect::<Vec<_>>())),
            Arc::new(StringArray::from(rows.iter().map(|e| e.content_hash.as_str()).collect::<Vec<_>>())),
            Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors, dim)),
        ],
    )?)
}

fn decode_batch(batch: &RecordBatch, out: &mut Vec<(i64, IndexEntry)>) -> Result<()> {
    let seq = column::<Int64Array>(batch, "seq")?;
    let ids = column::<StringArray>(batch, "id")?;
    let sources = column::<StringArray>(batch, "source")?;
    let pages = column::<Int32Array>(batch, "page")?;
    let formats = column::<StringArray>(batch, "format")?;
    let chunk_index = column::<Int64Array>(batch, "chunk_index")?;
    let total_chunks = column::<Int64Array>(batch, "total_chunks")?;
    let start_index = column::<Int64Array>(batch, "start_index")?;
    let contents = column::<StringArray>(batch, "content")?;
    let hashes = column::<StringArray>(batch, "content_hash")?;
    let vectors = column::<FixedSizeListArray>(batch, "vector")?;

    let to_usize = |v: i64| usize::try_from(v).map_err(|_| IndexError::Corrupt(format!("negative position {v}")));
    for i in 0..batch.num_rows() {
        let format = DocumentFormat::parse(formats.value(i))
            .ok_or_else(|| IndexError::Corrupt(format!("unknown document format `{}`", formats.value(i))))?;
        let page = if pages.is_null(i) { None } else { u32::try_from(pages.value(i)).ok() };
        let values = vectors.value(i);
        let vector = values
            .as_any()
            .downcast_ref::<Float32Array>()
            .ok_or_else(|| IndexError::Corrupt("vector column is not float32".into()))?
            .values()
            .to_vec();

        let chunk = Chunk {
            id: ids.value(i).to_string(),
            content: contents.value(i).to_string(),
            metadata: ChunkMetadata {
                source: sources.value(i).to_string(),
                page,
                format,
                chunk_index: to_usize(chunk_index.value(i))?,
                total_chunks: to_usize(total_chunks.value(i))?,
                start_index: to_usize(start_index.value(i))?,
            },
        };
        out.push((seq.value(i), IndexEntry { chunk, vector, content_hash: hashes.value(i).to_string() }));
    }
    Ok(())
}

fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or_else(|| IndexError::Corrupt(format!("column `{name}` is missing or has the wrong type")))
}

fn swap_into_place(staging: &Path, target: &Path, old: &Path) -> Result<()> {
    let had_old = target.exists();
    if had_old {
        fs::rename(target, old)?;
    }
    if let Err(e) = fs::rename(staging, target) {
        if had_old {
            if let Err(restore) = fs::rename(old, target) {
                warn!(old = %old.display(), error = %restore, "failed to restore previous store");
            }
        }
        return Err(e.into());
    }
    if had_old {
        if let Err(e) = fs::remove_dir_all(old) {
            warn!(old = %old.display(), error = %e, "failed to remove previous store");
        }
    }
    Ok(())
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent().filter(|p| !p.as_os_str().is_empty()).map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

fn store_name(path: &Path) -> String {
    path.file_name().map_or_else(|| "index".into(), |n| n.to_string_lossy().into_owned())
}
