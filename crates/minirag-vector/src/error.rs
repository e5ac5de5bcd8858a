use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("no index found at {}", .0.display())]
    NotFound(PathBuf),

    #[error("index was built with {index_model} ({index_dim}d) but the embedder is {embedder_model} ({embedder_dim}d); rebuild the index")]
    ModelMismatch { index_model: String, index_dim: usize, embedder_model: String, embedder_dim: usize },

    #[error("vector has {got} dimensions, index expects {expected}")]
    Dimension { expected: usize, got: usize },

    #[error("index is being written by another process (lock file {})", .0.display())]
    Busy(PathBuf),

    #[error("corrupt index store: {0}")]
    Corrupt(String),

    #[error("embedding failed: {0:#}")]
    Embedding(anyhow::Error),

    #[error(transparent)]
    Lance(#[from] lancedb::Error),

    #[error(transparent)]
    Arrow(#[from] arrow_schema::ArrowError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, IndexError>;

impl From<IndexError> for minirag_core::Error {
    fn from(e: IndexError) -> Self {
        use minirag_core::Error as E;
        match e {
            IndexError::NotFound(path) => E::NotFound(format!("no index found at {}", path.display())),
            IndexError::ModelMismatch { index_model, index_dim, embedder_model, embedder_dim } => E::ModelMismatch {
                expected: format!("{index_model} ({index_dim}d)"),
                found: format!("{embedder_model} ({embedder_dim}d)"),
            },
            IndexError::Dimension { .. } => E::Validation(e.to_string()),
            IndexError::Busy(_) => E::Busy(e.to_string()),
            IndexError::Io(io) => E::Io(io),
            other => E::Operation(other.to_string()),
        }
    }
}
