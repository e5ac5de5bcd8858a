//! Flat vector index with LanceDB persistence.
//!
//! Search is an exact scan over every entry; the store on disk only holds
//! rows and metadata and is read back whole on load.

pub mod error;
pub mod index;
pub mod lock;
pub mod schema;
pub mod store;

pub use error::{IndexError, Result};
pub use index::{IndexEntry, IndexManifest, VectorIndex, DEFAULT_BATCH_SIZE};
pub use lock::WriteLock;
pub use store::{exists, read_manifest, FORMAT_VERSION};
