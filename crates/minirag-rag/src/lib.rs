//! Retrieval-augmented pipeline: ingestion, retrieval, answering and the
//! service context that ties the components together.

pub mod context;
pub mod ingest;
pub mod pipeline;

pub use context::AppContext;
pub use ingest::{ingest, IngestOptions, IngestReport};
pub use pipeline::{answer, retrieve, AnswerPolicy, Timeouts};
