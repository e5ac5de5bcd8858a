//! Domain types shared by the loader, chunker, index and pipeline.

use serde::{Deserialize, Serialize};
use std::path::Path;

pub type ChunkId = String;

/// Source format of a loaded document.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Text,
    Markdown,
    Pdf,
}

impl DocumentFormat {
    /// Map a file extension (with or without leading dot, any case) to a format.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "txt" | "text" => Some(Self::Text),
            "md" | "markdown" => Some(Self::Markdown),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension().and_then(|e| e.to_str()).and_then(Self::from_extension)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Markdown => "markdown",
            Self::Pdf => "pdf",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(Self::Text),
            "markdown" => Some(Self::Markdown),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Path of the file the document was read from.
    pub source: String,
    /// 1-based page number for paginated formats.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    pub format: DocumentFormat,
}

/// Raw text read from one file (or one page of a paginated file).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    pub metadata: DocumentMetadata,
}

impl Document {
    pub fn new(content: impl Into<String>, metadata: DocumentMetadata) -> Self {
        Self { content: content.into(), metadata }
    }

    /// Short stable identity of the document: blake3 over source and page.
    pub fn doc_hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.metadata.source.as_bytes());
        if let Some(page) = self.metadata.page {
            hasher.update(&page.to_le_bytes());
        }
        hasher.finalize().to_hex()[..16].to_string()
    }
}

/// Document metadata plus the chunk's position inside its parent.
///
/// `start_index` is a character offset (not bytes) into the parent content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    pub format: DocumentFormat,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub start_index: usize,
}

/// A bounded slice of a document that is embedded and indexed on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub content: String,
    pub metadata: ChunkMetadata,
}

impl Chunk {
    /// Hash used to refuse duplicate entries when appending to an index.
    pub fn content_hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.metadata.source.as_bytes());
        hasher.update(&[0]);
        if let Some(page) = self.metadata.page {
            hasher.update(&page.to_le_bytes());
        }
        hasher.update(&[0]);
        hasher.update(self.content.as_bytes());
        hasher.finalize().to_hex().to_string()
    }
}

/// One retrieval result. Lower `distance` is more similar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub chunk: Chunk,
    pub distance: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerMode {
    Generated,
    RetrievalOnly,
}

/// Result of the question-answering pipeline.
///
/// `answer` is `None` in retrieval-only mode; the contexts are never
/// substituted for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub question: String,
    pub answer: Option<String>,
    pub contexts: Vec<SearchHit>,
    pub mode: AnswerMode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_from_extension_ignores_case_and_dot() {
        assert_eq!(DocumentFormat::from_extension(".TXT"), Some(DocumentFormat::Text));
        assert_eq!(DocumentFormat::from_extension("md"), Some(DocumentFormat::Markdown));
        assert_eq!(DocumentFormat::from_extension("docx"), None);
        assert_eq!(DocumentFormat::parse(DocumentFormat::Pdf.as_str()), Some(DocumentFormat::Pdf));
    }

    #[test]
    fn doc_hash_distinguishes_pages() {
        let meta = |page| DocumentMetadata { source: "a.pdf".into(), page, format: DocumentFormat::Pdf };
        let a = Document::new("x", meta(Some(1)));
        let b = Document::new("x", meta(Some(2)));
        assert_ne!(a.doc_hash(), b.doc_hash());
        assert_eq!(a.doc_hash().len(), 16);
    }

    #[test]
    fn answer_mode_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&AnswerMode::RetrievalOnly).unwrap(), "\"retrieval_only\"");
        let meta: DocumentMetadata =
            serde_json::from_str(r#"{"source":"a.txt","format":"text"}"#).unwrap();
        assert_eq!(meta.page, None);
    }
}
