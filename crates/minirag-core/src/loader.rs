//! Reads files into [`Document`]s.
//!
//! A single bad file is fatal for [`load`]; [`load_directory`] logs it and
//! moves on, so one unreadable file never sinks a whole batch.
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::types::{Document, DocumentFormat, DocumentMetadata};

pub const DEFAULT_EXTENSIONS: &[&str] = &["pdf", "md", "txt"];

/// A file that was discovered but could not be loaded.
#[derive(Debug, Clone)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct LoadOutcome {
    pub documents: Vec<Document>,
    pub files_loaded: usize,
    pub skipped: Vec<SkippedFile>,
}

/// Load one file, choosing the reader by extension.
pub fn load(path: &Path) -> Result<Vec<Document>> {
    if !path.exists() {
        return Err(Error::NotFound(format!("File not found: {}", path.display())));
    }
    if !path.is_file() {
        return Err(Error::UnsupportedFormat(format!("{} is not a regular file", path.display())));
    }
    let format = DocumentFormat::from_path(path)
        .ok_or_else(|| Error::UnsupportedFormat(format!("Unsupported file type: {}", path.display())))?;
    match format {
        DocumentFormat::Text | DocumentFormat::Markdown => read_text(path, format),
        DocumentFormat::Pdf => read_pdf(path),
    }
}

/// Recursively load every file under `root` whose extension is listed.
pub fn load_directory(root: &Path, extensions: &[&str]) -> Result<Vec<Document>> {
    Ok(load_directory_report(root, extensions)?.documents)
}

pub fn load_directory_report(root: &Path, extensions: &[&str]) -> Result<LoadOutcome> {
    if !root.exists() {
        return Err(Error::NotFound(format!("Directory not found: {}", root.display())));
    }
    if !root.is_dir() {
        return Err(Error::NotFound(format!("Not a directory: {}", root.display())));
    }
    let wanted: Vec<String> = extensions.iter().map(|e| e.trim_start_matches('.').to_ascii_lowercase()).collect();

    let mut outcome = LoadOutcome::default();
    for path in list_files(root, &wanted) {
        match load(&path) {
            Ok(docs) => {
                debug!(path = %path.display(), documents = docs.len(), "loaded file");
                outcome.files_loaded += 1;
                outcome.documents.extend(docs);
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping file");
                outcome.skipped.push(SkippedFile { path, reason: e.to_string() });
            }
        }
    }
    info!(
        root = %root.display(),
        files = outcome.files_loaded,
        skipped = outcome.skipped.len(),
        documents = outcome.documents.len(),
        "directory loaded"
    );
    Ok(outcome)
}

/// File or directory, whichever `path` is.
pub fn load_path(path: &Path, extensions: &[&str]) -> Result<LoadOutcome> {
    if path.is_dir() {
        return load_directory_report(path, extensions);
    }
    let documents = load(path)?;
    Ok(LoadOutcome { documents, files_loaded: 1, skipped: Vec::new() })
}

fn list_files(root: &Path, wanted: &[String]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "unreadable directory entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let ext = entry.path().extension().and_then(|s| s.to_str()).map(str::to_ascii_lowercase);
        if ext.is_some_and(|ext| wanted.iter().any(|w| *w == ext)) {
            files.push(entry.into_path());
        }
    }
    files
}

fn read_text(path: &Path, format: DocumentFormat) -> Result<Vec<Document>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(_) => String::from_utf8_lossy(&fs::read(path)?).into_owned(),
    };
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    let metadata = DocumentMetadata { source: path.to_string_lossy().into_owned(), page: None, format };
    Ok(vec![Document::new(content, metadata)])
}

#[cfg(feature = "pdf")]
fn read_pdf(path: &Path) -> Result<Vec<Document>> {
    let source = path.to_string_lossy().into_owned();
    let mut pdf = pdf_oxide::PdfDocument::open(path)
        .map_err(|e| Error::Operation(format!("failed to open PDF {source}: {e}")))?;
    let pages = pdf.page_count().map_err(|e| Error::Operation(format!("failed to read PDF {source}: {e}")))?;
    let mut documents = Vec::new();
    for index in 0..pages {
        let text = pdf
            .extract_text(index)
            .map_err(|e| Error::Operation(format!("failed to extract page {} of {source}: {e}", index + 1)))?;
        if text.trim().is_empty() {
            continue;
        }
        let page = u32::try_from(index + 1).unwrap_or(u32::MAX);
        let metadata = DocumentMetadata { source: source.clone(), page: Some(page), format: DocumentFormat::Pdf };
        documents.push(Document::new(text, metadata));
    }
    Ok(documents)
}

#[cfg(not(feature = "pdf"))]
fn read_pdf(path: &Path) -> Result<Vec<Document>> {
    Err(Error::UnsupportedFormat(format!(
        "{}: PDF support is not compiled in (enable the `pdf` feature)",
        path.display()
    )))
}
