//! Recursive character splitter.
//!
//! Text is cut on the coarsest separator that yields pieces small enough
//! (paragraph, then line, then word, then single characters) and the pieces
//! are packed greedily into chunks of at most `max_size` characters. Every
//! chunk after the first begins with the last `overlap` characters of the
//! previous one, so dropping that prefix and concatenating restores the
//! input exactly. Sizes are counted in chars, never bytes.
use std::ops::Range;

use tracing::debug;

use crate::error::{Error, Result};
use crate::types::{Chunk, ChunkMetadata, Document};

pub const DEFAULT_CHUNK_SIZE: usize = 800;
pub const DEFAULT_CHUNK_OVERLAP: usize = 150;

const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

#[derive(Debug, Clone, Copy)]
struct Piece {
    start: usize,
    end: usize,
    chars: usize,
}

/// A chunk boundary: byte range into the source plus its char offset.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Span {
    bytes: Range<usize>,
    char_start: usize,
}

/// Split every document and attach positional metadata.
pub fn chunk(documents: &[Document], max_size: usize, overlap: usize) -> Result<Vec<Chunk>> {
    validate(max_size, overlap)?;
    let mut chunks = Vec::new();
    for doc in documents {
        let spans = split_spans(&doc.content, max_size, overlap);
        let total_chunks = spans.len();
        let doc_hash = doc.doc_hash();
        for (chunk_index, span) in spans.into_iter().enumerate() {
            chunks.push(Chunk {
                id: format!("{doc_hash}:{chunk_index}"),
                content: doc.content[span.bytes].to_string(),
                metadata: ChunkMetadata {
                    source: doc.metadata.source.clone(),
                    page: doc.metadata.page,
                    format: doc.metadata.format,
                    chunk_index,
                    total_chunks,
                    start_index: span.char_start,
                },
            });
        }
    }
    debug!(documents = documents.len(), chunks = chunks.len(), max_size, overlap, "chunked documents");
    Ok(chunks)
}

/// Split raw text with the same rules as [`chunk`].
pub fn split_text(text: &str, max_size: usize, overlap: usize) -> Result<Vec<String>> {
    validate(max_size, overlap)?;
    Ok(split_spans(text, max_size, overlap).into_iter().map(|s| text[s.bytes].to_string()).collect())
}

fn validate(max_size: usize, overlap: usize) -> Result<()> {
    if max_size == 0 {
        return Err(Error::Validation("chunk size must be greater than zero".into()));
    }
    if overlap >= max_size {
        return Err(Error::Validation(format!("chunk overlap ({overlap}) must be smaller than chunk size ({max_size})")));
    }
    Ok(())
}

fn split_spans(text: &str, max_size: usize, overlap: usize) -> Vec<Span> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    if text.chars().count() <= max_size {
        return vec![Span { bytes: 0..text.len(), char_start: 0 }];
    }

    // Pieces must leave room for the overlap prefix of a follow-up chunk.
    let budget = max_size - overlap;
    let mut pieces = Vec::new();
    split_recursive(text, 0..text.len(), budget, &SEPARATORS, &mut pieces);
    merge(text, &pieces, max_size, overlap)
}

fn split_recursive(text: &str, range: Range<usize>, budget: usize, separators: &[&str], out: &mut Vec<Piece>) {
    let slice = &text[range.clone()];
    let chars = slice.chars().count();
    if chars <= budget {
        if chars > 0 {
            out.push(Piece { start: range.start, end: range.end, chars });
        }
        return;
    }
    let Some((sep, finer)) = separators.split_first() else {
        return;
    };
    if sep.is_empty() {
        for (offset, ch) in slice.char_indices() {
            let start = range.start + offset;
            out.push(Piece { start, end: start + ch.len_utf8(), chars: 1 });
        }
        return;
    }
    if !slice.contains(sep) {
        split_recursive(text, range, budget, finer, out);
        return;
    }
    // Separators stay attached to the piece they terminate.
    let mut piece_start = range.start;
    for (offset, _) in slice.match_indices(sep) {
        let piece_end = range.start + offset + sep.len();
        split_recursive(text, piece_start..piece_end, budget, finer, out);
        piece_start = piece_end;
    }
    if piece_start < range.end {
        split_recursive(text, piece_start..range.end, budget, finer, out);
    }
}

fn merge(text: &str, pieces: &[Piece], max_size: usize, overlap: usize) -> Vec<Span> {
    let mut spans = Vec::new();
    let Some(first) = pieces.first() else {
        return spans;
    };
    let mut start = first.start;
    let mut end = first.end;
    let mut char_start = 0usize;
    let mut len = first.chars;

    for piece in &pieces[1..] {
        if len + piece.chars <= max_size {
            end = piece.end;
            len += piece.chars;
            continue;
        }
        spans.push(Span { bytes: start..end, char_start });
        let prefix_start = overlap_start(text, start, end, overlap);
        char_start += len - overlap;
        start = prefix_start;
        end = piece.end;
        len = overlap + piece.chars;
    }
    spans.push(Span { bytes: start..end, char_start });
    spans
}

/// Byte offset where the last `overlap` chars of `text[start..end]` begin.
fn overlap_start(text: &str, start: usize, end: usize, overlap: usize) -> usize {
    if overlap == 0 {
        return end;
    }
    text[start..end].char_indices().rev().nth(overlap - 1).map_or(start, |(offset, _)| start + offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(text: &str, max: usize, overlap: usize) -> Vec<String> {
        split_text(text, max, overlap).expect("valid parameters")
    }

    #[test]
    fn small_input_is_returned_unchanged() {
        assert_eq!(split("  short text\n", 800, 150), vec!["  short text\n".to_string()]);
    }

    #[test]
    fn blank_input_yields_nothing() {
        assert!(split("", 10, 2).is_empty());
        assert!(split(" \n\n \t", 10, 2).is_empty());
    }

    #[test]
    fn words_are_preferred_over_characters() {
        let chunks = split("The sky is blue. Grass is green.", 20, 5);
        assert_eq!(chunks, vec!["The sky is blue. ".to_string(), "lue. Grass is green.".to_string()]);
    }

    #[test]
    fn paragraph_boundary_is_preferred_over_line() {
        let chunks = split("aaaa\n\nbbbb", 6, 1);
        assert_eq!(chunks, vec!["aaaa\n\n".to_string(), "\nbbbb".to_string()]);
    }

    #[test]
    fn character_fallback_always_terminates() {
        let chunks = split("abcdefghij", 4, 1);
        assert_eq!(chunks, vec!["abcd".to_string(), "defg".to_string(), "ghij".to_string()]);
    }

    #[test]
    fn multibyte_text_is_measured_in_chars() {
        let text = "héllo wörld ünïcödé ñandú çà";
        let chunks = split(text, 8, 2);
        assert!(chunks.iter().all(|c| c.chars().count() <= 8));
        let mut rebuilt = chunks[0].clone();
        for c in &chunks[1..] {
            rebuilt.extend(c.chars().skip(2));
        }
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn rejects_overlap_not_smaller_than_size() {
        assert!(matches!(split_text("abc", 3, 3), Err(Error::Validation(_))));
        assert!(matches!(split_text("abc", 0, 0), Err(Error::Validation(_))));
    }
}
