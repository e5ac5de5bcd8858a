use std::fs;
use std::io::Write;
use tempfile::TempDir;

use minirag_core::chunker::{chunk, split_text};
use minirag_core::loader::{load, load_directory, load_directory_report, load_path, DEFAULT_EXTENSIONS};
use minirag_core::types::{Document, DocumentFormat, DocumentMetadata};
use minirag_core::Error;

fn text_doc(source: &str, content: &str) -> Document {
    Document::new(content, DocumentMetadata { source: source.into(), page: None, format: DocumentFormat::Text })
}

#[test]
fn load_text_file_keeps_content_verbatim() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("notes.txt");
    let mut f = fs::File::create(&path).unwrap();
    writeln!(f, "The sky is blue.").unwrap();

    let docs = load(&path).expect("load");
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].content, "The sky is blue.\n");
    assert_eq!(docs[0].metadata.source, path.to_string_lossy());
    assert_eq!(docs[0].metadata.format, DocumentFormat::Text);
    assert_eq!(docs[0].metadata.page, None);
}

#[test]
fn load_markdown_as_raw_text() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("README.MD");
    fs::write(&path, "# Title\n\nBody").unwrap();

    let docs = load(&path).expect("load");
    assert_eq!(docs[0].content, "# Title\n\nBody");
    assert_eq!(docs[0].metadata.format, DocumentFormat::Markdown);
}

#[test]
fn load_rejects_unknown_extension_and_missing_file() {
    let tmp = TempDir::new().unwrap();
    let docx = tmp.path().join("report.docx");
    fs::write(&docx, "binary").unwrap();

    assert!(matches!(load(&docx), Err(Error::UnsupportedFormat(_))));
    assert!(matches!(load(&tmp.path().join("nope.txt")), Err(Error::NotFound(_))));
}

#[test]
fn load_invalid_utf8_is_lossy_not_fatal() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("latin1.txt");
    fs::write(&path, [b'c', b'a', b'f', 0xe9]).unwrap();

    let docs = load(&path).expect("lossy load");
    assert!(docs[0].content.starts_with("caf"));
}

#[test]
fn directory_load_is_sorted_recursive_and_skips_bad_files() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    fs::create_dir(root.join("nested")).unwrap();
    fs::write(root.join("b.txt"), "bravo").unwrap();
    fs::write(root.join("a.md"), "alpha").unwrap();
    fs::write(root.join("nested").join("c.txt"), "charlie").unwrap();
    fs::write(root.join("ignored.csv"), "x,y").unwrap();
    fs::write(root.join("empty.txt"), "   \n").unwrap();
    // Not a real PDF: either unsupported (no pdf feature) or unparsable.
    fs::write(root.join("broken.pdf"), "not a pdf").unwrap();

    let outcome = load_directory_report(root, DEFAULT_EXTENSIONS).expect("load dir");
    let contents: Vec<&str> = outcome.documents.iter().map(|d| d.content.as_str()).collect();
    assert_eq!(contents, vec!["alpha", "bravo", "charlie"]);
    assert_eq!(outcome.skipped.len(), 1);
    assert!(outcome.skipped[0].path.ends_with("broken.pdf"));
}

#[test]
fn directory_load_honours_extension_filter() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("a.md"), "alpha").unwrap();
    fs::write(tmp.path().join("b.txt"), "bravo").unwrap();

    let docs = load_directory(tmp.path(), &[".TXT"]).expect("load dir");
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].content, "bravo");
}

#[test]
fn directory_errors_are_typed() {
    let tmp = TempDir::new().unwrap();
    let file = tmp.path().join("a.txt");
    fs::write(&file, "alpha").unwrap();

    assert!(matches!(load_directory(&tmp.path().join("missing"), DEFAULT_EXTENSIONS), Err(Error::NotFound(_))));
    assert!(matches!(load_directory(&file, DEFAULT_EXTENSIONS), Err(Error::NotFound(_))));
    assert_eq!(load_path(&file, DEFAULT_EXTENSIONS).expect("file path").files_loaded, 1);
}

#[test]
fn chunks_carry_position_metadata() {
    let doc = text_doc("sky.txt", "The sky is blue. Grass is green.");
    let chunks = chunk(&[doc.clone()], 20, 5).expect("chunk");

    assert_eq!(chunks.len(), 2);
    assert!(chunks.iter().all(|c| c.content.chars().count() <= 20));
    let first_tail: String = chunks[0].content.chars().rev().take(5).collect::<Vec<_>>().into_iter().rev().collect();
    assert!(chunks[1].content.starts_with(&first_tail));

    for (i, c) in chunks.iter().enumerate() {
        assert_eq!(c.metadata.chunk_index, i);
        assert_eq!(c.metadata.total_chunks, 2);
        assert_eq!(c.metadata.source, "sky.txt");
        assert_eq!(c.id, format!("{}:{i}", doc.doc_hash()));
        let from_offset: String = doc.content.chars().skip(c.metadata.start_index).take(c.content.chars().count()).collect();
        assert_eq!(from_offset, c.content);
    }
}

#[test]
fn blank_documents_produce_no_chunks() {
    let chunks = chunk(&[text_doc("a.txt", "\n\n  "), text_doc("b.txt", "word")], 10, 2).expect("chunk");
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].metadata.source, "b.txt");
}

#[test]
fn invalid_parameters_are_validation_errors() {
    assert!(matches!(chunk(&[], 10, 10), Err(Error::Validation(_))));
    assert!(matches!(split_text("x", 0, 0), Err(Error::Validation(_))));
}

mod round_trip {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn dropping_overlap_restores_input(
            text in "[a-zé \n]{0,300}",
            max in 1usize..60,
            overlap_frac in 0.0f64..1.0,
        ) {
            let overlap = ((max as f64) * overlap_frac) as usize;
            prop_assume!(overlap < max);
            let chunks = split_text(&text, max, overlap).unwrap();

            if text.trim().is_empty() {
                prop_assert!(chunks.is_empty());
                return Ok(());
            }
            for c in &chunks {
                prop_assert!(c.chars().count() <= max);
            }
            let mut rebuilt = chunks[0].clone();
            for pair in chunks.windows(2) {
                let tail: Vec<char> = pair[0].chars().rev().take(overlap).collect();
                let head: Vec<char> = pair[1].chars().take(overlap).collect();
                prop_assert_eq!(tail.into_iter().rev().collect::<Vec<_>>(), head);
                rebuilt.extend(pair[1].chars().skip(overlap));
            }
            prop_assert_eq!(rebuilt, text);
        }
    }
}
