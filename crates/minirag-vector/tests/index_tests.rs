use minirag_core::traits::Embedder;
use minirag_core::types::{Chunk, ChunkMetadata, DocumentFormat};
use minirag_embed::HashEmbedder;
use minirag_vector::{IndexError, VectorIndex, WriteLock};

/// Embeds "x,y" as the literal 2-d vector, for exact distance checks.
struct LiteralEmbedder;

impl Embedder for LiteralEmbedder {
    fn model_id(&self) -> &str {
        "literal-2d"
    }
    fn dim(&self) -> usize {
        2
    }
    fn max_len(&self) -> usize {
        16
    }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        texts
            .iter()
            .map(|t| t.split(',').map(|v| v.trim().parse::<f32>().map_err(anyhow::Error::from)).collect())
            .collect()
    }
}

fn chunk(source: &str, content: &str) -> Chunk {
    Chunk {
        id: format!("{source}:0"),
        content: content.to_string(),
        metadata: ChunkMetadata {
            source: source.to_string(),
            page: None,
            format: DocumentFormat::Text,
            chunk_index: 0,
            total_chunks: 1,
            start_index: 0,
        },
    }
}

fn literal_index(points: &[&str]) -> VectorIndex {
    let chunks = points.iter().enumerate().map(|(i, p)| chunk(&format!("p{i}"), p)).collect();
    VectorIndex::build("test", chunks, &LiteralEmbedder, 2).expect("build")
}

#[test]
fn results_are_sorted_by_ascending_distance() {
    let index = literal_index(&["3,0", "1,0", "2,0"]);
    let hits = index.search(&[0.0, 0.0], 3).unwrap();
    let contents: Vec<&str> = hits.iter().map(|h| h.chunk.content.as_str()).collect();
    assert_eq!(contents, vec!["1,0", "2,0", "3,0"]);
    assert_eq!(hits.iter().map(|h| h.distance).collect::<Vec<_>>(), vec![1.0, 4.0, 9.0]);
}

#[test]
fn k_bounds_the_result_length() {
    let index = literal_index(&["1,0", "0,1"]);
    assert_eq!(index.search(&[0.0, 0.0], 10).unwrap().len(), 2);
    assert_eq!(index.search(&[0.0, 0.0], 1).unwrap().len(), 1);
    assert!(index.search(&[0.0, 0.0], 0).unwrap().is_empty());
}

#[test]
fn ties_keep_insertion_order() {
    let index = literal_index(&["0,1", "1,0", "-1,0"]);
    let hits = index.search(&[0.0, 0.0], 3).unwrap();
    let sources: Vec<&str> = hits.iter().map(|h| h.chunk.metadata.source.as_str()).collect();
    assert_eq!(sources, vec!["p0", "p1", "p2"]);
}

#[test]
fn wrong_query_dimension_is_rejected() {
    let index = literal_index(&["1,0"]);
    assert!(matches!(index.search(&[1.0, 0.0, 0.0], 1), Err(IndexError::Dimension { expected: 2, got: 3 })));
}

#[test]
fn empty_index_returns_nothing() {
    let index = VectorIndex::new("empty", "literal-2d", 2);
    assert!(index.search(&[0.0, 0.0], 5).unwrap().is_empty());
}

#[test]
fn added_chunk_is_its_own_nearest_neighbour() {
    let embedder = HashEmbedder::new(384);
    let mut index = VectorIndex::build(
        "docs",
        vec![chunk("a.txt", "The sky is blue."), chunk("b.txt", "Grass is green.")],
        &embedder,
        8,
    )
    .unwrap();

    let added = index.add(vec![chunk("c.txt", "Rust compiles to native code")], &embedder, 8).unwrap();
    assert_eq!(added, 1);
    let query = embedder.embed("Rust compiles to native code").unwrap();
    let hits = index.search(&query, 1).unwrap();
    assert_eq!(hits[0].chunk.metadata.source, "c.txt");
    assert!(hits[0].distance < 1e-6);
}

#[test]
fn add_skips_duplicate_content() {
    let embedder = HashEmbedder::new(64);
    let mut index = VectorIndex::build("docs", vec![chunk("a.txt", "alpha")], &embedder, 8).unwrap();

    let added = index
        .add(vec![chunk("a.txt", "alpha"), chunk("a.txt", "bravo"), chunk("a.txt", "bravo")], &embedder, 8)
        .unwrap();
    assert_eq!(added, 1);
    assert_eq!(index.len(), 2);
    // Same text from a different source is a distinct entry.
    assert_eq!(index.add(vec![chunk("z.txt", "alpha")], &embedder, 8).unwrap(), 1);
}

#[test]
fn add_with_another_model_is_a_mismatch() {
    let mut index = VectorIndex::build("docs", vec![chunk("a.txt", "alpha")], &HashEmbedder::new(64), 8).unwrap();
    let other = HashEmbedder::new(64).with_model_id("other-model");
    assert!(matches!(index.add(vec![chunk("b.txt", "bravo")], &other, 8), Err(IndexError::ModelMismatch { .. })));
}

#[test]
fn second_writer_is_busy_until_first_releases() {
    let tmp = tempfile::tempdir().unwrap();
    let store = tmp.path().join("vectorstore");

    let first = WriteLock::acquire(&store).expect("first lock");
    assert!(first.path().exists());
    assert!(matches!(WriteLock::acquire(&store), Err(IndexError::Busy(_))));
    drop(first);
    assert!(WriteLock::acquire(&store).is_ok());
}

#[test]
fn leftover_lock_file_from_dead_writer_is_reclaimed() {
    let tmp = tempfile::tempdir().unwrap();
    let store = tmp.path().join("vectorstore");
    std::fs::write(tmp.path().join("vectorstore.lock"), "999999\n").unwrap();

    let lock = WriteLock::acquire(&store).expect("stale file is not a held lock");
    let pid = std::fs::read_to_string(lock.path()).unwrap();
    assert_eq!(pid.trim(), std::process::id().to_string());
}
