use std::path::PathBuf;

use anyhow::bail;
use clap::Parser;

use minirag_core::config::Settings;

#[derive(Parser, Debug)]
#[command(name = "minirag-ingest", about = "Ingest documents into the vector store")]
pub struct IngestArgs {
    /// Path to a document or a directory of documents.
    pub path: PathBuf,
    /// Where to save the vector store (defaults to `index.path`).
    #[arg(long)]
    pub store_path: Option<String>,
    /// Chunk size in characters.
    #[arg(long)]
    pub chunk_size: Option<usize>,
    /// Chunk overlap in characters.
    #[arg(long)]
    pub chunk_overlap: Option<usize>,
    /// Hugging Face embedding model id.
    #[arg(long)]
    pub embedding_model: Option<String>,
    /// File extensions to pick up in a directory, comma separated.
    #[arg(long, value_delimiter = ',')]
    pub extensions: Option<Vec<String>>,
    /// Add to the existing store instead of replacing it.
    #[arg(long)]
    pub append: bool,
}

impl IngestArgs {
    /// Layer the command-line flags over the loaded configuration.
    pub fn apply(&self, settings: &mut Settings) -> anyhow::Result<()> {
        if let Some(path) = &self.store_path {
            settings.index.path.clone_from(path);
        }
        if let Some(size) = self.chunk_size {
            settings.retrieval.chunk_size = size;
        }
        if let Some(overlap) = self.chunk_overlap {
            settings.retrieval.chunk_overlap = overlap;
        }
        if let Some(model) = &self.embedding_model {
            if settings.embedding.use_fake {
                bail!(
                    "--embedding-model {model} has no effect while embedding.use_fake is set; \
                     unset APP_EMBEDDING__USE_FAKE or drop the flag"
                );
            }
            settings.embedding.model.clone_from(model);
        }
        settings.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> IngestArgs {
        IngestArgs::try_parse_from(std::iter::once("minirag-ingest").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn flags_override_settings() {
        let args = parse(&["docs", "--store-path", "/tmp/store", "--chunk-size", "400", "--chunk-overlap", "40"]);
        let mut settings = Settings::default();
        args.apply(&mut settings).unwrap();
        assert_eq!(settings.index.path, "/tmp/store");
        assert_eq!((settings.retrieval.chunk_size, settings.retrieval.chunk_overlap), (400, 40));
    }

    #[test]
    fn embedding_model_is_rejected_with_fake_embedder() {
        let args = parse(&["docs", "--embedding-model", "BAAI/bge-small-en-v1.5"]);
        let mut settings = Settings::default();
        settings.embedding.use_fake = true;
        let err = args.apply(&mut settings).unwrap_err();
        assert!(err.to_string().contains("use_fake"), "{err}");

        settings.embedding.use_fake = false;
        args.apply(&mut settings).unwrap();
        assert_eq!(settings.embedding.model, "BAAI/bge-small-en-v1.5");
    }

    #[test]
    fn invalid_overlap_is_rejected() {
        let args = parse(&["docs", "--chunk-size", "100", "--chunk-overlap", "100"]);
        assert!(args.apply(&mut Settings::default()).is_err());
    }

    #[test]
    fn extensions_split_on_commas() {
        let args = parse(&["docs", "--extensions", "txt,md", "--append"]);
        assert_eq!(args.extensions, Some(vec!["txt".to_string(), "md".to_string()]));
        assert!(args.append);
    }
}
