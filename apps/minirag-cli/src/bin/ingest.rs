use clap::Parser;

use minirag_cli::cli::IngestArgs;
use minirag_cli::init_tracing;
use minirag_core::config::{expand_path, Config};
use minirag_embed::load_embedder;
use minirag_rag::{ingest, IngestOptions};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = IngestArgs::parse();
    let mut settings = Config::load()?.into_settings();
    args.apply(&mut settings)?;
    init_tracing(settings.app.debug);

    let source = expand_path(args.path.to_string_lossy());
    println!("Ingesting from {}", source.display());
    let embedding = settings.embedding.clone();
    let embedder = tokio::task::spawn_blocking(move || load_embedder(&embedding)).await??;

    let mut options = IngestOptions::from_settings(source, &settings);
    options.append = args.append;
    if let Some(exts) = args.extensions {
        options.extensions = exts;
    }
    let report = ingest(&options, embedder).await?;

    if report.documents == 0 {
        println!("No documents loaded. Nothing written.");
        return Ok(());
    }
    println!(
        "Loaded {} documents from {} files ({} skipped)",
        report.documents, report.files_loaded, report.files_skipped
    );
    println!("Created {} chunks, embedded {} new", report.chunks, report.added);
    println!("✅ Saved {} entries to {}", report.total_entries, options.index_path.display());
    Ok(())
}
