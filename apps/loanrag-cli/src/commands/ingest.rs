use anyhow::{bail, Result};
use tracing::info;

use loanrag_core::ingest::{ChunkingConfig, DocumentProcessor};

use crate::app::App;
use crate::cli::IngestArgs;

pub async fn run(args: IngestArgs) -> Result<()> {
    let app = App::open().await?;
    let processor = DocumentProcessor::with_config(ChunkingConfig::from(&app.settings.ingest));

    let is_jsonl = args.path.is_file() && args.path.extension().and_then(|e| e.to_str()) == Some("jsonl");
    let chunks = if is_jsonl { processor.load_jsonl(&args.path)? } else { processor.process_directory(&args.path)? };
    if chunks.is_empty() {
        bail!("no chunks produced from {}", args.path.display());
    }

    let store = app.retriever.register_chunks(chunks).await?;
    store.save(&app.snapshot_path)?;

    info!(
        chunks = store.len(),
        lexical_version = %app.lexical.version().unwrap_or_default(),
        namespace = %app.semantic.namespace(),
        snapshot = %app.snapshot_path.display(),
        "ingestion complete"
    );
    println!("Indexed {} chunks", store.len());
    Ok(())
}
