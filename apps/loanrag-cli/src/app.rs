//! Wiring from configuration to a ready retriever.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use loanrag_core::config::{Config, Settings};
use loanrag_core::ChunkStore;
use loanrag_embed::default_embedder;
use loanrag_hybrid::{HybridRetriever, RetrievalOptions};
use loanrag_text::TantivyLexicalBackend;
use loanrag_vector::{open_vector_store, SemanticSearchBackend};

pub struct App {
    pub settings: Settings,
    pub retriever: Arc<HybridRetriever>,
    pub lexical: Arc<TantivyLexicalBackend>,
    pub semantic: Arc<SemanticSearchBackend>,
    pub snapshot_path: PathBuf,
}

impl App {
    /// Build backends from configuration and re-attach the last saved corpus.
    pub async fn open() -> Result<Self> {
        let config = Config::load().context("loading configuration")?;
        let settings = config.settings()?;
        debug!(base = %config.base_dir().display(), "configuration loaded");

        let lexical = Arc::new(TantivyLexicalBackend::open(&settings.lexical.index_dir));
        let embedder = default_embedder(&settings.embedding).context("loading embedder")?;
        let store = open_vector_store(&settings.vector).await.context("opening vector store")?;
        let semantic = Arc::new(
            SemanticSearchBackend::new(embedder, store, settings.vector.namespace.clone())
                .with_embed_batch(settings.vector.upsert_batch),
        );
        let retriever = Arc::new(HybridRetriever::new(
            lexical.clone(),
            semantic.clone(),
            RetrievalOptions::from_settings(&settings.retrieval),
        ));

        let snapshot_path = PathBuf::from(&settings.corpus.snapshot_path);
        let snapshot = ChunkStore::load(&snapshot_path)
            .with_context(|| format!("loading corpus snapshot {}", snapshot_path.display()))?;
        if snapshot.is_empty() {
            debug!(path = %snapshot_path.display(), "no corpus snapshot");
        } else {
            info!(chunks = snapshot.len(), "corpus snapshot loaded");
            retriever.attach(snapshot)?;
        }

        Ok(Self { settings, retriever, lexical, semantic, snapshot_path })
    }

    /// `top_k` from the command line, else the configured default.
    pub fn top_k(&self, requested: Option<usize>) -> usize {
        requested.unwrap_or(self.settings.retrieval.default_top_k)
    }
}
