use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};

use loanrag_core::config::RetrievalSettings;
use loanrag_core::error::{Error, Result};
use loanrag_core::store::ChunkStore;
use loanrag_core::traits::{LexicalBackend, SemanticBackend};
use loanrag_core::types::{Chunk, Degradation, FusedResult, Retrieval, RetrievalMode, SearchHit};

use crate::citations::{aggregate, ScoreScale};
use crate::fusion::{reciprocal_rank_fusion, similarity_passthrough};

#[derive(Debug, Clone)]
pub struct RetrievalOptions {
    pub rrf_k: u32,
    pub default_top_k: usize,
    pub max_top_k: usize,
    pub semantic_pool: usize,
    pub lexical_pool: usize,
    pub semantic_timeout: Duration,
}

impl RetrievalOptions {
    pub fn from_settings(s: &RetrievalSettings) -> Self {
        Self {
            rrf_k: s.rrf_k,
            default_top_k: s.default_top_k,
            max_top_k: s.max_top_k,
            semantic_pool: s.semantic_pool,
            lexical_pool: s.lexical_pool,
            semantic_timeout: Duration::from_millis(s.semantic_timeout_ms),
        }
    }
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self::from_settings(&RetrievalSettings::default())
    }
}

/// Runs lexical and semantic search side by side and fuses the two rankings.
///
/// The corpus snapshot is swapped wholesale by `register_chunks`; each query
/// resolves chunk metadata against the snapshot current when it started.
pub struct HybridRetriever {
    lexical: Arc<dyn LexicalBackend>,
    semantic: Arc<dyn SemanticBackend>,
    corpus: RwLock<Arc<ChunkStore>>,
    build_lock: tokio::sync::Mutex<()>,
    options: RetrievalOptions,
}

impl HybridRetriever {
    pub fn new(lexical: Arc<dyn LexicalBackend>, semantic: Arc<dyn SemanticBackend>, options: RetrievalOptions) -> Self {
        Self {
            lexical,
            semantic,
            corpus: RwLock::new(Arc::new(ChunkStore::default())),
            build_lock: tokio::sync::Mutex::new(()),
            options,
        }
    }

    pub fn options(&self) -> &RetrievalOptions { &self.options }

    /// The corpus snapshot queries currently resolve against.
    pub fn corpus(&self) -> Arc<ChunkStore> {
        match self.corpus.read() {
            Ok(g) => Arc::clone(&g),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    fn swap_corpus(&self, store: Arc<ChunkStore>) -> Result<()> {
        let mut guard = self.corpus.write().map_err(|_| Error::Operation("corpus lock poisoned".into()))?;
        *guard = store;
        Ok(())
    }

    /// Rebuild both backends for `chunks`, then make the new snapshot visible.
    /// Concurrent calls are serialised.
    pub async fn register_chunks(&self, chunks: Vec<Chunk>) -> Result<Arc<ChunkStore>> {
        let _build = self.build_lock.lock().await;
        let store = Arc::new(ChunkStore::from_chunks(chunks)?);
        let lexical = Arc::clone(&self.lexical);
        let snapshot = Arc::clone(&store);
        tokio::task::spawn_blocking(move || lexical.build(snapshot.chunks())).await.map_err(Error::operation)??;
        self.semantic.build(store.chunks()).await?;
        self.swap_corpus(Arc::clone(&store))?;
        info!(chunks = store.len(), "corpus registered");
        Ok(store)
    }

    /// Adopt a snapshot whose indexes were built by an earlier `register_chunks`.
    pub fn attach(&self, store: ChunkStore) -> Result<()> {
        self.semantic.restore(store.chunks())?;
        debug!(chunks = store.len(), "corpus attached");
        self.swap_corpus(Arc::new(store))
    }

    /// Answer `query` with up to `top_k` fused results.
    ///
    /// Only input errors are returned as `Err`. A failing backend degrades the
    /// result instead: Hybrid continues on whichever signal is left, and a
    /// single-signal mode yields an empty result. Every mode draws the same
    /// candidate pools, so Hybrid without lexical hits and Semantic agree.
    pub async fn retrieve(&self, query: &str, top_k: usize, mode: RetrievalMode) -> Result<Retrieval> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::InvalidQuery("query is empty".into()));
        }
        if top_k == 0 || top_k > self.options.max_top_k {
            return Err(Error::InvalidTopK { top_k, max: self.options.max_top_k });
        }
        let corpus = self.corpus();
        let lexical_k = top_k.max(self.options.lexical_pool);
        let semantic_k = top_k.max(self.options.semantic_pool);

        match mode {
            RetrievalMode::Lexical => match self.lexical_hits(query, lexical_k, &corpus).await {
                Ok(hits) => Ok(self.lexical_only(&hits, top_k, None, corpus)),
                Err(e) => Ok(Retrieval::empty(RetrievalMode::Lexical, Some(lexical_loss(e)?), corpus)),
            },
            RetrievalMode::Semantic => match self.semantic_hits(query, semantic_k, &corpus).await {
                Ok(hits) => Ok(semantic_only(&hits, top_k, None, corpus)),
                Err(e) => Ok(Retrieval::empty(RetrievalMode::Semantic, Some(semantic_loss(e)?), corpus)),
            },
            RetrievalMode::Hybrid => {
                let (lexical, semantic) = tokio::join!(
                    self.lexical_hits(query, lexical_k, &corpus),
                    self.semantic_hits(query, semantic_k, &corpus),
                );
                let lexical = match lexical {
                    Ok(hits) => Ok(hits),
                    Err(e) => Err(lexical_loss(e)?),
                };
                let semantic = match semantic {
                    Ok(hits) => Ok(hits),
                    Err(e) => Err(semantic_loss(e)?),
                };
                match (lexical, semantic) {
                    (Ok(lexical), Ok(semantic)) => {
                        let fused = reciprocal_rank_fusion(&lexical, &semantic, self.options.rrf_k, top_k);
                        let rrf = ScoreScale::Rrf { k: self.options.rrf_k };
                        Ok(finish(fused, rrf, RetrievalMode::Hybrid, None, corpus))
                    }
                    (Err(lost), Ok(semantic)) => Ok(semantic_only(&semantic, top_k, Some(lost), corpus)),
                    (Ok(lexical), Err(lost)) => {
                        debug!(lexical_hits = lexical.len(), "continuing with lexical results");
                        Ok(self.lexical_only(&lexical, top_k, Some(lost), corpus))
                    }
                    (Err(_), Err(lost)) => Ok(Retrieval::empty(RetrievalMode::Semantic, Some(lost), corpus)),
                }
            }
        }
    }

    fn lexical_only(&self, hits: &[SearchHit], top_k: usize, degradation: Option<Degradation>, corpus: Arc<ChunkStore>) -> Retrieval {
        let fused = reciprocal_rank_fusion(hits, &[], self.options.rrf_k, top_k);
        finish(fused, ScoreScale::Rrf { k: self.options.rrf_k }, RetrievalMode::Lexical, degradation, corpus)
    }

    async fn lexical_hits(&self, query: &str, k: usize, corpus: &ChunkStore) -> Result<Vec<SearchHit>> {
        let lexical = Arc::clone(&self.lexical);
        let text = query.to_string();
        let hits = tokio::task::spawn_blocking(move || lexical.query(&text, k)).await.map_err(Error::operation)??;
        Ok(known(hits, corpus))
    }

    async fn semantic_hits(&self, query: &str, k: usize, corpus: &ChunkStore) -> Result<Vec<SearchHit>> {
        let timeout = self.options.semantic_timeout;
        let hits = tokio::time::timeout(timeout, self.semantic.query(query, k))
            .await
            .map_err(|_| Error::Timeout(timeout))??;
        Ok(known(hits, corpus))
    }
}

/// Drop hits for chunks the current snapshot does not contain and rank the
/// survivors densely from 1.
fn known(hits: Vec<SearchHit>, corpus: &ChunkStore) -> Vec<SearchHit> {
    let total = hits.len();
    let kept: Vec<SearchHit> = hits
        .into_iter()
        .filter(|h| corpus.contains(&h.chunk_id))
        .enumerate()
        .map(|(i, h)| SearchHit { rank: i + 1, ..h })
        .collect();
    if kept.len() < total {
        debug!(dropped = total - kept.len(), "ignored hits for chunks outside the corpus");
    }
    kept
}

/// Turn a lexical failure into a degradation. A missing index is expected
/// before the first ingestion and stays quiet.
fn lexical_loss(e: Error) -> Result<Degradation> {
    match e {
        e if e.is_input_error() => Err(e),
        Error::IndexUnavailable(reason) => {
            debug!(%reason, "lexical index unavailable");
            Ok(Degradation::LexicalIndexMissing)
        }
        e => {
            warn!(error = %e, "lexical search failed");
            Ok(Degradation::LexicalUnavailable(e.to_string()))
        }
    }
}

fn semantic_loss(e: Error) -> Result<Degradation> {
    if e.is_input_error() {
        return Err(e);
    }
    warn!(error = %e, "semantic backend unavailable");
    Ok(Degradation::SemanticUnavailable(e.to_string()))
}

fn semantic_only(hits: &[SearchHit], top_k: usize, degradation: Option<Degradation>, corpus: Arc<ChunkStore>) -> Retrieval {
    let fused = similarity_passthrough(hits, top_k);
    finish(fused, ScoreScale::Similarity, RetrievalMode::Semantic, degradation, corpus)
}

fn finish(
    results: Vec<FusedResult>,
    scale: ScoreScale,
    mode: RetrievalMode,
    degradation: Option<Degradation>,
    corpus: Arc<ChunkStore>,
) -> Retrieval {
    let (citations, banks) = aggregate(&results, &corpus, scale);
    Retrieval { results, citations, banks, mode, degradation, corpus }
}
