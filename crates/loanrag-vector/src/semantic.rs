use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

use loanrag_core::error::{Error, Result};
use loanrag_core::traits::{Embedder, SemanticBackend};
use loanrag_core::types::{Chunk, ChunkId, SearchHit, SourceKind};

use crate::store::{VectorRecord, VectorStore};

const DEFAULT_BATCH: usize = 64;

/// External id a chunk is stored under in the vector store.
pub fn vector_id(chunk: &Chunk, ordinal: usize) -> String {
    format!("{}#p{}#{}", chunk.source_document, chunk.page, ordinal)
}

/// Embedding-similarity retrieval over one namespace of a [`VectorStore`].
///
/// Keeps the external-id to chunk-id map of the last registered corpus;
/// matches the map does not know (left over from an older corpus) are dropped.
pub struct SemanticSearchBackend {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    namespace: String,
    embed_batch: usize,
    ids: RwLock<HashMap<String, ChunkId>>,
}

impl SemanticSearchBackend {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>, namespace: impl Into<String>) -> Self {
        Self { embedder, store, namespace: namespace.into(), embed_batch: DEFAULT_BATCH, ids: RwLock::new(HashMap::new()) }
    }

    pub fn with_embed_batch(mut self, n: usize) -> Self {
        self.embed_batch = n.max(1);
        self
    }

    pub fn namespace(&self) -> &str { &self.namespace }

    pub fn store(&self) -> &Arc<dyn VectorStore> { &self.store }

    /// Number of vector ids currently mapped back to chunks.
    pub fn mapped(&self) -> usize {
        self.ids.read().map(|g| g.len()).unwrap_or(0)
    }

    fn id_map(chunks: &[Chunk]) -> HashMap<String, ChunkId> {
        chunks.iter().enumerate().map(|(i, c)| (vector_id(c, i), c.id.clone())).collect()
    }

    fn install(&self, map: HashMap<String, ChunkId>) -> Result<()> {
        let mut guard = self.ids.write().map_err(|_| Error::Operation("semantic id map lock poisoned".into()))?;
        *guard = map;
        Ok(())
    }

    async fn embed(&self, texts: Vec<String>) -> anyhow::Result<Vec<Vec<f32>>> {
        let embedder = Arc::clone(&self.embedder);
        tokio::task::spawn_blocking(move || embedder.embed_batch(&texts)).await?
    }
}

fn progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

#[async_trait]
impl SemanticBackend for SemanticSearchBackend {
    async fn build(&self, chunks: &[Chunk]) -> Result<()> {
        let pb = progress_bar(chunks.len());
        pb.set_message("embedding");
        let mut records = Vec::with_capacity(chunks.len());
        for (batch_no, batch) in chunks.chunks(self.embed_batch).enumerate() {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = self.embed(texts).await.map_err(Error::operation)?;
            if vectors.len() != batch.len() {
                return Err(Error::Operation(format!("embedder returned {} vectors for {} texts", vectors.len(), batch.len())));
            }
            let base = batch_no * self.embed_batch;
            for (offset, (chunk, values)) in batch.iter().zip(vectors).enumerate() {
                records.push(VectorRecord {
                    id: vector_id(chunk, base + offset),
                    chunk_id: chunk.id.clone(),
                    bank: chunk.bank.clone(),
                    page: chunk.page,
                    values,
                });
            }
            pb.inc(batch.len() as u64);
        }
        pb.set_message("upserting");
        self.store.replace_namespace(&self.namespace, records).await.map_err(Error::unreachable)?;
        pb.finish_with_message("done");
        self.install(Self::id_map(chunks))?;
        info!(namespace = %self.namespace, chunks = chunks.len(), store = %self.store.describe(), "semantic index built");
        Ok(())
    }

    fn restore(&self, chunks: &[Chunk]) -> Result<()> {
        self.install(Self::id_map(chunks))?;
        debug!(namespace = %self.namespace, chunks = chunks.len(), "semantic id map restored");
        Ok(())
    }

    async fn query(&self, text: &str, k: usize) -> Result<Vec<SearchHit>> {
        if k == 0 { return Ok(vec![]); }
        let vector = self
            .embed(vec![text.to_string()])
            .await
            .map_err(Error::unreachable)?
            .pop()
            .ok_or_else(|| Error::BackendUnreachable("embedder returned no vector".into()))?;
        let matches = self.store.vector_search(&vector, k, &self.namespace).await.map_err(Error::unreachable)?;
        let ids = self.ids.read().map_err(|_| Error::Operation("semantic id map lock poisoned".into()))?;
        let total = matches.len();
        let ordered: Vec<(ChunkId, f32)> = matches
            .into_iter()
            .filter_map(|m| ids.get(&m.id).map(|chunk_id| (chunk_id.clone(), m.score)))
            .collect();
        if ordered.len() < total {
            debug!(dropped = total - ordered.len(), "ignored vector matches with unknown ids");
        }
        Ok(SearchHit::ranked(SourceKind::Semantic, ordered))
    }
}
