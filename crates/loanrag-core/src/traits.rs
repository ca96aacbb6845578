use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Chunk, SearchHit};

pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("embedder returned no vector"))
    }
}

/// Term-frequency search over the chunk corpus.
///
/// `query` returns at most `k` hits by descending score with ties in chunk
/// insertion order, or `Error::IndexUnavailable` when nothing is built.
pub trait LexicalBackend: Send + Sync {
    fn build(&self, chunks: &[Chunk]) -> Result<()>;
    fn query(&self, text: &str, k: usize) -> Result<Vec<SearchHit>>;
    fn is_available(&self) -> bool;
}

/// Embedding-similarity search against a vector store namespace.
///
/// Service failures surface as `Error::BackendUnreachable`.
#[async_trait]
pub trait SemanticBackend: Send + Sync {
    /// Embed and upsert the whole corpus, replacing the namespace contents.
    async fn build(&self, chunks: &[Chunk]) -> Result<()>;
    /// Re-attach to a namespace populated by an earlier `build` of `chunks`.
    fn restore(&self, chunks: &[Chunk]) -> Result<()>;
    async fn query(&self, text: &str, k: usize) -> Result<Vec<SearchHit>>;
}
