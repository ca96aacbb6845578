//! Vector store abstraction and its implementations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

mod lance;
mod memory;
mod pinecone;

pub use lance::LanceVectorStore;
pub use memory::InMemoryVectorStore;
pub use pinecone::PineconeVectorStore;

/// One embedded chunk as stored in a namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub chunk_id: String,
    pub bank: String,
    pub page: u32,
    pub values: Vec<f32>,
}

/// A nearest-neighbour match; `score` is a similarity, higher is closer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorMatch {
    pub id: String,
    pub score: f32,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Human-readable location, for logs and `status`.
    fn describe(&self) -> String;

    /// Drop everything in `namespace` and store `records` in its place.
    async fn replace_namespace(&self, namespace: &str, records: Vec<VectorRecord>) -> anyhow::Result<()>;

    /// At most `k` matches by descending similarity. An empty or unknown
    /// namespace yields no matches.
    async fn vector_search(&self, vector: &[f32], k: usize, namespace: &str) -> anyhow::Result<Vec<VectorMatch>>;
}

pub(crate) fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let (mut dot, mut na, mut nb) = (0f32, 0f32, 0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 { return 0.0; }
    dot / (na.sqrt() * nb.sqrt())
}
