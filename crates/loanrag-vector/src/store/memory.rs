use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use super::{cosine, VectorMatch, VectorRecord, VectorStore};

/// Brute-force cosine search over namespaces held in memory. Nothing persists.
#[derive(Default)]
pub struct InMemoryVectorStore {
    namespaces: RwLock<HashMap<String, Vec<VectorRecord>>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self { Self::default() }

    pub fn len(&self, namespace: &str) -> usize {
        self.namespaces.read().map(|g| g.get(namespace).map_or(0, Vec::len)).unwrap_or(0)
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn describe(&self) -> String { "memory".to_string() }

    async fn replace_namespace(&self, namespace: &str, records: Vec<VectorRecord>) -> anyhow::Result<()> {
        let mut guard = self.namespaces.write().map_err(|_| anyhow::anyhow!("vector store lock poisoned"))?;
        guard.insert(namespace.to_string(), records);
        Ok(())
    }

    async fn vector_search(&self, vector: &[f32], k: usize, namespace: &str) -> anyhow::Result<Vec<VectorMatch>> {
        let guard = self.namespaces.read().map_err(|_| anyhow::anyhow!("vector store lock poisoned"))?;
        let Some(records) = guard.get(namespace) else { return Ok(vec![]) };
        let mut matches: Vec<VectorMatch> = records
            .iter()
            .map(|r| VectorMatch { id: r.id.clone(), score: cosine(vector, &r.values) })
            .collect();
        // Stable sort keeps insertion order among equal scores.
        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(k);
        Ok(matches)
    }
}
