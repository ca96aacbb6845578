//! Semantic retrieval: embed the query, search a vector store namespace, and
//! map vector ids back to chunk ids.

pub mod schema;
pub mod semantic;
pub mod store;

use anyhow::{anyhow, Result};
use std::sync::Arc;
use tracing::info;

use loanrag_core::config::{expand_path, VectorBackendKind, VectorSettings};

pub use semantic::{vector_id, SemanticSearchBackend};
pub use store::{InMemoryVectorStore, LanceVectorStore, PineconeVectorStore, VectorMatch, VectorRecord, VectorStore};

/// Vector store selected by `vector.backend`.
pub async fn open_vector_store(settings: &VectorSettings) -> Result<Arc<dyn VectorStore>> {
    let store: Arc<dyn VectorStore> = match settings.backend {
        VectorBackendKind::Local => {
            Arc::new(LanceVectorStore::connect(&expand_path(&settings.lancedb_dir), settings.upsert_batch).await?)
        }
        VectorBackendKind::Pinecone => {
            let host = settings.pinecone_host.clone().ok_or_else(|| anyhow!("vector.pinecone_host is not set"))?;
            let api_key = settings.pinecone_api_key.clone().or_else(|| std::env::var("PINECONE_API_KEY").ok());
            Arc::new(PineconeVectorStore::new(host, api_key, settings.upsert_batch)?)
        }
        VectorBackendKind::Memory => Arc::new(InMemoryVectorStore::new()),
    };
    info!(store = %store.describe(), namespace = %settings.namespace, "vector store ready");
    Ok(store)
}
