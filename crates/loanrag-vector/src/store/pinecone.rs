//! Pinecone data-plane REST client (`/query`, `/vectors/upsert`, `/vectors/delete`).
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

use super::{VectorMatch, VectorRecord, VectorStore};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct PineconeVectorStore {
    client: Client,
    host: String,
    api_key: Option<String>,
    batch_size: usize,
}

#[derive(Serialize)]
struct UpsertVector<'a> {
    id: &'a str,
    values: &'a [f32],
    metadata: UpsertMetadata<'a>,
}

#[derive(Serialize)]
struct UpsertMetadata<'a> {
    chunk_id: &'a str,
    bank: &'a str,
    page: u32,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Deserialize)]
struct QueryMatch {
    id: String,
    #[serde(default)]
    score: f32,
}

impl PineconeVectorStore {
    pub fn new(host: impl Into<String>, api_key: Option<String>, batch_size: usize) -> Result<Self> {
        let host = host.into();
        let host = if host.starts_with("http://") || host.starts_with("https://") { host } else { format!("https://{host}") };
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client, host: host.trim_end_matches('/').to_string(), api_key, batch_size: batch_size.max(1) })
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<reqwest::Response> {
        let mut req = self.client.post(format!("{}{}", self.host, path)).json(&body);
        if let Some(key) = &self.api_key {
            req = req.header("Api-Key", key);
        }
        req.send().await.with_context(|| format!("POST {path}"))
    }

    async fn checked(resp: reqwest::Response, what: &str) -> Result<reqwest::Response> {
        let status = resp.status();
        if status.is_success() { return Ok(resp); }
        let body = resp.text().await.unwrap_or_default();
        Err(anyhow!("pinecone {what} failed with {status}: {body}"))
    }
}

#[async_trait]
impl VectorStore for PineconeVectorStore {
    fn describe(&self) -> String { format!("pinecone:{}", self.host) }

    async fn replace_namespace(&self, namespace: &str, records: Vec<VectorRecord>) -> Result<()> {
        let resp = self.post("/vectors/delete", json!({ "deleteAll": true, "namespace": namespace })).await?;
        // A namespace that was never written reports 404 on delete.
        if resp.status() != StatusCode::NOT_FOUND {
            Self::checked(resp, "delete").await?;
        }
        for batch in records.chunks(self.batch_size) {
            let vectors: Vec<UpsertVector<'_>> = batch
                .iter()
                .map(|r| UpsertVector {
                    id: &r.id,
                    values: &r.values,
                    metadata: UpsertMetadata { chunk_id: &r.chunk_id, bank: &r.bank, page: r.page },
                })
                .collect();
            let resp = self.post("/vectors/upsert", json!({ "vectors": vectors, "namespace": namespace })).await?;
            Self::checked(resp, "upsert").await?;
            debug!(namespace, batch = batch.len(), "upserted vectors");
        }
        info!(namespace, rows = records.len(), host = %self.host, "namespace replaced");
        Ok(())
    }

    async fn vector_search(&self, vector: &[f32], k: usize, namespace: &str) -> Result<Vec<VectorMatch>> {
        if k == 0 { return Ok(vec![]); }
        let body = json!({ "vector": vector, "topK": k, "namespace": namespace, "includeMetadata": false });
        let resp = Self::checked(self.post("/query", body).await?, "query").await?;
        let parsed: QueryResponse = resp.json().await.context("decode pinecone query response")?;
        Ok(parsed.matches.into_iter().map(|m| VectorMatch { id: m.id, score: m.score }).collect())
    }
}
