//! In-memory chunk store: one immutable corpus snapshot.
//!
//! Snapshots are replaced wholesale on re-ingestion; nothing mutates a chunk
//! after it is stored. The JSON form lets a fresh process resolve chunk
//! metadata without re-running ingestion.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::Chunk;

#[derive(Debug, Default, Clone)]
pub struct ChunkStore {
    chunks: Vec<Chunk>,
    by_id: HashMap<String, usize>,
}

impl ChunkStore {
    /// Build a snapshot, rejecting duplicate chunk ids.
    pub fn from_chunks(chunks: Vec<Chunk>) -> Result<Self> {
        let mut by_id = HashMap::with_capacity(chunks.len());
        for (i, c) in chunks.iter().enumerate() {
            if by_id.insert(c.id.clone(), i).is_some() {
                return Err(Error::InvalidCorpus(format!("duplicate chunk id '{}'", c.id)));
            }
        }
        Ok(Self { chunks, by_id })
    }

    pub fn get(&self, id: &str) -> Option<&Chunk> {
        self.by_id.get(id).map(|&i| &self.chunks[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(Error::operation)?;
        }
        let json = serde_json::to_vec(&self.chunks).map_err(Error::operation)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(Error::operation)?;
        fs::rename(&tmp, path).map_err(Error::operation)?;
        Ok(())
    }

    /// Load a saved snapshot. A missing file yields an empty store.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let bytes = fs::read(path).map_err(Error::operation)?;
        let chunks: Vec<Chunk> = serde_json::from_slice(&bytes).map_err(Error::operation)?;
        Self::from_chunks(chunks)
    }
}
