//! Domain types shared by the lexical, semantic and fusion layers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::Error;
use crate::store::ChunkStore;

pub type ChunkId = String;

/// A retrievable passage of a policy document.
///
/// - `id`: unique across the corpus snapshot
/// - `bank`: issuing bank inferred at ingestion (e.g. "HDFC Bank")
/// - `source_document`: path or name of the originating document
/// - `page`: 1-based page number in the source document (0 when unknown)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub text: String,
    pub bank: String,
    pub source_document: String,
    pub page: u32,
}

/// Indicates which backend produced a hit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Lexical,
    Semantic,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Lexical => write!(f, "lexical"),
            SourceKind::Semantic => write!(f, "semantic"),
        }
    }
}

/// One entry of a backend's own top-k list.
///
/// `score` is backend-local: unbounded BM25 for lexical hits, cosine
/// similarity for semantic hits. `rank` is the 1-based position in that list
/// counting only hits that resolve to a chunk of the current corpus, so ranks
/// stay dense after unknown ids are dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub chunk_id: ChunkId,
    pub score: f32,
    pub rank: usize,
    pub source: SourceKind,
}

impl SearchHit {
    /// Assign 1-based ranks to an already ordered `(id, score)` list.
    pub fn ranked<I>(source: SourceKind, ordered: I) -> Vec<SearchHit>
    where
        I: IntoIterator<Item = (ChunkId, f32)>,
    {
        ordered
            .into_iter()
            .enumerate()
            .map(|(i, (chunk_id, score))| SearchHit { chunk_id, score, rank: i + 1, source })
            .collect()
    }
}

/// Ranks a fused chunk held in each backend's list, if any.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributingRanks {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lexical: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semantic: Option<usize>,
}

impl ContributingRanks {
    pub fn in_both(&self) -> bool {
        self.lexical.is_some() && self.semantic.is_some()
    }

    /// Best (lowest) rank across backends; `usize::MAX` when absent everywhere.
    pub fn min_rank(&self) -> usize {
        match (self.lexical, self.semantic) {
            (Some(l), Some(s)) => l.min(s),
            (Some(r), None) | (None, Some(r)) => r,
            (None, None) => usize::MAX,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedResult {
    pub chunk_id: ChunkId,
    pub fused_score: f64,
    pub contributing_ranks: ContributingRanks,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub bank: String,
    pub page: u32,
    pub score: f64,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankConfidence {
    pub name: String,
    pub confidence: f64,
}

/// Which signals a retrieval call may use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalMode {
    #[default]
    Hybrid,
    Semantic,
    Lexical,
}

impl fmt::Display for RetrievalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetrievalMode::Hybrid => write!(f, "hybrid"),
            RetrievalMode::Semantic => write!(f, "semantic"),
            RetrievalMode::Lexical => write!(f, "lexical"),
        }
    }
}

impl FromStr for RetrievalMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hybrid" => Ok(RetrievalMode::Hybrid),
            "semantic" => Ok(RetrievalMode::Semantic),
            "lexical" => Ok(RetrievalMode::Lexical),
            other => Err(Error::InvalidConfig(format!(
                "unknown retrieval mode '{other}' (expected hybrid, semantic or lexical)"
            ))),
        }
    }
}

/// Why a retrieval ran on fewer signals than requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum Degradation {
    LexicalIndexMissing,
    /// The index exists but searching it failed.
    LexicalUnavailable(String),
    SemanticUnavailable(String),
}

/// Outcome of one `retrieve` call.
///
/// `mode` is the effective mode after fallbacks, which may differ from the
/// requested one. The corpus snapshot the results were resolved against is
/// carried along so evidence text stays consistent with the citations even if
/// the corpus is re-registered concurrently.
#[derive(Debug, Clone, Serialize)]
pub struct Retrieval {
    pub results: Vec<FusedResult>,
    pub citations: Vec<Citation>,
    pub banks: Vec<BankConfidence>,
    pub mode: RetrievalMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degradation: Option<Degradation>,
    #[serde(skip)]
    pub corpus: Arc<ChunkStore>,
}

impl Retrieval {
    pub fn empty(mode: RetrievalMode, degradation: Option<Degradation>, corpus: Arc<ChunkStore>) -> Self {
        Self { results: Vec::new(), citations: Vec::new(), banks: Vec::new(), mode, degradation, corpus }
    }

    /// True when neither backend surfaced anything ("no evidence found").
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Fused results paired with their chunks, in rank order.
    pub fn evidence(&self) -> impl Iterator<Item = (&FusedResult, &Chunk)> + '_ {
        self.results
            .iter()
            .filter_map(|r| self.corpus.get(&r.chunk_id).map(|c| (r, c)))
    }

    pub fn into_parts(self) -> (Vec<FusedResult>, Vec<Citation>, Vec<BankConfidence>) {
        (self.results, self.citations, self.banks)
    }
}
