//! Hybrid retrieval: reciprocal rank fusion of lexical and semantic rankings
//! plus per-bank citation aggregation.

pub mod citations;
pub mod fusion;
pub mod retriever;

pub use citations::{aggregate, ScoreScale};
pub use fusion::{fused_order, reciprocal_rank_fusion, rrf_contribution, similarity_passthrough, DEFAULT_RRF_K};
pub use retriever::{HybridRetriever, RetrievalOptions};
