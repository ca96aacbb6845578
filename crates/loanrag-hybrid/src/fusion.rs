use std::cmp::Ordering;
use std::collections::HashMap;

use loanrag_core::types::{ChunkId, ContributingRanks, FusedResult, SearchHit, SourceKind};

pub const DEFAULT_RRF_K: u32 = 60;

/// Score a backend contributes for a chunk it ranked at `rank` (1-based).
pub fn rrf_contribution(k: u32, rank: usize) -> f64 {
    1.0 / (f64::from(k) + rank as f64)
}

/// Final ordering: fused score descending, then chunks seen by both backends,
/// then the lower best rank, then chunk id.
pub fn fused_order(a: &FusedResult, b: &FusedResult) -> Ordering {
    b.fused_score
        .total_cmp(&a.fused_score)
        .then_with(|| b.contributing_ranks.in_both().cmp(&a.contributing_ranks.in_both()))
        .then_with(|| a.contributing_ranks.min_rank().cmp(&b.contributing_ranks.min_rank()))
        .then_with(|| a.chunk_id.cmp(&b.chunk_id))
}

fn collect_ranks(merged: &mut HashMap<ChunkId, ContributingRanks>, hits: &[SearchHit], side: SourceKind) {
    for hit in hits {
        let ranks = merged.entry(hit.chunk_id.clone()).or_default();
        let slot = match side {
            SourceKind::Lexical => &mut ranks.lexical,
            SourceKind::Semantic => &mut ranks.semantic,
        };
        // A backend contributes once per chunk, at its best rank.
        *slot = Some(slot.map_or(hit.rank, |r| r.min(hit.rank)));
    }
}

/// Reciprocal rank fusion of the two ranked lists, truncated to `top_k`.
/// Either list may be empty; both empty yields an empty result.
pub fn reciprocal_rank_fusion(lexical: &[SearchHit], semantic: &[SearchHit], k: u32, top_k: usize) -> Vec<FusedResult> {
    let mut merged: HashMap<ChunkId, ContributingRanks> = HashMap::with_capacity(lexical.len() + semantic.len());
    collect_ranks(&mut merged, lexical, SourceKind::Lexical);
    collect_ranks(&mut merged, semantic, SourceKind::Semantic);
    let mut out: Vec<FusedResult> = merged
        .into_iter()
        .map(|(chunk_id, ranks)| FusedResult {
            chunk_id,
            fused_score: ranks.lexical.map_or(0.0, |r| rrf_contribution(k, r))
                + ranks.semantic.map_or(0.0, |r| rrf_contribution(k, r)),
            contributing_ranks: ranks,
        })
        .collect();
    out.sort_by(fused_order);
    out.truncate(top_k);
    out
}

/// Semantic-only results: the raw similarity is the fused score.
pub fn similarity_passthrough(semantic: &[SearchHit], top_k: usize) -> Vec<FusedResult> {
    let mut seen: HashMap<&str, ()> = HashMap::with_capacity(semantic.len());
    let mut out: Vec<FusedResult> = semantic
        .iter()
        .filter(|h| seen.insert(h.chunk_id.as_str(), ()).is_none())
        .map(|h| FusedResult {
            chunk_id: h.chunk_id.clone(),
            fused_score: f64::from(h.score),
            contributing_ranks: ContributingRanks { lexical: None, semantic: Some(h.rank) },
        })
        .collect();
    out.sort_by(fused_order);
    out.truncate(top_k);
    out
}
