use std::collections::HashSet;

use loanrag_core::store::ChunkStore;
use loanrag_core::types::{BankConfidence, Citation, FusedResult};

/// How to read a fused score when turning it into a confidence in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoreScale {
    /// Reciprocal-rank sums with constant `k`.
    Rrf { k: u32 },
    /// Raw cosine similarity.
    Similarity,
}

impl ScoreScale {
    /// Monotone map into [0, 1]. For RRF, a chunk ranked first by a single
    /// backend maps to 0.5 and one ranked first by both to about 0.67.
    pub fn confidence(&self, score: f64) -> f64 {
        let c = match *self {
            ScoreScale::Rrf { k } => {
                let half = 1.0 / (f64::from(k) + 1.0);
                if score <= 0.0 { 0.0 } else { (score / (score + half)).min(1.0) }
            }
            ScoreScale::Similarity => score,
        };
        if c.is_nan() { 0.0 } else { c.clamp(0.0, 1.0) }
    }
}

/// One citation and one confidence per bank, taken from the bank's
/// highest-scoring chunk, both ordered by descending confidence.
///
/// `results` must already be in fused order; chunks missing from `corpus`
/// are skipped.
pub fn aggregate(results: &[FusedResult], corpus: &ChunkStore, scale: ScoreScale) -> (Vec<Citation>, Vec<BankConfidence>) {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut citations = Vec::new();
    for result in results {
        let Some(chunk) = corpus.get(&result.chunk_id) else { continue };
        if !seen.insert(chunk.bank.as_str()) { continue; }
        citations.push(Citation {
            bank: chunk.bank.clone(),
            page: chunk.page,
            score: scale.confidence(result.fused_score),
            source: chunk.source_document.clone(),
        });
    }
    // Stable: banks with equal confidence keep fused order.
    citations.sort_by(|a, b| b.score.total_cmp(&a.score));
    let banks = citations.iter().map(|c| BankConfidence { name: c.bank.clone(), confidence: c.score }).collect();
    (citations, banks)
}
