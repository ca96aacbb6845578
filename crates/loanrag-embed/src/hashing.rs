use std::hash::{Hash, Hasher};
use twox_hash::XxHash64;

use loanrag_core::traits::Embedder;

/// Deterministic bag-of-words embedder: each lowercased word is hashed into a
/// bucket with a positive weight and the vector is L2-normalised.
///
/// Texts sharing words get positive cosine similarity, which is enough for
/// tests and offline development without model weights.
pub struct HashingEmbedder {
    dim: usize,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self { Self { dim: dim.max(1) } }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for token in text.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            let mut hasher = XxHash64::with_seed(0);
            token.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h % self.dim as u64) as usize;
            let weight = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += 0.5 + 0.5 * weight;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
        for x in &mut v { *x /= norm; }
        v
    }
}

impl Embedder for HashingEmbedder {
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { usize::MAX }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}
