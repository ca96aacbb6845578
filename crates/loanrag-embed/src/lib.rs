use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use candle_core::Device;
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig, DTYPE};
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use loanrag_core::config::{expand_path, EmbeddingSettings};
use loanrag_core::traits::Embedder;

mod device;
mod hashing;
mod pool;
mod tokenize;

pub use device::select_device;
pub use hashing::HashingEmbedder;
pub use pool::mean_pool_normalized;
pub use tokenize::tokenize_batch;

const DEFAULT_MODEL: &str = "all-MiniLM-L6-v2";
const MAX_TOKENS: usize = 256;

/// Fields of a BERT `config.json` we need beyond what `BertConfig` exposes.
#[derive(Deserialize)]
struct ModelShape {
    hidden_size: usize,
    max_position_embeddings: usize,
}

/// Sentence-transformer style encoder: BERT forward pass, masked mean pooling,
/// unit-length output. Loads `config.json`, `tokenizer.json` and either
/// `model.safetensors` or `pytorch_model.bin` from one directory.
pub struct SentenceEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    dim: usize,
    max_len: usize,
}

impl SentenceEmbedder {
    pub fn load(model_dir: &Path) -> Result<Self> {
        let device = select_device();
        info!(dir = %model_dir.display(), "loading sentence embedder");

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;

        let config_path = model_dir.join("config.json");
        let raw = std::fs::read_to_string(&config_path)
            .map_err(|e| anyhow!("Failed to read {}: {}", config_path.display(), e))?;
        let config: BertConfig = serde_json::from_str(&raw)?;
        let shape: ModelShape = serde_json::from_str(&raw)?;

        let vb = load_weights(model_dir, &device)?;
        let model = BertModel::load(vb, &config)?;
        let max_len = shape.max_position_embeddings.min(MAX_TOKENS);
        info!(dim = shape.hidden_size, max_len, "sentence embedder ready");
        Ok(Self { model, tokenizer, device, dim: shape.hidden_size, max_len })
    }
}

fn load_weights(model_dir: &Path, device: &Device) -> Result<VarBuilder<'static>> {
    let safetensors = model_dir.join("model.safetensors");
    if safetensors.exists() {
        let tensors = candle_core::safetensors::load(&safetensors, device)
            .map_err(|e| anyhow!("Failed to read {}: {}", safetensors.display(), e))?;
        return Ok(VarBuilder::from_tensors(tensors, DTYPE, device));
    }
    let pth = model_dir.join("pytorch_model.bin");
    if pth.exists() {
        return Ok(VarBuilder::from_pth(&pth, DTYPE, device)?);
    }
    Err(anyhow!("No model weights found in {}", model_dir.display()))
}

impl Embedder for SentenceEmbedder {
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { self.max_len }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() { return Ok(vec![]); }
        let start = Instant::now();
        let (input_ids, attention_mask) = tokenize_batch(&self.tokenizer, texts, self.max_len, &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;
        let hidden = self.model.forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
        let pooled = mean_pool_normalized(&hidden, &attention_mask)?;
        let out: Vec<Vec<f32>> = pooled.to_device(&Device::Cpu)?.to_vec2()?;
        let elapsed = start.elapsed();
        if elapsed.as_millis() > 100 {
            debug!(batch = texts.len(), ms = elapsed.as_millis() as u64, "slow embedding batch");
        }
        Ok(out)
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name).ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false)
}

/// Embedder selected by configuration. `embedding.use_fake` (or
/// `APP_USE_FAKE_EMBEDDINGS=1`) selects the hashing embedder.
pub fn default_embedder(settings: &EmbeddingSettings) -> Result<Arc<dyn Embedder>> {
    if settings.use_fake || env_flag("APP_USE_FAKE_EMBEDDINGS") {
        info!(dim = settings.dim, "using hashing embedder");
        return Ok(Arc::new(HashingEmbedder::new(settings.dim)));
    }
    let dir = resolve_model_dir(settings.model_dir.as_deref())?;
    let model = SentenceEmbedder::load(&dir)?;
    if model.dim() != settings.dim {
        warn!(configured = settings.dim, model = model.dim(), "embedding.dim differs from model width; using model width");
    }
    Ok(Arc::new(model))
}

/// Locate the model directory: explicit setting, then `APP_MODEL_DIR`,
/// `MODEL_DIR`, then `../models/<default>` and `models/<default>`.
pub fn resolve_model_dir(configured: Option<&str>) -> Result<PathBuf> {
    let mut candidates: Vec<(&str, PathBuf)> = Vec::new();
    if let Some(dir) = configured { candidates.push(("embedding.model_dir", expand_path(dir))); }
    for var in ["APP_MODEL_DIR", "MODEL_DIR"] {
        if let Ok(dir) = std::env::var(var) { candidates.push((var, expand_path(dir))); }
    }
    candidates.push(("default", Path::new("..").join("models").join(DEFAULT_MODEL)));
    candidates.push(("default", Path::new("models").join(DEFAULT_MODEL)));
    for (origin, path) in candidates {
        if path.exists() {
            debug!(origin, dir = %path.display(), "model directory resolved");
            return Ok(path);
        }
    }
    Err(anyhow!("Could not locate the {} model directory; set embedding.model_dir or APP_MODEL_DIR", DEFAULT_MODEL))
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Tensor;
    use std::collections::HashMap;

    #[test]
    fn safetensors_weights_load_into_a_var_builder() {
        let dir = tempfile::tempdir().unwrap();
        let mut tensors = HashMap::new();
        tensors.insert("pooler.weight".to_string(), Tensor::ones((2, 3), DTYPE, &Device::Cpu).unwrap());
        candle_core::safetensors::save(&tensors, dir.path().join("model.safetensors")).unwrap();

        let vb = load_weights(dir.path(), &Device::Cpu).unwrap();
        let w = vb.get((2, 3), "pooler.weight").unwrap();
        let total: f32 = w.sum_all().unwrap().to_scalar().unwrap();
        assert_eq!(total, 6.0);
    }

    #[test]
    fn missing_weights_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_weights(dir.path(), &Device::Cpu).err().unwrap();
        assert!(err.to_string().contains("No model weights"));
    }
}
