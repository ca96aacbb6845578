//! Configuration loader, typed settings and path helpers.
//!
//! Figment merges built-in defaults, `config.toml`, `config.<env>.toml` and
//! `APP_*` environment variables (`__` separates nesting, e.g.
//! `APP_RETRIEVAL__RRF_K=30`). Relative paths in the settings resolve against
//! the directory holding `config.toml`, or the working directory without one.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::Error;

pub struct Config {
    figment: Figment,
    base_dir: PathBuf,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment, base_dir: config_dir() };
        config.validate_for_env(&env_name)?;
        Ok(config)
    }

    /// Directory relative setting paths are resolved against.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Typed view of the whole configuration, validated, with every path
    /// expanded and made absolute.
    pub fn settings(&self) -> anyhow::Result<Settings> {
        let mut settings: Settings = self
            .figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to extract settings: {}", e))?;
        settings.validate()?;
        settings.resolve_paths(&self.base_dir);
        Ok(settings)
    }

    fn validate_for_env(&self, env: &str) -> anyhow::Result<()> {
        let settings = self.settings()?;
        if matches!(env, "prod" | "production") {
            if settings.embedding.use_fake {
                anyhow::bail!("embedding.use_fake must be disabled in production");
            }
            if settings.vector.backend == VectorBackendKind::Memory {
                anyhow::bail!("vector.backend = \"memory\" does not persist and is not allowed in production");
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub retrieval: RetrievalSettings,
    pub corpus: CorpusSettings,
    pub lexical: LexicalSettings,
    pub vector: VectorSettings,
    pub embedding: EmbeddingSettings,
    pub llm: LlmSettings,
    pub ingest: IngestSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<(), Error> {
        let r = &self.retrieval;
        if r.rrf_k == 0 {
            return Err(Error::InvalidConfig("retrieval.rrf_k must be > 0".into()));
        }
        if r.default_top_k == 0 || r.default_top_k > r.max_top_k {
            return Err(Error::InvalidConfig(format!(
                "retrieval.default_top_k must be in 1..={} (got {})",
                r.max_top_k, r.default_top_k
            )));
        }
        if r.semantic_timeout_ms == 0 {
            return Err(Error::InvalidConfig("retrieval.semantic_timeout_ms must be > 0".into()));
        }
        if self.ingest.chunk_size == 0 || self.ingest.chunk_overlap >= self.ingest.chunk_size {
            return Err(Error::InvalidConfig("ingest.chunk_overlap must be smaller than ingest.chunk_size".into()));
        }
        if self.vector.backend == VectorBackendKind::Pinecone && self.vector.pinecone_host.is_none() {
            return Err(Error::InvalidConfig("vector.pinecone_host is required for the pinecone backend".into()));
        }
        Ok(())
    }

    pub fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &str| resolve_with_base(base, p).to_string_lossy().into_owned();
        self.corpus.snapshot_path = resolve(&self.corpus.snapshot_path);
        self.lexical.index_dir = resolve(&self.lexical.index_dir);
        self.vector.lancedb_dir = resolve(&self.vector.lancedb_dir);
        self.embedding.model_dir = self.embedding.model_dir.as_deref().map(resolve);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub rrf_k: u32,
    pub default_top_k: usize,
    pub max_top_k: usize,
    pub semantic_pool: usize,
    pub lexical_pool: usize,
    pub semantic_timeout_ms: u64,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { rrf_k: 60, default_top_k: 6, max_top_k: 50, semantic_pool: 20, lexical_pool: 50, semantic_timeout_ms: 1200 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusSettings {
    pub snapshot_path: String,
}

impl Default for CorpusSettings {
    fn default() -> Self {
        Self { snapshot_path: "data/corpus.json".into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LexicalSettings {
    pub index_dir: String,
}

impl Default for LexicalSettings {
    fn default() -> Self {
        Self { index_dir: "data/indexes/lexical".into() }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackendKind {
    /// LanceDB on local disk.
    #[default]
    Local,
    Pinecone,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorSettings {
    pub backend: VectorBackendKind,
    pub namespace: String,
    pub lancedb_dir: String,
    pub pinecone_host: Option<String>,
    pub pinecone_api_key: Option<String>,
    pub upsert_batch: usize,
}

impl Default for VectorSettings {
    fn default() -> Self {
        Self {
            backend: VectorBackendKind::Local,
            namespace: "default".into(),
            lancedb_dir: "data/indexes/lancedb".into(),
            pinecone_host: None,
            pinecone_api_key: None,
            upsert_batch: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub model_dir: Option<String>,
    pub use_fake: bool,
    pub dim: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self { model_dir: None, use_fake: false, dim: 384 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub gemini_api_key: Option<String>,
    pub model: String,
    pub timeout_ms: u64,
    pub temperature: f32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            model: "gemini-1.5-flash".into(),
            timeout_ms: 3500,
            temperature: 0.4,
            top_p: 0.9,
            max_output_tokens: 600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self { chunk_size: 800, chunk_overlap: 120 }
    }
}

/// Nearest directory, starting at the working directory, that holds a
/// `config.toml`. Figment searches for the file the same way.
fn config_dir() -> PathBuf {
    let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    cwd.ancestors()
        .find(|dir| dir.join("config.toml").is_file())
        .map_or_else(|| cwd.clone(), Path::to_path_buf)
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Expand `p`, then anchor it at `base` unless it is already absolute.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
