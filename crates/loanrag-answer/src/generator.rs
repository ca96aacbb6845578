use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use loanrag_core::config::LlmSettings;
use loanrag_core::error::{Error, Result};

const GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Text generation from a fully rendered prompt.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Fails with `Error::Generation` on any service or decoding error.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Google Gemini `generateContent` over HTTPS.
pub struct GeminiGenerator {
    client: Client,
    endpoint: String,
    api_key: String,
    config: GenerationConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    max_output_tokens: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
    generation_config: &'a GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

impl GenerateResponse {
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.iter().map(|p| p.text.as_str()).collect::<String>())
            .unwrap_or_default()
    }
}

impl GeminiGenerator {
    /// The key comes from `llm.gemini_api_key`, falling back to `GEMINI_API_KEY`.
    pub fn from_settings(settings: &LlmSettings) -> Result<Self> {
        let api_key = settings
            .gemini_api_key
            .clone()
            .or_else(|| std::env::var("GEMINI_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::InvalidConfig("llm.gemini_api_key (or GEMINI_API_KEY) is required".into()))?;
        let client = Client::builder()
            .timeout(Duration::from_millis(settings.timeout_ms))
            .build()
            .map_err(|e| Error::InvalidConfig(format!("http client: {e}")))?;
        Ok(Self {
            client,
            endpoint: format!("{GEMINI_ENDPOINT}/{}:generateContent", settings.model),
            api_key,
            config: GenerationConfig {
                temperature: settings.temperature,
                top_p: settings.top_p,
                max_output_tokens: settings.max_output_tokens,
            },
        })
    }
}

#[async_trait]
impl Generator for GeminiGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = GenerateRequest {
            contents: [Content { parts: [Part { text: prompt }] }],
            generation_config: &self.config,
        };
        let resp = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Generation(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(Error::Generation(format!("gemini returned {status}: {detail}")));
        }
        let parsed: GenerateResponse = resp.json().await.map_err(|e| Error::Generation(e.to_string()))?;
        let text = parsed.text();
        debug!(chars = text.len(), "gemini response received");
        Ok(text)
    }
}
