use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use loanrag_core::error::Result;
use loanrag_core::types::{BankConfidence, Citation, Degradation, RetrievalMode};
use loanrag_hybrid::HybridRetriever;

use crate::generator::Generator;
use crate::prompt::{build_prompt, NOT_FOUND_ANSWER};

/// Final answer with the evidence it was grounded on.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub answer: String,
    pub banks: Vec<BankConfidence>,
    pub citations: Vec<Citation>,
    pub mode: RetrievalMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degradation: Option<Degradation>,
}

/// Retrieval followed by grounded generation.
pub struct AnswerOrchestrator {
    retriever: Arc<HybridRetriever>,
    generator: Arc<dyn Generator>,
    timeout: Duration,
}

impl AnswerOrchestrator {
    pub fn new(retriever: Arc<HybridRetriever>, generator: Arc<dyn Generator>, timeout: Duration) -> Self {
        Self { retriever, generator, timeout }
    }

    /// Only input errors from retrieval propagate. No evidence yields the
    /// not-found answer without calling the generator; a failed, slow or
    /// blank generation yields it too, with the citations kept.
    pub async fn ask(&self, question: &str, top_k: usize, mode: RetrievalMode) -> Result<Answer> {
        let retrieval = self.retriever.retrieve(question, top_k, mode).await?;
        if retrieval.is_empty() {
            debug!(mode = %retrieval.mode, "no evidence found");
            return Ok(Answer {
                answer: NOT_FOUND_ANSWER.to_string(),
                banks: Vec::new(),
                citations: Vec::new(),
                mode: retrieval.mode,
                degradation: retrieval.degradation,
            });
        }

        let prompt = build_prompt(question.trim(), retrieval.evidence().map(|(_, chunk)| chunk));
        let text = match tokio::time::timeout(self.timeout, self.generator.generate(&prompt)).await {
            Ok(Ok(text)) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(Ok(_)) => {
                warn!("generator returned an empty answer");
                NOT_FOUND_ANSWER.to_string()
            }
            Ok(Err(e)) => {
                warn!(error = %e, "generation failed");
                NOT_FOUND_ANSWER.to_string()
            }
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "generation timed out");
                NOT_FOUND_ANSWER.to_string()
            }
        };

        let mode = retrieval.mode;
        let degradation = retrieval.degradation.clone();
        let (_, citations, banks) = retrieval.into_parts();
        Ok(Answer { answer: text, banks, citations, mode, degradation })
    }
}
