use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use loanrag_answer::{AnswerOrchestrator, Generator, NOT_FOUND_ANSWER};
use loanrag_core::error::{Error, Result};
use loanrag_core::traits::{LexicalBackend, SemanticBackend};
use loanrag_core::types::{Chunk, RetrievalMode, SearchHit, SourceKind};
use loanrag_hybrid::{HybridRetriever, RetrievalOptions};

struct ListLexical(Vec<&'static str>);

impl LexicalBackend for ListLexical {
    fn build(&self, _: &[Chunk]) -> Result<()> { Ok(()) }
    fn query(&self, _: &str, k: usize) -> Result<Vec<SearchHit>> {
        Ok(SearchHit::ranked(SourceKind::Lexical, self.0.iter().take(k).map(|id| (id.to_string(), 5.0))))
    }
    fn is_available(&self) -> bool { true }
}

struct NoSemantic;

#[async_trait]
impl SemanticBackend for NoSemantic {
    async fn build(&self, _: &[Chunk]) -> Result<()> { Ok(()) }
    fn restore(&self, _: &[Chunk]) -> Result<()> { Ok(()) }
    async fn query(&self, _: &str, _: usize) -> Result<Vec<SearchHit>> { Ok(vec![]) }
}

enum Reply {
    Echo,
    Fail,
    Blank,
    Hang,
}

struct FakeGenerator {
    reply: Reply,
    calls: AtomicUsize,
}

#[async_trait]
impl Generator for FakeGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.reply {
            Reply::Echo => Ok(format!("  {prompt}  ")),
            Reply::Fail => Err(Error::Generation("quota exceeded".into())),
            Reply::Blank => Ok("   ".into()),
            Reply::Hang => {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok("late".into())
            }
        }
    }
}

fn chunk(id: &str, bank: &str, page: u32, text: &str) -> Chunk {
    Chunk { id: id.into(), text: text.into(), bank: bank.into(), source_document: format!("{id}.pdf"), page }
}

async fn orchestrator(lexical: Vec<&'static str>, reply: Reply) -> (AnswerOrchestrator, Arc<FakeGenerator>) {
    let retriever = HybridRetriever::new(Arc::new(ListLexical(lexical)), Arc::new(NoSemantic), RetrievalOptions::default());
    retriever
        .register_chunks(vec![
            chunk("hdfc", "HDFC Bank", 3, "LTV up to 90% for loans below 30 lakh."),
            chunk("sbi", "State Bank of India", 8, "Processing fee 0.35% + GST."),
        ])
        .await
        .unwrap();
    let generator = Arc::new(FakeGenerator { reply, calls: AtomicUsize::new(0) });
    let orch = AnswerOrchestrator::new(Arc::new(retriever), generator.clone(), Duration::from_millis(100));
    (orch, generator)
}

#[tokio::test]
async fn answer_is_grounded_on_retrieved_chunks() {
    let (orch, generator) = orchestrator(vec!["sbi", "hdfc"], Reply::Echo).await;
    let answer = orch.ask("  processing fee?  ", 6, RetrievalMode::Hybrid).await.unwrap();
    assert!(answer.answer.contains("QUESTION:\nprocessing fee?\n"));
    assert!(answer.answer.contains("[State Bank of India | p8]\nProcessing fee 0.35% + GST."));
    assert!(answer.answer.ends_with("LTV up to 90% for loans below 30 lakh."), "trimmed: {:?}", answer.answer);
    assert_eq!(answer.citations.len(), 2);
    assert_eq!(answer.banks[0].name, "State Bank of India");
    assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn no_evidence_skips_generation() {
    let (orch, generator) = orchestrator(vec![], Reply::Echo).await;
    let answer = orch.ask("moratorium period", 6, RetrievalMode::Hybrid).await.unwrap();
    assert_eq!(answer.answer, NOT_FOUND_ANSWER);
    assert!(answer.banks.is_empty() && answer.citations.is_empty());
    assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn failed_blank_or_slow_generation_falls_back_but_keeps_citations() {
    for reply in [Reply::Fail, Reply::Blank, Reply::Hang] {
        let (orch, _) = orchestrator(vec!["hdfc"], reply).await;
        let answer = orch.ask("LTV", 6, RetrievalMode::Hybrid).await.unwrap();
        assert_eq!(answer.answer, NOT_FOUND_ANSWER);
        assert_eq!(answer.citations.len(), 1);
        assert_eq!(answer.citations[0].bank, "HDFC Bank");
    }
}

#[tokio::test]
async fn input_errors_still_propagate() {
    let (orch, _) = orchestrator(vec!["hdfc"], Reply::Echo).await;
    assert!(matches!(orch.ask("", 6, RetrievalMode::Hybrid).await, Err(Error::InvalidQuery(_))));
}
