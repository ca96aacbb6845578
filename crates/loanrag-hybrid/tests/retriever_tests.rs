use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use loanrag_core::error::{Error, Result};
use loanrag_core::traits::{LexicalBackend, SemanticBackend};
use loanrag_core::types::{Chunk, Degradation, RetrievalMode, SearchHit, SourceKind};
use loanrag_hybrid::{HybridRetriever, RetrievalOptions};

#[derive(Clone)]
enum Lexical {
    Hits(Vec<&'static str>),
    Missing,
    Broken,
    /// Blocks the calling thread before answering.
    Slow(Duration, Vec<&'static str>),
}

struct FakeLexical {
    behaviour: Mutex<Lexical>,
    builds: Mutex<usize>,
}

impl FakeLexical {
    fn new(behaviour: Lexical) -> Arc<Self> {
        Arc::new(Self { behaviour: Mutex::new(behaviour), builds: Mutex::new(0) })
    }
}

impl LexicalBackend for FakeLexical {
    fn build(&self, _chunks: &[Chunk]) -> Result<()> {
        *self.builds.lock().unwrap() += 1;
        Ok(())
    }

    fn query(&self, _text: &str, k: usize) -> Result<Vec<SearchHit>> {
        match &*self.behaviour.lock().unwrap() {
            Lexical::Hits(ids) => Ok(SearchHit::ranked(
                SourceKind::Lexical,
                ids.iter().take(k).enumerate().map(|(i, id)| (id.to_string(), 12.0 - i as f32)),
            )),
            Lexical::Missing => Err(Error::IndexUnavailable("no CURRENT pointer".into())),
            Lexical::Broken => Err(Error::Operation("segment read failed".into())),
            Lexical::Slow(d, ids) => {
                std::thread::sleep(*d);
                Ok(SearchHit::ranked(
                    SourceKind::Lexical,
                    ids.iter().take(k).enumerate().map(|(i, id)| (id.to_string(), 12.0 - i as f32)),
                ))
            }
        }
    }

    fn is_available(&self) -> bool {
        !matches!(&*self.behaviour.lock().unwrap(), Lexical::Missing)
    }
}

#[derive(Clone)]
enum Semantic {
    Hits(Vec<(&'static str, f32)>),
    Down,
    Broken,
    Slow(Duration),
    Delayed(Duration, Vec<(&'static str, f32)>),
}

struct FakeSemantic {
    behaviour: Semantic,
    builds: Mutex<usize>,
    restored: Mutex<usize>,
}

impl FakeSemantic {
    fn new(behaviour: Semantic) -> Arc<Self> {
        Arc::new(Self { behaviour, builds: Mutex::new(0), restored: Mutex::new(0) })
    }
}

#[async_trait]
impl SemanticBackend for FakeSemantic {
    async fn build(&self, _chunks: &[Chunk]) -> Result<()> {
        *self.builds.lock().unwrap() += 1;
        Ok(())
    }

    fn restore(&self, chunks: &[Chunk]) -> Result<()> {
        *self.restored.lock().unwrap() = chunks.len();
        Ok(())
    }

    async fn query(&self, _text: &str, k: usize) -> Result<Vec<SearchHit>> {
        match &self.behaviour {
            Semantic::Hits(hits) => Ok(SearchHit::ranked(
                SourceKind::Semantic,
                hits.iter().take(k).map(|(id, s)| (id.to_string(), *s)),
            )),
            Semantic::Down => Err(Error::BackendUnreachable("connection refused".into())),
            Semantic::Broken => Err(Error::Operation("id map lock poisoned".into())),
            Semantic::Slow(d) => {
                tokio::time::sleep(*d).await;
                Ok(vec![])
            }
            Semantic::Delayed(d, hits) => {
                tokio::time::sleep(*d).await;
                Ok(SearchHit::ranked(SourceKind::Semantic, hits.iter().take(k).map(|(id, s)| (id.to_string(), *s))))
            }
        }
    }
}

fn chunk(id: &str, bank: &str, page: u32) -> Chunk {
    Chunk { id: id.into(), text: format!("text of {id}"), bank: bank.into(), source_document: format!("{bank}.pdf"), page }
}

fn corpus() -> Vec<Chunk> {
    vec![
        chunk("A", "HDFC Bank", 1),
        chunk("B", "State Bank of India", 2),
        chunk("C", "Axis Bank", 3),
        chunk("D", "HDFC Bank", 4),
    ]
}

fn options() -> RetrievalOptions {
    RetrievalOptions { semantic_timeout: Duration::from_millis(50), ..RetrievalOptions::default() }
}

async fn retriever(lexical: Arc<FakeLexical>, semantic: Arc<FakeSemantic>) -> HybridRetriever {
    let r = HybridRetriever::new(lexical, semantic, options());
    r.register_chunks(corpus()).await.expect("register");
    r
}

fn ids(r: &loanrag_core::types::Retrieval) -> Vec<&str> {
    r.results.iter().map(|f| f.chunk_id.as_str()).collect()
}

#[tokio::test]
async fn hybrid_fuses_both_rankings() {
    let r = retriever(
        FakeLexical::new(Lexical::Hits(vec!["A", "B"])),
        FakeSemantic::new(Semantic::Hits(vec![("B", 0.9), ("C", 0.8)])),
    )
    .await;
    let out = r.retrieve("maximum LTV", 6, RetrievalMode::Hybrid).await.unwrap();
    assert_eq!(ids(&out), ["B", "A", "C"]);
    assert_eq!(out.mode, RetrievalMode::Hybrid);
    assert!(out.degradation.is_none());
    assert_eq!(out.citations.len(), 3);
    assert_eq!(out.citations[0].bank, "State Bank of India");
    assert_eq!(out.banks[0].name, "State Bank of India");
    let evidence: Vec<&str> = out.evidence().map(|(_, c)| c.id.as_str()).collect();
    assert_eq!(evidence, ["B", "A", "C"]);
}

#[tokio::test]
async fn missing_lexical_index_in_hybrid_matches_semantic_mode() {
    let r = retriever(
        FakeLexical::new(Lexical::Missing),
        FakeSemantic::new(Semantic::Hits(vec![("C", 0.82), ("A", 0.64), ("D", 0.61)])),
    )
    .await;
    let hybrid = r.retrieve("prepayment penalty", 2, RetrievalMode::Hybrid).await.unwrap();
    let semantic = r.retrieve("prepayment penalty", 2, RetrievalMode::Semantic).await.unwrap();
    assert_eq!(hybrid.mode, RetrievalMode::Semantic);
    assert_eq!(hybrid.degradation, Some(Degradation::LexicalIndexMissing));
    assert!(semantic.degradation.is_none());
    assert_eq!(hybrid.clone().into_parts(), semantic.into_parts());
    assert!((hybrid.results[0].fused_score - 0.82).abs() < 1e-6);
    assert!((hybrid.banks[0].confidence - 0.82).abs() < 1e-6);
}

#[tokio::test]
async fn unreachable_semantic_falls_back_to_lexical_results() {
    let r = retriever(FakeLexical::new(Lexical::Hits(vec!["D", "A"])), FakeSemantic::new(Semantic::Down)).await;
    let out = r.retrieve("processing fee", 6, RetrievalMode::Hybrid).await.unwrap();
    assert_eq!(ids(&out), ["D", "A"]);
    assert_eq!(out.mode, RetrievalMode::Lexical);
    assert!(matches!(out.degradation, Some(Degradation::SemanticUnavailable(_))));
    // Both chunks are HDFC Bank: a single citation from the better one.
    assert_eq!(out.citations.len(), 1);
    assert_eq!(out.citations[0].page, 4);
}

#[tokio::test]
async fn slow_semantic_counts_as_unreachable() {
    let r = retriever(
        FakeLexical::new(Lexical::Hits(vec!["B"])),
        FakeSemantic::new(Semantic::Slow(Duration::from_millis(500))),
    )
    .await;
    let out = r.retrieve("tenure", 6, RetrievalMode::Hybrid).await.unwrap();
    assert_eq!(ids(&out), ["B"]);
    match out.degradation {
        Some(Degradation::SemanticUnavailable(reason)) => assert!(reason.contains("timed out"), "{reason}"),
        other => panic!("unexpected degradation {other:?}"),
    }
}

#[tokio::test]
async fn semantic_down_without_lexical_hits_is_empty_not_an_error() {
    let r = retriever(FakeLexical::new(Lexical::Hits(vec![])), FakeSemantic::new(Semantic::Down)).await;
    let out = r.retrieve("foreclosure charges", 6, RetrievalMode::Hybrid).await.unwrap();
    assert!(out.is_empty());
    assert!(out.citations.is_empty() && out.banks.is_empty());
    assert!(out.degradation.is_some());

    let out = r.retrieve("foreclosure charges", 6, RetrievalMode::Semantic).await.unwrap();
    assert!(out.is_empty());
}

#[tokio::test]
async fn zero_hits_everywhere_is_an_empty_triple() {
    let r = retriever(FakeLexical::new(Lexical::Hits(vec![])), FakeSemantic::new(Semantic::Hits(vec![]))).await;
    let (results, citations, banks) = r.retrieve("anything", 6, RetrievalMode::Hybrid).await.unwrap().into_parts();
    assert!(results.is_empty() && citations.is_empty() && banks.is_empty());
}

#[tokio::test]
async fn lexical_mode_ignores_semantic_and_reports_missing_index() {
    let semantic = FakeSemantic::new(Semantic::Down);
    let r = retriever(FakeLexical::new(Lexical::Hits(vec!["C", "B", "A"])), semantic).await;
    let out = r.retrieve("GST", 2, RetrievalMode::Lexical).await.unwrap();
    assert_eq!(ids(&out), ["C", "B"]);
    assert!(out.degradation.is_none());
    assert!((out.results[0].fused_score - 1.0 / 61.0).abs() < 1e-12);

    let r = retriever(FakeLexical::new(Lexical::Missing), FakeSemantic::new(Semantic::Hits(vec![("A", 0.9)]))).await;
    let out = r.retrieve("GST", 2, RetrievalMode::Lexical).await.unwrap();
    assert!(out.is_empty());
    assert_eq!(out.degradation, Some(Degradation::LexicalIndexMissing));
}

#[tokio::test]
async fn top_k_bounds_results_without_padding() {
    let r = retriever(
        FakeLexical::new(Lexical::Hits(vec!["A", "B", "C"])),
        FakeSemantic::new(Semantic::Hits(vec![("A", 0.9)])),
    )
    .await;
    assert_eq!(r.retrieve("q", 6, RetrievalMode::Hybrid).await.unwrap().results.len(), 3);
    assert_eq!(r.retrieve("q", 2, RetrievalMode::Hybrid).await.unwrap().results.len(), 2);
}

#[tokio::test]
async fn input_errors_are_rejected() {
    let r = retriever(FakeLexical::new(Lexical::Hits(vec!["A"])), FakeSemantic::new(Semantic::Hits(vec![]))).await;
    assert!(matches!(r.retrieve("   ", 6, RetrievalMode::Hybrid).await, Err(Error::InvalidQuery(_))));
    assert!(matches!(r.retrieve("q", 0, RetrievalMode::Hybrid).await, Err(Error::InvalidTopK { top_k: 0, .. })));
    let over = r.options().max_top_k + 1;
    let err = r.retrieve("q", over, RetrievalMode::Hybrid).await.unwrap_err();
    assert!(err.is_input_error());
}

#[tokio::test]
async fn hits_outside_the_corpus_are_ignored() {
    let r = retriever(
        FakeLexical::new(Lexical::Hits(vec!["stale-1", "A"])),
        FakeSemantic::new(Semantic::Hits(vec![("stale-2", 0.99)])),
    )
    .await;
    let out = r.retrieve("q", 6, RetrievalMode::Hybrid).await.unwrap();
    assert_eq!(ids(&out), ["A"]);
    assert_eq!(out.results[0].contributing_ranks.lexical, Some(1), "ranks are dense after unknown ids drop");
}

#[tokio::test]
async fn stale_semantic_ids_do_not_split_hybrid_from_semantic() {
    let r = retriever(
        FakeLexical::new(Lexical::Missing),
        FakeSemantic::new(Semantic::Hits(vec![("stale", 0.99), ("C", 0.8), ("A", 0.6)])),
    )
    .await;
    let hybrid = r.retrieve("moratorium", 2, RetrievalMode::Hybrid).await.unwrap();
    let semantic = r.retrieve("moratorium", 2, RetrievalMode::Semantic).await.unwrap();
    assert_eq!(ids(&hybrid), ["C", "A"]);
    assert_eq!(hybrid.into_parts(), semantic.into_parts());
}

#[tokio::test]
async fn failing_lexical_search_degrades_to_semantic_hits() {
    let r = retriever(FakeLexical::new(Lexical::Broken), FakeSemantic::new(Semantic::Hits(vec![("A", 0.9)]))).await;
    let out = r.retrieve("insurance", 6, RetrievalMode::Hybrid).await.unwrap();
    assert_eq!(ids(&out), ["A"]);
    assert_eq!(out.mode, RetrievalMode::Semantic);
    match out.degradation {
        Some(Degradation::LexicalUnavailable(reason)) => assert!(reason.contains("segment read failed"), "{reason}"),
        other => panic!("unexpected degradation {other:?}"),
    }

    let out = r.retrieve("insurance", 6, RetrievalMode::Lexical).await.unwrap();
    assert!(out.is_empty());
    assert!(matches!(out.degradation, Some(Degradation::LexicalUnavailable(_))));
}

#[tokio::test]
async fn failing_semantic_search_degrades_to_lexical_hits() {
    let r = retriever(FakeLexical::new(Lexical::Hits(vec!["B", "C"])), FakeSemantic::new(Semantic::Broken)).await;
    let out = r.retrieve("balance transfer", 6, RetrievalMode::Hybrid).await.unwrap();
    assert_eq!(ids(&out), ["B", "C"]);
    assert_eq!(out.mode, RetrievalMode::Lexical);
    assert!(matches!(out.degradation, Some(Degradation::SemanticUnavailable(_))));

    let out = r.retrieve("balance transfer", 6, RetrievalMode::Semantic).await.unwrap();
    assert!(out.is_empty());
    assert!(matches!(out.degradation, Some(Degradation::SemanticUnavailable(_))));
}

#[tokio::test]
async fn both_backends_failing_is_empty_not_an_error() {
    let r = retriever(FakeLexical::new(Lexical::Broken), FakeSemantic::new(Semantic::Broken)).await;
    let out = r.retrieve("q", 6, RetrievalMode::Hybrid).await.unwrap();
    assert!(out.is_empty());
    assert!(matches!(out.degradation, Some(Degradation::SemanticUnavailable(_))));
}

#[tokio::test]
async fn lexical_and_semantic_queries_overlap() {
    let delay = Duration::from_millis(150);
    let lexical = FakeLexical::new(Lexical::Slow(delay, vec!["A", "B"]));
    let semantic = FakeSemantic::new(Semantic::Delayed(delay, vec![("B", 0.9), ("C", 0.8)]));
    let r = HybridRetriever::new(
        lexical,
        semantic,
        RetrievalOptions { semantic_timeout: Duration::from_secs(2), ..RetrievalOptions::default() },
    );
    r.register_chunks(corpus()).await.unwrap();

    let start = Instant::now();
    let out = r.retrieve("maximum LTV", 6, RetrievalMode::Hybrid).await.unwrap();
    let elapsed = start.elapsed();
    assert_eq!(ids(&out), ["B", "A", "C"]);
    assert!(elapsed < delay * 2 - Duration::from_millis(50), "queries ran back to back: {elapsed:?}");
}

#[tokio::test]
async fn register_builds_both_backends_and_swaps_the_snapshot() {
    let lexical = FakeLexical::new(Lexical::Hits(vec!["A"]));
    let semantic = FakeSemantic::new(Semantic::Hits(vec![]));
    let r = HybridRetriever::new(lexical.clone(), semantic.clone(), options());
    assert!(r.corpus().is_empty());
    r.register_chunks(corpus()).await.unwrap();
    assert_eq!(r.corpus().len(), 4);
    assert_eq!(*lexical.builds.lock().unwrap(), 1);
    assert_eq!(*semantic.builds.lock().unwrap(), 1);

    let dup = vec![chunk("A", "HDFC Bank", 1), chunk("A", "Axis Bank", 2)];
    assert!(matches!(r.register_chunks(dup).await, Err(Error::InvalidCorpus(_))));
    assert_eq!(r.corpus().len(), 4, "failed registration keeps the previous snapshot");
}

#[tokio::test]
async fn attach_restores_without_rebuilding() {
    let lexical = FakeLexical::new(Lexical::Hits(vec!["B"]));
    let semantic = FakeSemantic::new(Semantic::Hits(vec![]));
    let r = HybridRetriever::new(lexical.clone(), semantic.clone(), options());
    r.attach(loanrag_core::ChunkStore::from_chunks(corpus()).unwrap()).unwrap();
    assert_eq!(*semantic.restored.lock().unwrap(), 4);
    assert_eq!(*semantic.builds.lock().unwrap(), 0);
    assert_eq!(*lexical.builds.lock().unwrap(), 0);
    let out = r.retrieve("q", 3, RetrievalMode::Hybrid).await.unwrap();
    assert_eq!(ids(&out), ["B"]);
}
