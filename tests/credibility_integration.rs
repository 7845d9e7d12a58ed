//! Integration tests for claim assessment: graph context feeding fusion

use chrono::{TimeZone, Utc};
use credence::fusion::{
    CredibilityLabel, Factor, FnProvider, FusionEngine, ProviderSet, ProviderSignal, Reputation,
    SourceFacts,
};
use credence::graph::{
    ContextParams, ContextScorer, GraphError, KnowledgeGraph, MemoryGraph, ReportQuery, ReportRow,
};
use credence::pipeline::{Assessor, Claim};
use credence::retrieval::{Corpus, Document, EvidenceRetriever, RankingCore, RetrievalOptions};
use credence::text::Normalizer;
use std::sync::Arc;
use std::time::Duration;

fn retriever() -> Arc<EvidenceRetriever> {
    let corpus = Corpus::from_documents(vec![
        Document::new("AP1", "The government announced a new climate policy on emissions."),
        Document::new("AP2", "Parliament debated the climate bill for a second day."),
    ]);
    Arc::new(EvidenceRetriever::in_memory(
        corpus,
        Normalizer::default(),
        RankingCore::default(),
    ))
}

fn report(i: u32, url: &str, content: &str, score: f64, level: &str) -> ReportRow {
    ReportRow {
        report_uri: format!("http://example.org/report/{}", i),
        subject_url: Some(url.to_string()),
        content: Some(content.to_string()),
        score,
        level: level.to_string(),
        completed_at: Utc.with_ymd_and_hms(2025, 1, i, 12, 0, 0).unwrap(),
    }
}

fn assessor(graph: Arc<dyn KnowledgeGraph>) -> Assessor {
    Assessor::new(
        retriever(),
        FusionEngine::default(),
        ProviderSet::new(Duration::from_millis(200)),
        RetrievalOptions::default(),
    )
    .with_context(ContextScorer::new(graph, ContextParams::default()))
}

struct DownGraph;

impl KnowledgeGraph for DownGraph {
    fn name(&self) -> &'static str {
        "down"
    }

    fn reports(&self, _query: &ReportQuery) -> Result<Vec<ReportRow>, GraphError> {
        Err(GraphError::Transport("connection refused".to_string()))
    }
}

#[test]
fn test_source_history_raises_credibility() {
    let graph = MemoryGraph::with_reports(
        (1..=5)
            .map(|i| report(i, "https://www.lemonde.fr/sport", "Match results from Paris", 0.8, "High"))
            .collect(),
    );
    let claim = Claim::new("Government announces new climate policy")
        .with_domain("lemonde.fr")
        .with_source(SourceFacts {
            reputation: Reputation::High,
            domain_age_days: Some(2000),
        });

    let result = assessor(Arc::new(graph)).assess(&claim);

    let ctx = result.graph.as_ref().unwrap();
    assert!(ctx.score.has_history);
    assert_eq!(ctx.score.history_count, 5);
    assert!(ctx.similar.is_empty());
    assert!((ctx.score.confidence - 0.8).abs() < 1e-9);
    assert!(ctx.summary().contains("Analyzed 5 times previously"));

    let graph_signal = result
        .fusion
        .contributions
        .iter()
        .find(|c| c.factor_name == Factor::GraphContext.as_str())
        .unwrap();
    assert!((graph_signal.weight - 0.15 * 0.8).abs() < 1e-9);
    assert!(graph_signal.signed_adjustment > 0.0);

    assert!(result.fusion.label >= CredibilityLabel::MediumHigh);
}

#[test]
fn test_similar_claims_found_by_keyword() {
    let graph = MemoryGraph::with_reports(vec![
        report(1, "https://blog.example/a", "Climate policy is a hoax, insiders say", 0.2, "Low"),
        report(2, "https://blog.example/b", "Celebrity gossip roundup", 0.5, "Medium"),
    ]);
    let claim = Claim::new("New climate policy announced");

    let result = assessor(Arc::new(graph)).assess(&claim);
    let ctx = result.graph.as_ref().unwrap();
    assert!(!ctx.score.has_history);
    assert_eq!(ctx.similar.len(), 1);
    assert_eq!(ctx.similar_uris(), vec!["http://example.org/report/1"]);
    assert!((ctx.score.combined_score - 0.2).abs() < 1e-9);
}

#[test]
fn test_graph_outage_is_neutral() {
    let claim = Claim::new("Government announces new climate policy").with_domain("lemonde.fr");
    let result = assessor(Arc::new(DownGraph)).assess(&claim);

    let ctx = result.graph.as_ref().unwrap();
    assert_eq!(ctx.score.confidence, 0.0);
    assert!(!ctx.score.has_data());
    assert!(result
        .fusion
        .contributions
        .iter()
        .all(|c| c.factor_name != Factor::GraphContext.as_str()));
    assert!(!result.retrieval.is_empty());
}

#[test]
fn test_provider_signals_enter_fusion() {
    let providers = ProviderSet::new(Duration::from_millis(200))
        .with(Arc::new(FnProvider::new("fact-check", Factor::FactCheck, |_| {
            Ok(Some(ProviderSignal::new(0.0, "False")))
        })))
        .with(Arc::new(FnProvider::new("sentiment", Factor::NegativeSentiment, |_| {
            Ok(Some(ProviderSignal::from_sentiment("NEGATIVE", 0.95)))
        })));
    let a = Assessor::new(
        retriever(),
        FusionEngine::default(),
        providers,
        RetrievalOptions::default(),
    );

    let result = a.assess(&Claim::new("Parliament secretly abolished the climate bill"));
    let names: Vec<&str> = result
        .fusion
        .contributions
        .iter()
        .map(|c| c.factor_name.as_str())
        .collect();
    assert!(names.contains(&"fact_check"));
    assert!(names.contains(&"negative_sentiment"));
    assert!(result.fusion.final_score < 0.5);
    assert!(result.graph.is_none());
}
