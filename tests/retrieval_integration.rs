//! Integration tests for the evidence retriever over a real FTS5 index

use credence::retrieval::{
    Corpus, Document, EvidenceRetriever, FtsIndexLayer, MemoryLayer, RankingCore, RetrievalModel,
    RetrievalOptions,
};
use credence::text::Normalizer;
use std::path::Path;
use tempfile::TempDir;

fn corpus() -> Corpus {
    Corpus::from_documents(vec![
        Document::new(
            "AP880101-0001",
            "The Federal Reserve raised interest rates to fight inflation.",
        ),
        Document::new(
            "AP880101-0002",
            "Inflation climbed again as consumer prices rose sharply.",
        ),
        Document::new(
            "AP880101-0003",
            "Farmers in Kansas face the worst drought in decades.",
        ),
        Document::new(
            "AP880101-0004",
            "Drought conditions spread across the Midwest, hurting corn farmers.",
        ),
        Document::new("AP880101-0005", "The central bank kept interest rates unchanged."),
    ])
}

fn chained_retriever(index: &Path) -> EvidenceRetriever {
    let normalizer = Normalizer::default();
    let memory = MemoryLayer::new(corpus(), &normalizer, RankingCore::default());
    let fts = FtsIndexLayer::open(index, &normalizer);
    EvidenceRetriever::new(normalizer)
        .with_layer(Box::new(fts))
        .with_layer(Box::new(memory))
}

fn options(model: RetrievalModel) -> RetrievalOptions {
    RetrievalOptions {
        k: 10,
        model,
        use_prf: true,
    }
}

fn sorted(ids: Vec<&str>) -> Vec<String> {
    let mut ids: Vec<String> = ids.into_iter().map(String::from).collect();
    ids.sort();
    ids
}

#[test]
fn test_bm25_served_by_fts_index() {
    let tmp = TempDir::new().unwrap();
    let index = tmp.path().join("index.db");
    let count = FtsIndexLayer::build(&index, &corpus(), &Normalizer::default()).unwrap();
    assert_eq!(count, 5);

    let retriever = chained_retriever(&index);
    assert_eq!(retriever.available_layers(), vec!["fts5", "memory"]);

    let result = retriever.retrieve("drought farmers", &options(RetrievalModel::Bm25));
    assert_eq!(result.served_by, "fts5");
    assert_eq!(
        sorted(result.doc_ids()),
        vec!["AP880101-0003", "AP880101-0004"]
    );
    for (i, ev) in result.evidences.iter().enumerate() {
        assert_eq!(ev.rank, i + 1);
        assert!(ev.score > 0.0);
        assert_eq!(ev.source, "TREC-AP88-90");
        assert!(ev.text.to_lowercase().contains("drought"));
    }
}

#[test]
fn test_qld_falls_through_to_memory_layer() {
    let tmp = TempDir::new().unwrap();
    let index = tmp.path().join("index.db");
    FtsIndexLayer::build(&index, &corpus(), &Normalizer::default()).unwrap();

    let retriever = chained_retriever(&index);
    let result = retriever.retrieve("drought farmers", &options(RetrievalModel::Qld));
    assert_eq!(result.served_by, "memory");
    assert_eq!(result.model_used, "qld");
    assert_eq!(
        sorted(result.doc_ids()),
        vec!["AP880101-0003", "AP880101-0004"]
    );
}

#[test]
fn test_missing_index_degrades_to_memory() {
    let tmp = TempDir::new().unwrap();
    let retriever = chained_retriever(&tmp.path().join("absent.db"));
    assert_eq!(retriever.available_layers(), vec!["memory"]);

    let result = retriever.retrieve("interest rates", &options(RetrievalModel::Bm25));
    assert_eq!(result.served_by, "memory");
    assert_eq!(
        sorted(result.doc_ids()),
        vec!["AP880101-0001", "AP880101-0005"]
    );

    let stats = retriever.stats();
    assert_eq!(stats.queries_processed, 1);
    assert!(!stats.has_external_index);
    assert_eq!(stats.last_served_by.as_deref(), Some("memory"));
}

#[test]
fn test_retrieval_is_deterministic() {
    let tmp = TempDir::new().unwrap();
    let index = tmp.path().join("index.db");
    FtsIndexLayer::build(&index, &corpus(), &Normalizer::default()).unwrap();
    let retriever = chained_retriever(&index);

    for model in [RetrievalModel::Bm25, RetrievalModel::Qld] {
        let a = retriever.retrieve("interest rates inflation", &options(model));
        let b = retriever.retrieve("interest rates inflation", &options(model));
        assert_eq!(a.evidences, b.evidences);
        assert_eq!(a.expanded_query, b.expanded_query);
    }
}

#[test]
fn test_batch_preserves_claim_order() {
    let retriever = EvidenceRetriever::in_memory(corpus(), Normalizer::default(), RankingCore::default())
        .with_workers(2)
        .unwrap();
    let claims = vec![
        "drought".to_string(),
        "".to_string(),
        "central bank".to_string(),
    ];
    let results = retriever.batch_retrieve(&claims, &options(RetrievalModel::Bm25));

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].query, "drought");
    assert!(results[1].is_empty());
    assert_eq!(results[2].doc_ids(), vec!["AP880101-0005"]);
}
