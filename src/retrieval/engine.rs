//! EvidenceRetriever - normalize, rank through the layer chain, expand once, materialize

use anyhow::{Context, Result};
use parking_lot::Mutex;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use super::corpus::Corpus;
use super::layer::SearchLayer;
use super::layers::MemoryLayer;
use super::prf::PrfExpander;
use super::ranking::{RankingCore, RetrievalModel, ScoredDoc};
use crate::text::Normalizer;

/// Layer name recorded when no layer could answer
pub const NO_LAYER: &str = "none";

/// Per-request retrieval options
#[derive(Debug, Clone, Copy)]
pub struct RetrievalOptions {
    pub k: usize,
    pub model: RetrievalModel,
    pub use_prf: bool,
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self {
            k: 10,
            model: RetrievalModel::Bm25,
            use_prf: true,
        }
    }
}

/// A retrieved document with its text, ready for downstream scoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub doc_id: String,
    /// Full document text; truncate with `display_text` for output only
    pub text: String,
    pub score: f64,
    /// 1-based, contiguous within a result
    pub rank: usize,
    pub source: String,
    pub retrieval_model: String,
}

impl Evidence {
    /// Text truncated to `max_chars` characters with a trailing "..."
    pub fn display_text(&self, max_chars: usize) -> String {
        if self.text.chars().count() <= max_chars {
            return self.text.clone();
        }
        let mut out: String = self.text.chars().take(max_chars).collect();
        out.push_str("...");
        out
    }
}

/// Collection tag shown next to evidence
pub fn source_tag(doc_id: &str) -> &'static str {
    if doc_id.contains("AP") {
        "TREC-AP88-90"
    } else {
        "unknown"
    }
}

/// Complete result of one `retrieve` call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub query: String,
    pub evidences: Vec<Evidence>,
    pub total_retrieved: usize,
    #[serde(with = "duration_ms")]
    pub search_time: Duration,
    pub model_used: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expanded_query: Option<String>,
    /// Name of the layer that produced the ranking ("none" if nothing could)
    pub served_by: String,
}

impl RetrievalResult {
    /// Build a result, checking the rank invariant
    ///
    /// Panics if ranks are not exactly 1..=n in order: that is a bug in
    /// the producer, not a runtime condition.
    pub fn new(
        query: impl Into<String>,
        evidences: Vec<Evidence>,
        search_time: Duration,
        model_used: impl Into<String>,
        expanded_query: Option<String>,
        served_by: impl Into<String>,
    ) -> Self {
        for (i, ev) in evidences.iter().enumerate() {
            assert_eq!(ev.rank, i + 1, "evidence ranks must be contiguous from 1");
        }
        Self {
            query: query.into(),
            total_retrieved: evidences.len(),
            evidences,
            search_time,
            model_used: model_used.into(),
            expanded_query,
            served_by: served_by.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.evidences.is_empty()
    }

    pub fn doc_ids(&self) -> Vec<&str> {
        self.evidences.iter().map(|e| e.doc_id.as_str()).collect()
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64() * 1000.0)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let ms = f64::deserialize(d)?;
        Ok(Duration::from_secs_f64(ms.max(0.0) / 1000.0))
    }
}

/// Usage statistics snapshot
#[derive(Debug, Clone, Serialize)]
pub struct RetrieverStats {
    pub queries_processed: u64,
    #[serde(with = "duration_ms")]
    pub total_search_time: Duration,
    #[serde(with = "duration_ms")]
    pub avg_search_time: Duration,
    pub corpus_size: usize,
    pub has_external_index: bool,
    pub last_served_by: Option<String>,
    /// Requests served per layer, in priority order
    pub served: Vec<(String, u64)>,
}

struct LayerSlot {
    layer: Box<dyn SearchLayer>,
    served: AtomicU64,
}

/// Evidence retrieval facade
///
/// Holds an ordered chain of search layers (highest priority first). Each
/// request walks the chain and the first available layer that supports
/// the model and answers without error serves it. Shared state is the
/// read-only layers plus atomic counters.
pub struct EvidenceRetriever {
    layers: Vec<LayerSlot>,
    normalizer: Normalizer,
    prf: PrfExpander,
    pool: Option<rayon::ThreadPool>,
    queries: AtomicU64,
    total_micros: AtomicU64,
    last_served: Mutex<Option<&'static str>>,
    degraded_warned: AtomicBool,
}

impl EvidenceRetriever {
    /// Retriever with no layers; add them with `with_layer` in priority order
    pub fn new(normalizer: Normalizer) -> Self {
        Self {
            layers: Vec::new(),
            normalizer,
            prf: PrfExpander::default(),
            pool: None,
            queries: AtomicU64::new(0),
            total_micros: AtomicU64::new(0),
            last_served: Mutex::new(None),
            degraded_warned: AtomicBool::new(false),
        }
    }

    /// Retriever backed only by the in-memory ranker
    pub fn in_memory(corpus: Corpus, normalizer: Normalizer, core: RankingCore) -> Self {
        let layer = MemoryLayer::new(corpus, &normalizer, core);
        Self::new(normalizer).with_layer(Box::new(layer))
    }

    pub fn with_layer(mut self, layer: Box<dyn SearchLayer>) -> Self {
        self.layers.push(LayerSlot {
            layer,
            served: AtomicU64::new(0),
        });
        self
    }

    pub fn with_prf(mut self, prf: PrfExpander) -> Self {
        self.prf = prf;
        self
    }

    /// Bound batch retrieval to a dedicated pool of `workers` threads
    pub fn with_workers(mut self, workers: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|i| format!("credence-retrieve-{}", i))
            .build()
            .context("Failed to build retrieval thread pool")?;
        self.pool = Some(pool);
        Ok(self)
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    pub fn prf(&self) -> PrfExpander {
        self.prf
    }

    /// Names of the layers that are currently available, in priority order
    pub fn available_layers(&self) -> Vec<&'static str> {
        self.layers
            .iter()
            .filter(|s| s.layer.is_available())
            .map(|s| s.layer.name())
            .collect()
    }

    /// Retrieve ranked evidence for a claim
    ///
    /// Never fails for missing data: an empty claim, empty corpus or a
    /// chain where every layer is down all yield an empty result.
    pub fn retrieve(&self, claim: &str, options: &RetrievalOptions) -> RetrievalResult {
        assert!(options.k > 0, "retrieve requires k > 0");
        let start = Instant::now();

        let tokens = self.normalizer.normalize(claim);
        if tokens.is_empty() {
            tracing::warn!("claim has no searchable terms");
        }

        let (mut hits, mut served) = self.search_chain(&tokens, options.k, options.model);

        let mut expanded_query = None;
        if options.use_prf && self.prf.applies_to(hits.len()) {
            let feedback: Vec<Vec<String>> = hits
                .iter()
                .take(self.prf.top_docs)
                .filter_map(|hit| self.lookup(&hit.doc_id, served))
                .map(|text| self.normalizer.normalize(&text))
                .collect();

            let extra = self.prf.expansion_terms(&tokens, &feedback);
            if !extra.is_empty() {
                let expanded: Vec<String> = tokens.iter().cloned().chain(extra).collect();
                tracing::debug!(expanded = %expanded.join(" "), "prf expansion");
                let (rehits, reserved) = self.search_chain(&expanded, options.k, options.model);
                hits = rehits;
                served = reserved;
                expanded_query = Some(expanded.join(" "));
            }
        }

        let model_used = options.model.as_str();
        let evidences: Vec<Evidence> = hits
            .into_iter()
            .enumerate()
            .map(|(i, hit)| {
                let text = self
                    .lookup(&hit.doc_id, served)
                    .unwrap_or_else(|| format!("[Document {} text not available]", hit.doc_id));
                Evidence {
                    source: source_tag(&hit.doc_id).to_string(),
                    doc_id: hit.doc_id,
                    text,
                    score: hit.score,
                    rank: i + 1,
                    retrieval_model: model_used.to_string(),
                }
            })
            .collect();

        let elapsed = start.elapsed();
        self.record(elapsed, served);

        let served_by = served
            .map(|i| self.layers[i].layer.name())
            .unwrap_or(NO_LAYER);
        tracing::debug!(
            served_by,
            hits = evidences.len(),
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            "retrieve"
        );

        RetrievalResult::new(
            claim,
            evidences,
            elapsed,
            model_used,
            expanded_query,
            served_by,
        )
    }

    /// Retrieve for many claims, results in input order
    ///
    /// Runs on the dedicated pool when `with_workers` was used, otherwise
    /// on rayon's global pool.
    pub fn batch_retrieve(&self, claims: &[String], options: &RetrievalOptions) -> Vec<RetrievalResult> {
        let run = || {
            claims
                .par_iter()
                .map(|claim| self.retrieve(claim, options))
                .collect::<Vec<_>>()
        };
        match &self.pool {
            Some(pool) => pool.install(run),
            None => run(),
        }
    }

    pub fn stats(&self) -> RetrieverStats {
        let queries = self.queries.load(Ordering::Relaxed);
        let total = Duration::from_micros(self.total_micros.load(Ordering::Relaxed));
        let avg = average_duration(total, queries);

        RetrieverStats {
            queries_processed: queries,
            total_search_time: total,
            avg_search_time: avg,
            corpus_size: self
                .layers
                .iter()
                .find(|s| s.layer.is_available())
                .map(|s| s.layer.doc_count())
                .unwrap_or(0),
            has_external_index: self
                .layers
                .iter()
                .any(|s| !s.layer.is_fallback() && s.layer.is_available()),
            last_served_by: self.last_served.lock().map(str::to_string),
            served: self
                .layers
                .iter()
                .map(|s| (s.layer.name().to_string(), s.served.load(Ordering::Relaxed)))
                .collect(),
        }
    }

    /// Walk the chain; returns hits and the index of the serving layer
    fn search_chain(
        &self,
        tokens: &[String],
        k: usize,
        model: RetrievalModel,
    ) -> (Vec<ScoredDoc>, Option<usize>) {
        let mut skipped: Vec<&'static str> = Vec::new();

        for (i, slot) in self.layers.iter().enumerate() {
            let layer = &slot.layer;
            if !layer.is_available() || !layer.supports(model) {
                skipped.push(layer.name());
                continue;
            }
            match layer.search(tokens, k, model) {
                Ok(mut hits) => {
                    hits.truncate(k);
                    if !skipped.is_empty() && !self.degraded_warned.swap(true, Ordering::Relaxed) {
                        tracing::warn!(
                            skipped = ?skipped,
                            serving = layer.name(),
                            "preferred search layer unavailable, degraded mode"
                        );
                    }
                    return (hits, Some(i));
                }
                Err(e) => {
                    tracing::warn!(layer = layer.name(), error = %e, "search layer failed, falling back");
                    skipped.push(layer.name());
                }
            }
        }

        if !self.layers.is_empty() {
            tracing::warn!(skipped = ?skipped, "no search layer could serve the request");
        }
        (Vec::new(), None)
    }

    /// Text lookup: serving layer first, then the rest of the chain
    fn lookup(&self, doc_id: &str, served: Option<usize>) -> Option<String> {
        if let Some(i) = served {
            if let Some(text) = self.layers[i].layer.lookup(doc_id) {
                return Some(text);
            }
        }
        self.layers
            .iter()
            .enumerate()
            .filter(|(i, slot)| Some(*i) != served && slot.layer.is_available())
            .find_map(|(_, slot)| slot.layer.lookup(doc_id))
    }

    fn record(&self, elapsed: Duration, served: Option<usize>) {
        self.queries.fetch_add(1, Ordering::Relaxed);
        self.total_micros
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
        if let Some(i) = served {
            self.layers[i].served.fetch_add(1, Ordering::Relaxed);
        }
        *self.last_served.lock() = Some(served.map(|i| self.layers[i].layer.name()).unwrap_or(NO_LAYER));
    }
}

/// Mean of `total` over `count` events, computed in nanoseconds
fn average_duration(total: Duration, count: u64) -> Duration {
    match u128::from(count) {
        0 => Duration::ZERO,
        n => Duration::from_nanos((total.as_nanos() / n) as u64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::corpus::Document;
    use crate::retrieval::layer::LayerError;

    fn corpus() -> Corpus {
        Corpus::from_documents(vec![
            Document::new("AP1", "Climate change is driven by greenhouse gas emissions from human activity."),
            Document::new("AP2", "Greenhouse gas emissions rose sharply, scientists warn about climate."),
            Document::new("AP3", "Climate scientists link warming to greenhouse emissions."),
            Document::new("AP4", "The football season opened with a surprise win."),
            Document::new("WSJ5", "Warming oceans and melting ice sheets alarm climate researchers."),
        ])
    }

    fn retriever() -> EvidenceRetriever {
        EvidenceRetriever::in_memory(corpus(), Normalizer::default(), RankingCore::default())
    }

    /// Layer that is present but always errors
    struct BrokenLayer;

    impl SearchLayer for BrokenLayer {
        fn name(&self) -> &'static str {
            "broken"
        }
        fn is_available(&self) -> bool {
            true
        }
        fn supports(&self, _model: RetrievalModel) -> bool {
            true
        }
        fn search(&self, _: &[String], _: usize, _: RetrievalModel) -> Result<Vec<ScoredDoc>, LayerError> {
            Err(LayerError::Query("disk on fire".to_string()))
        }
        fn lookup(&self, _: &str) -> Option<String> {
            None
        }
        fn doc_count(&self) -> usize {
            0
        }
    }

    /// Layer returning a doc id whose text nobody has
    struct GhostLayer;

    impl SearchLayer for GhostLayer {
        fn name(&self) -> &'static str {
            "ghost"
        }
        fn is_available(&self) -> bool {
            true
        }
        fn supports(&self, _model: RetrievalModel) -> bool {
            true
        }
        fn search(&self, _: &[String], _: usize, _: RetrievalModel) -> Result<Vec<ScoredDoc>, LayerError> {
            Ok(vec![ScoredDoc {
                doc_id: "X9".to_string(),
                score: 1.5,
            }])
        }
        fn lookup(&self, _: &str) -> Option<String> {
            None
        }
        fn doc_count(&self) -> usize {
            1
        }
    }

    /// Local layer that ignores `k` and returns every document it has
    struct FloodLayer;

    impl SearchLayer for FloodLayer {
        fn name(&self) -> &'static str {
            "local"
        }
        fn is_available(&self) -> bool {
            true
        }
        fn supports(&self, _model: RetrievalModel) -> bool {
            true
        }
        fn search(&self, _: &[String], _: usize, _: RetrievalModel) -> Result<Vec<ScoredDoc>, LayerError> {
            Ok((1..=6)
                .map(|i| ScoredDoc {
                    doc_id: format!("AP{}", i),
                    score: 10.0 - i as f64,
                })
                .collect())
        }
        fn lookup(&self, _: &str) -> Option<String> {
            None
        }
        fn doc_count(&self) -> usize {
            6
        }
        fn is_fallback(&self) -> bool {
            true
        }
    }

    #[test]
    fn test_layer_hits_cut_to_k() {
        let r = EvidenceRetriever::new(Normalizer::default()).with_layer(Box::new(FloodLayer));
        let opts = RetrievalOptions {
            k: 2,
            use_prf: false,
            ..Default::default()
        };
        let result = r.retrieve("climate", &opts);
        assert_eq!(result.total_retrieved, 2);
        let ids: Vec<&str> = result.evidences.iter().map(|e| e.doc_id.as_str()).collect();
        assert_eq!(ids, vec!["AP1", "AP2"]);
    }

    #[test]
    fn test_external_index_ignores_fallback_layers() {
        let r = EvidenceRetriever::new(Normalizer::default()).with_layer(Box::new(FloodLayer));
        assert!(!r.stats().has_external_index);

        let r = EvidenceRetriever::new(Normalizer::default()).with_layer(Box::new(GhostLayer));
        assert!(r.stats().has_external_index);
    }

    #[test]
    fn test_average_duration_beyond_u32_queries() {
        let count = u64::from(u32::MAX) + 1;
        let total = Duration::from_nanos(3 * count);
        assert_eq!(average_duration(total, count), Duration::from_nanos(3));
        assert_eq!(average_duration(Duration::from_secs(1), 0), Duration::ZERO);
        assert_eq!(average_duration(Duration::from_millis(9), 3), Duration::from_millis(3));
    }

    #[test]
    fn test_retrieve_ranks_contiguous() {
        let r = retriever();
        let opts = RetrievalOptions {
            k: 3,
            use_prf: false,
            ..Default::default()
        };
        let result = r.retrieve("greenhouse emissions and climate", &opts);
        assert_eq!(result.total_retrieved, result.evidences.len());
        assert!(result.total_retrieved <= 3);
        for (i, ev) in result.evidences.iter().enumerate() {
            assert_eq!(ev.rank, i + 1);
            assert_eq!(ev.source, "TREC-AP88-90");
            assert_eq!(ev.retrieval_model, "bm25");
        }
        assert_eq!(result.served_by, "memory");
        assert!(result.expanded_query.is_none());
    }

    #[test]
    fn test_prf_expands_once() {
        let r = retriever();
        let result = r.retrieve("greenhouse climate", &RetrievalOptions::default());
        let expanded = result.expanded_query.expect("three hits should trigger feedback");
        assert!(expanded.starts_with("greenhous climat"));
        assert!(expanded.split(' ').count() > 2);
    }

    #[test]
    fn test_prf_skipped_below_threshold() {
        let r = retriever();
        let result = r.retrieve("football", &RetrievalOptions::default());
        assert_eq!(result.total_retrieved, 1);
        assert!(result.expanded_query.is_none());
    }

    #[test]
    fn test_empty_claim_gives_empty_result() {
        let r = retriever();
        let result = r.retrieve("   ", &RetrievalOptions::default());
        assert!(result.is_empty());
        assert_eq!(result.total_retrieved, 0);
    }

    #[test]
    fn test_fallback_after_layer_error() {
        let r = EvidenceRetriever::new(Normalizer::default())
            .with_layer(Box::new(BrokenLayer))
            .with_layer(Box::new(MemoryLayer::new(
                corpus(),
                &Normalizer::default(),
                RankingCore::default(),
            )));
        let result = r.retrieve("climate", &RetrievalOptions::default());
        assert_eq!(result.served_by, "memory");
        assert!(!result.is_empty());

        let stats = r.stats();
        assert_eq!(stats.served, vec![("broken".to_string(), 0), ("memory".to_string(), 1)]);
        assert!(stats.has_external_index);
    }

    #[test]
    fn test_missing_text_placeholder() {
        let r = EvidenceRetriever::new(Normalizer::default()).with_layer(Box::new(GhostLayer));
        let result = r.retrieve("anything", &RetrievalOptions::default());
        assert_eq!(result.evidences[0].text, "[Document X9 text not available]");
        assert_eq!(result.evidences[0].source, "unknown");
    }

    #[test]
    fn test_no_layers_is_empty_not_error() {
        let r = EvidenceRetriever::new(Normalizer::default());
        let result = r.retrieve("climate", &RetrievalOptions::default());
        assert!(result.is_empty());
        assert_eq!(result.served_by, NO_LAYER);
    }

    #[test]
    fn test_batch_preserves_order_and_counts() {
        let r = retriever().with_workers(2).unwrap();
        let claims: Vec<String> = vec!["climate".into(), "football".into(), "ocean ice".into()];
        let opts = RetrievalOptions {
            use_prf: false,
            ..Default::default()
        };
        let results = r.batch_retrieve(&claims, &opts);
        assert_eq!(results.len(), 3);
        for (claim, result) in claims.iter().zip(&results) {
            assert_eq!(&result.query, claim);
        }
        assert_eq!(results[1].evidences[0].doc_id, "AP4");

        let stats = r.stats();
        assert_eq!(stats.queries_processed, 3);
        assert_eq!(stats.corpus_size, 5);
        assert!(!stats.has_external_index);
        assert_eq!(stats.last_served_by.as_deref(), Some("memory"));
    }

    #[test]
    fn test_display_text_truncates() {
        let ev = Evidence {
            doc_id: "d".into(),
            text: "abcdef".into(),
            score: 1.0,
            rank: 1,
            source: "unknown".into(),
            retrieval_model: "bm25".into(),
        };
        assert_eq!(ev.display_text(3), "abc...");
        assert_eq!(ev.display_text(10), "abcdef");
    }

    #[test]
    #[should_panic(expected = "contiguous")]
    fn test_rank_gap_is_contract_violation() {
        let ev = Evidence {
            doc_id: "d".into(),
            text: String::new(),
            score: 1.0,
            rank: 2,
            source: "unknown".into(),
            retrieval_model: "bm25".into(),
        };
        RetrievalResult::new("q", vec![ev], Duration::ZERO, "bm25", None, "memory");
    }
}
