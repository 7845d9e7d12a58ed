//! Internal implementation for project module
//!
//! Handles .credence/config.toml and turns its sections into the
//! library's runtime types.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::bench::BenchSettings;
use crate::fusion::{FusionEngine, FusionWeights, LabelThresholds};
use crate::graph::{ContextParams, ContextScorer, SparqlEndpoint};
use crate::retrieval::{
    Bm25Params, Corpus, EvidenceRetriever, FtsIndexLayer, MemoryLayer, PrfExpander, QldParams,
    RankingCore, RetrievalModel, RetrievalOptions,
};
use crate::text::Normalizer;

// =============================================================================
// Config Types
// =============================================================================

/// Project configuration stored in .credence/config.toml
/// All sections are optional with defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub retrieval: RetrievalSection,
    #[serde(default)]
    pub prf: PrfSection,
    #[serde(default)]
    pub graph: GraphSection,
    #[serde(default)]
    pub fusion: FusionSection,
    #[serde(default)]
    pub bench: BenchSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalSection {
    /// Evidence documents returned per claim
    #[serde(default = "default_k")]
    pub default_k: usize,
    /// "bm25" or "qld"
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_bm25_k1")]
    pub bm25_k1: f64,
    #[serde(default = "default_bm25_b")]
    pub bm25_b: f64,
    #[serde(default = "default_qld_mu")]
    pub qld_mu: f64,
    #[serde(default = "default_true")]
    pub stemming: bool,
    /// SQLite FTS5 index (relative to project root); defaults to .credence/index.db
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_path: Option<PathBuf>,
    /// JSONL corpus for the in-memory fallback ranker
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corpus_path: Option<PathBuf>,
    /// Threads for batch retrieval
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Evidence characters shown in CLI output
    #[serde(default = "default_snippet_chars")]
    pub snippet_chars: usize,
}

fn default_k() -> usize {
    10
}
fn default_model() -> String {
    "bm25".to_string()
}
fn default_bm25_k1() -> f64 {
    0.9
}
fn default_bm25_b() -> f64 {
    0.4
}
fn default_qld_mu() -> f64 {
    1000.0
}
fn default_true() -> bool {
    true
}
fn default_workers() -> usize {
    4
}
fn default_snippet_chars() -> usize {
    500
}

impl Default for RetrievalSection {
    fn default() -> Self {
        Self {
            default_k: default_k(),
            model: default_model(),
            bm25_k1: default_bm25_k1(),
            bm25_b: default_bm25_b(),
            qld_mu: default_qld_mu(),
            stemming: true,
            index_path: None,
            corpus_path: None,
            workers: default_workers(),
            snippet_chars: default_snippet_chars(),
        }
    }
}

impl RetrievalSection {
    pub fn retrieval_model(&self) -> Result<RetrievalModel> {
        RetrievalModel::from_str(&self.model).with_context(|| {
            format!("Unknown retrieval model '{}' (expected bm25 or qld)", self.model)
        })
    }

    pub fn ranking_core(&self) -> RankingCore {
        RankingCore::new(
            Bm25Params {
                k1: self.bm25_k1,
                b: self.bm25_b,
            },
            QldParams { mu: self.qld_mu },
        )
    }

    pub fn normalizer(&self) -> Normalizer {
        Normalizer::new(self.stemming)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrfSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_top_docs")]
    pub top_docs: usize,
    #[serde(default = "default_expansion_terms")]
    pub expansion_terms: usize,
}

fn default_top_docs() -> usize {
    3
}
fn default_expansion_terms() -> usize {
    10
}

impl Default for PrfSection {
    fn default() -> Self {
        Self {
            enabled: true,
            top_docs: default_top_docs(),
            expansion_terms: default_expansion_terms(),
        }
    }
}

impl PrfSection {
    pub fn expander(&self) -> PrfExpander {
        PrfExpander::new(self.top_docs, self.expansion_terms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSection {
    /// SPARQL query endpoint; graph context is skipped when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default = "default_graph_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    #[serde(default = "default_pattern_limit")]
    pub pattern_limit: usize,
    #[serde(default = "default_history_weight")]
    pub history_weight: f64,
    #[serde(default = "default_pattern_weight")]
    pub pattern_weight: f64,
    #[serde(default = "default_history_saturation")]
    pub history_saturation: usize,
    #[serde(default = "default_pattern_saturation")]
    pub pattern_saturation: usize,
    #[serde(default = "default_history_only_factor")]
    pub history_only_factor: f64,
    #[serde(default = "default_pattern_only_factor")]
    pub pattern_only_factor: f64,
    #[serde(default = "default_min_keyword_len")]
    pub min_keyword_len: usize,
}

fn default_graph_timeout_ms() -> u64 {
    5000
}
fn default_history_limit() -> usize {
    10
}
fn default_pattern_limit() -> usize {
    3
}
fn default_history_weight() -> f64 {
    0.7
}
fn default_pattern_weight() -> f64 {
    0.3
}
fn default_history_saturation() -> usize {
    5
}
fn default_pattern_saturation() -> usize {
    3
}
fn default_history_only_factor() -> f64 {
    0.8
}
fn default_pattern_only_factor() -> f64 {
    0.5
}
fn default_min_keyword_len() -> usize {
    4
}

impl Default for GraphSection {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_ms: default_graph_timeout_ms(),
            history_limit: default_history_limit(),
            pattern_limit: default_pattern_limit(),
            history_weight: default_history_weight(),
            pattern_weight: default_pattern_weight(),
            history_saturation: default_history_saturation(),
            pattern_saturation: default_pattern_saturation(),
            history_only_factor: default_history_only_factor(),
            pattern_only_factor: default_pattern_only_factor(),
            min_keyword_len: default_min_keyword_len(),
        }
    }
}

impl GraphSection {
    pub fn context_params(&self) -> ContextParams {
        ContextParams {
            history_limit: self.history_limit,
            pattern_limit: self.pattern_limit,
            history_weight: self.history_weight,
            pattern_weight: self.pattern_weight,
            history_saturation: self.history_saturation,
            pattern_saturation: self.pattern_saturation,
            history_only_factor: self.history_only_factor,
            pattern_only_factor: self.pattern_only_factor,
            min_keyword_len: self.min_keyword_len,
            timeout: Duration::from_millis(self.timeout_ms),
            ..ContextParams::default()
        }
    }

    /// Context scorer over the configured SPARQL endpoint, if any
    pub fn context_scorer(&self) -> Result<Option<ContextScorer>> {
        let Some(url) = self.endpoint.as_deref() else {
            return Ok(None);
        };
        let endpoint = SparqlEndpoint::new(url, Duration::from_millis(self.timeout_ms))
            .with_context(|| format!("Failed to create SPARQL client for {}", url))?;
        Ok(Some(ContextScorer::new(
            Arc::new(endpoint),
            self.context_params(),
        )))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FusionSection {
    #[serde(default)]
    pub weights: FusionWeights,
    #[serde(default)]
    pub thresholds: LabelThresholds,
}

impl FusionSection {
    pub fn engine(&self) -> FusionEngine {
        FusionEngine::new(self.weights.clone(), self.thresholds.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchSection {
    /// Documents retrieved per topic
    #[serde(default = "default_bench_k")]
    pub k: usize,
    /// Fixed delay between topics
    #[serde(default)]
    pub pacing_ms: u64,
    /// First backoff after a degraded topic; doubles per consecutive failure
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Completed topics between checkpoint flushes
    #[serde(default = "default_checkpoint_every")]
    pub checkpoint_every: usize,
    #[serde(default = "default_run_tag")]
    pub run_tag: String,
    #[serde(default = "default_query_type")]
    pub query_type: String,
}

fn default_bench_k() -> usize {
    100
}
fn default_backoff_ms() -> u64 {
    500
}
fn default_max_backoff_ms() -> u64 {
    30_000
}
fn default_checkpoint_every() -> usize {
    10
}
fn default_run_tag() -> String {
    "credence".to_string()
}
fn default_query_type() -> String {
    "title".to_string()
}

impl Default for BenchSection {
    fn default() -> Self {
        Self {
            k: default_bench_k(),
            pacing_ms: 0,
            backoff_ms: default_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            checkpoint_every: default_checkpoint_every(),
            run_tag: default_run_tag(),
            query_type: default_query_type(),
        }
    }
}

impl BenchSection {
    pub fn settings(&self) -> BenchSettings {
        BenchSettings {
            k: self.k,
            pacing: Duration::from_millis(self.pacing_ms),
            backoff: Duration::from_millis(self.backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
            checkpoint_every: self.checkpoint_every,
            run_tag_prefix: self.run_tag.clone(),
            query_type: self.query_type.clone(),
        }
    }
}

impl ProjectConfig {
    /// Default retrieval options (CLI flags override these)
    pub fn retrieval_options(&self) -> Result<RetrievalOptions> {
        Ok(RetrievalOptions {
            k: self.retrieval.default_k,
            model: self.retrieval.retrieval_model()?,
            use_prf: self.prf.enabled,
        })
    }

    /// Build the retriever chain: FTS5 index first, in-memory corpus as fallback
    ///
    /// A missing index file is not an error; the layer reports itself
    /// unavailable and the chain falls through.
    pub fn build_retriever(&self, project_path: &Path) -> Result<EvidenceRetriever> {
        let normalizer = self.retrieval.normalizer();
        let index = index_path(project_path, self);

        let mut retriever = EvidenceRetriever::new(normalizer.clone())
            .with_prf(self.prf.expander())
            .with_layer(Box::new(FtsIndexLayer::open(index, &normalizer)));

        if let Some(corpus_path) = &self.retrieval.corpus_path {
            let corpus = Corpus::load_jsonl(&project_path.join(corpus_path))?;
            let layer = MemoryLayer::new(corpus, &normalizer, self.retrieval.ranking_core());
            retriever = retriever.with_layer(Box::new(layer));
        }

        retriever.with_workers(self.retrieval.workers)
    }
}

// =============================================================================
// Path Functions
// =============================================================================

/// Get the .credence directory for a project
pub fn credence_dir(project_path: &Path) -> PathBuf {
    project_path.join(".credence")
}

/// Get the config file path for a project
pub fn config_path(project_path: &Path) -> PathBuf {
    credence_dir(project_path).join("config.toml")
}

/// Resolved FTS5 index path
pub fn index_path(project_path: &Path, config: &ProjectConfig) -> PathBuf {
    match &config.retrieval.index_path {
        Some(p) => project_path.join(p),
        None => credence_dir(project_path).join("index.db"),
    }
}

// =============================================================================
// Config Load/Save
// =============================================================================

/// Load project config from .credence/config.toml
pub fn load(project_path: &Path) -> Result<ProjectConfig> {
    let path = config_path(project_path);

    if !path.exists() {
        return Ok(ProjectConfig::default());
    }

    let contents = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read project config: {}", path.display()))?;

    toml::from_str(&contents)
        .with_context(|| format!("Failed to parse project config: {}", path.display()))
}

/// Save project config to .credence/config.toml
pub fn save(project_path: &Path, config: &ProjectConfig) -> Result<()> {
    let path = config_path(project_path);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let contents = toml::to_string_pretty(config)?;
    fs::write(&path, contents)?;
    Ok(())
}
