//! Search layer trait: the corpus/index collaborator contract
//!
//! Layers are interchangeable ranking backends (external index, in-memory
//! fallback). The retrieval engine holds them in priority order and asks
//! each in turn until one is available and answers without error.

use thiserror::Error;

use super::ranking::{RetrievalModel, ScoredDoc};

/// Why a layer could not serve a request
#[derive(Debug, Error)]
pub enum LayerError {
    #[error("index unavailable: {0}")]
    Unavailable(String),

    #[error("model {0} not supported by this layer")]
    UnsupportedModel(RetrievalModel),

    #[error("index query failed: {0}")]
    Query(String),
}

impl From<rusqlite::Error> for LayerError {
    fn from(e: rusqlite::Error) -> Self {
        LayerError::Query(e.to_string())
    }
}

/// Search layer interface - every ranking backend implements this
pub trait SearchLayer: Send + Sync {
    /// Layer name recorded in results ("fts5", "memory", ...)
    fn name(&self) -> &'static str;

    /// Whether the backing index exists and can be queried
    fn is_available(&self) -> bool;

    /// Whether this layer can rank with `model`
    fn supports(&self, model: RetrievalModel) -> bool;

    /// Rank normalized query tokens, best first, at most `k` hits, no zero scores
    fn search(
        &self,
        query_tokens: &[String],
        k: usize,
        model: RetrievalModel,
    ) -> Result<Vec<ScoredDoc>, LayerError>;

    /// Raw document text for display
    fn lookup(&self, doc_id: &str) -> Option<String>;

    /// Number of searchable documents
    fn doc_count(&self) -> usize;

    /// In-process fallback rather than an external index
    fn is_fallback(&self) -> bool {
        false
    }
}
