//! Retrieval module - evidence retrieval over a layered search chain
//!
//! Public interface:
//! - `EvidenceRetriever` for single and batch claim retrieval
//! - `RetrievalOptions` / `RetrievalResult` / `Evidence`
//! - `RankingCore` + `RetrievalModel` for direct BM25/QLD scoring
//! - `PrfExpander` for pseudo-relevance feedback
//! - `SearchLayer` trait with `MemoryLayer` and `FtsIndexLayer`
//! - `Corpus` / `Document` / `TokenizedCorpus`

mod corpus;
mod engine;
mod layer;
pub mod layers;
mod prf;
mod ranking;

pub use corpus::{Corpus, Document, TokenizedCorpus};
pub use engine::{
    source_tag, Evidence, EvidenceRetriever, RetrievalOptions, RetrievalResult, RetrieverStats,
    NO_LAYER,
};
pub use layer::{LayerError, SearchLayer};
pub use layers::{FtsIndexLayer, MemoryLayer};
pub use prf::PrfExpander;
pub use ranking::{compare_scored, top_k, Bm25Params, QldParams, RankingCore, RetrievalModel, ScoredDoc};
