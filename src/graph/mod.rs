//! Graph memory - prior credibility reports as retrieval context
//!
//! Public interface:
//! - `ContextScorer` / `ContextScore` / `GraphContext`
//! - `KnowledgeGraph` trait with `MemoryGraph` and `SparqlEndpoint`
//! - `ReportQuery` structured queries (escaping happens at render time)

mod context;
mod query;
mod store;

use thiserror::Error;

pub use context::{combine, ContextParams, ContextScore, ContextScorer, GraphContext, SimilarClaim, SourceHistory};
pub use query::{escape_literal, local_name, ReportFilter, ReportQuery, CRED_NAMESPACE};
pub use store::{parse_timestamp, KnowledgeGraph, MemoryGraph, ReportRow, SparqlEndpoint};

/// Knowledge-graph collaborator failure
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("graph transport error: {0}")]
    Transport(String),

    #[error("graph endpoint returned HTTP {0}: {1}")]
    Status(u16, String),

    #[error("graph response could not be decoded: {0}")]
    Decode(String),

    #[error("graph query timed out")]
    Timeout,
}
