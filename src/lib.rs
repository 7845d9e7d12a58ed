//! credence - evidence retrieval and credibility scoring for claims
//!
//! Public interface:
//! - `retrieval::EvidenceRetriever` - ranked evidence for a claim (BM25/QLD, PRF, layer fallback)
//! - `graph::ContextScorer` - prior-knowledge signal from a report graph
//! - `fusion::FusionEngine` - signals to a score and label
//! - `pipeline::Assessor` - the whole chain for one claim
//! - `metrics`, `bench` - IR evaluation and offline benchmarks

pub mod bench;
pub mod deadline;
pub mod fusion;
pub mod graph;
pub mod metrics;
pub mod pipeline;
pub mod project;
pub mod retrieval;
pub mod telemetry;
pub mod text;

// Re-export commonly used types
pub use fusion::{CredibilityLabel, FusionEngine, FusionResult};
pub use pipeline::{Assessment, Assessor, Claim};
pub use retrieval::{Evidence, EvidenceRetriever, RetrievalOptions, RetrievalResult};
