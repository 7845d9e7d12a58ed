//! Credibility fusion - independent, partially available signals -> one verdict
//!
//! Public interface:
//! - `FusionEngine::fuse()` over a `SignalSet` of `Factor` slots
//! - `FusionResult` with `CredibilityLabel` and `SignalContribution` trace
//! - `heuristics` for rule-based signals, `providers` for external ones

mod engine;
pub mod heuristics;
pub mod providers;
mod signals;

pub use engine::{
    CredibilityLabel, FusionEngine, FusionResult, FusionWeights, LabelThresholds,
    SignalContribution,
};
pub use heuristics::{LinguisticMarkers, Reputation, SourceFacts};
pub use providers::{
    FnProvider, ProviderError, ProviderOutcome, ProviderSet, ProviderSignal, SignalProvider,
};
pub use signals::{Factor, Policy, Polarity, Signal, SignalSet};
