//! Claim assessment pipeline
//!
//! retrieve evidence -> quality self-report -> graph context -> rules ->
//! external providers -> fusion. Every stage degrades to "signal absent"
//! on missing data, so `assess` always returns a complete `Assessment`.

use serde::Serialize;
use std::sync::Arc;

use crate::fusion::heuristics::apply_rules;
use crate::fusion::{
    Factor, FusionEngine, FusionResult, LinguisticMarkers, ProviderOutcome, ProviderSet,
    SourceFacts, SignalSet,
};
use crate::graph::{ContextScorer, GraphContext};
use crate::metrics::retrieval_quality;
use crate::retrieval::{EvidenceRetriever, RetrievalOptions, RetrievalResult};
use crate::text::extract_keywords;

/// Keywords extracted from a claim for the pattern lookup
const MAX_KEYWORDS: usize = 10;

/// A claim to assess
#[derive(Debug, Clone, Default, Serialize)]
pub struct Claim {
    pub text: String,
    /// Source domain, e.g. "lemonde.fr"
    pub domain: Option<String>,
    pub source: SourceFacts,
}

impl Claim {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_source(mut self, source: SourceFacts) -> Self {
        self.source = source;
        self
    }
}

/// Everything the pipeline computed for one claim
#[derive(Debug, Clone, Serialize)]
pub struct Assessment {
    pub claim: Claim,
    pub retrieval: RetrievalResult,
    pub retrieval_quality: Option<f64>,
    pub graph: Option<GraphContext>,
    pub markers: LinguisticMarkers,
    pub providers: Vec<ProviderOutcome>,
    pub fusion: FusionResult,
}

/// Owns the collaborators; build once per process and share
pub struct Assessor {
    retriever: Arc<EvidenceRetriever>,
    context: Option<ContextScorer>,
    providers: ProviderSet,
    fusion: FusionEngine,
    options: RetrievalOptions,
}

impl Assessor {
    pub fn new(
        retriever: Arc<EvidenceRetriever>,
        fusion: FusionEngine,
        providers: ProviderSet,
        options: RetrievalOptions,
    ) -> Self {
        Self {
            retriever,
            context: None,
            providers,
            fusion,
            options,
        }
    }

    pub fn with_context(mut self, context: ContextScorer) -> Self {
        self.context = Some(context);
        self
    }

    pub fn assess(&self, claim: &Claim) -> Assessment {
        let retrieval = self.retriever.retrieve(&claim.text, &self.options);
        let quality = retrieval_quality(&claim.text, &retrieval.evidences, self.retriever.normalizer());

        let mut signals = SignalSet::new();
        if let Some(q) = quality {
            signals.insert(Factor::RetrievalQuality, q);
        }

        let graph = self.context.as_ref().map(|scorer| {
            let keywords = extract_keywords(&claim.text, scorer.params().min_keyword_len, MAX_KEYWORDS);
            scorer.context(claim.domain.as_deref(), &keywords)
        });
        if let Some(ctx) = &graph {
            if ctx.score.confidence > 0.0 {
                let base = self.fusion.weights().get(Factor::GraphContext);
                signals.insert_weighted(
                    Factor::GraphContext,
                    ctx.score.combined_score,
                    base * ctx.score.confidence,
                );
            }
        }

        let markers = LinguisticMarkers::scan(&claim.text);
        apply_rules(&markers, &claim.source, &mut signals);

        let providers = self.providers.collect(&claim.text, &mut signals);

        let fusion = self.fusion.fuse(&signals);
        tracing::debug!(
            score = fusion.final_score,
            label = fusion.label.as_str(),
            signals = fusion.contributions.len(),
            "claim assessed"
        );

        Assessment {
            claim: claim.clone(),
            retrieval,
            retrieval_quality: quality,
            graph,
            markers,
            providers,
            fusion,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fusion::{CredibilityLabel, Reputation};
    use crate::graph::{ContextParams, MemoryGraph};
    use crate::retrieval::{Corpus, Document, RankingCore};
    use crate::text::Normalizer;
    use std::time::Duration;

    fn assessor(graph: MemoryGraph) -> Assessor {
        let corpus = Corpus::from_documents(vec![
            Document::new("AP1", "Health officials say vaccines are safe and effective."),
            Document::new("AP2", "Vaccines do not cause autism, large studies show."),
        ]);
        let retriever = EvidenceRetriever::in_memory(corpus, Normalizer::default(), RankingCore::default());
        Assessor::new(
            Arc::new(retriever),
            FusionEngine::default(),
            ProviderSet::new(Duration::from_millis(200)),
            RetrievalOptions::default(),
        )
        .with_context(ContextScorer::new(Arc::new(graph), ContextParams::default()))
    }

    #[test]
    fn test_assess_without_history() {
        let a = assessor(MemoryGraph::new());
        let result = a.assess(&Claim::new("Vaccines cause autism").with_domain("unknown.net"));
        assert!(!result.retrieval.is_empty());
        assert!(result.retrieval_quality.is_some());
        let graph = result.graph.as_ref().unwrap();
        assert_eq!(graph.score.confidence, 0.0);
        assert!(result
            .fusion
            .contributions
            .iter()
            .all(|c| c.factor_name != "graph_context"));
    }

    #[test]
    fn test_assess_low_reputation_sensational_claim() {
        let a = assessor(MemoryGraph::new());
        let claim = Claim::new("SHOCKING secret conspiracy revealed: it's a hoax")
            .with_source(SourceFacts {
                reputation: Reputation::Low,
                domain_age_days: Some(30),
            });
        let result = a.assess(&claim);
        assert!(result.fusion.final_score < 0.25);
        assert_eq!(result.fusion.label, CredibilityLabel::Low);
        assert_eq!(result.markers.sensationalism, 4);
    }
}
