//! Credibility fusion: present signals -> final score, label, audit trace
//!
//! Each contributing signal adds `weight * deviation` where deviation is
//! `(value - 0.5)` signed by the factor's polarity. Only contributing
//! signals add their weight to the normalizer, so missing data never
//! drags the score toward the midpoint.

use serde::{Deserialize, Serialize};

use super::signals::{Factor, Polarity, SignalSet};

/// Base weight per factor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionWeights {
    pub source_reputation: f64,
    pub domain_age: f64,
    pub certainty: f64,
    pub doubt: f64,
    pub sensationalism: f64,
    pub negative_sentiment: f64,
    pub bias: f64,
    pub coherence: f64,
    pub entity_presence: f64,
    pub fact_check: f64,
    pub graph_context: f64,
    pub retrieval_quality: f64,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            source_reputation: 0.22,
            domain_age: 0.08,
            certainty: 0.10,
            doubt: 0.15,
            sensationalism: 0.10,
            negative_sentiment: 0.13,
            bias: 0.15,
            coherence: 0.12,
            entity_presence: 0.13,
            fact_check: 0.17,
            graph_context: 0.15,
            retrieval_quality: 0.10,
        }
    }
}

impl FusionWeights {
    pub fn get(&self, factor: Factor) -> f64 {
        match factor {
            Factor::SourceReputation => self.source_reputation,
            Factor::DomainAge => self.domain_age,
            Factor::Certainty => self.certainty,
            Factor::Doubt => self.doubt,
            Factor::Sensationalism => self.sensationalism,
            Factor::NegativeSentiment => self.negative_sentiment,
            Factor::Bias => self.bias,
            Factor::Coherence => self.coherence,
            Factor::EntityPresence => self.entity_presence,
            Factor::FactCheck => self.fact_check,
            Factor::GraphContext => self.graph_context,
            Factor::RetrievalQuality => self.retrieval_quality,
        }
    }
}

/// Lower bounds (exclusive) of each label above Low
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelThresholds {
    pub high: f64,
    pub medium_high: f64,
    pub medium: f64,
    pub low_medium: f64,
}

impl Default for LabelThresholds {
    fn default() -> Self {
        Self {
            high: 0.75,
            medium_high: 0.55,
            medium: 0.45,
            low_medium: 0.25,
        }
    }
}

/// Ordinal credibility verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CredibilityLabel {
    Low,
    LowMedium,
    Medium,
    MediumHigh,
    High,
}

impl CredibilityLabel {
    pub fn from_score(score: f64, thresholds: &LabelThresholds) -> Self {
        if score > thresholds.high {
            CredibilityLabel::High
        } else if score > thresholds.medium_high {
            CredibilityLabel::MediumHigh
        } else if score > thresholds.medium {
            CredibilityLabel::Medium
        } else if score > thresholds.low_medium {
            CredibilityLabel::LowMedium
        } else {
            CredibilityLabel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CredibilityLabel::High => "High",
            CredibilityLabel::MediumHigh => "Medium-High",
            CredibilityLabel::Medium => "Medium",
            CredibilityLabel::LowMedium => "Low-Medium",
            CredibilityLabel::Low => "Low",
        }
    }
}

impl std::fmt::Display for CredibilityLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audit record for one contributing signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalContribution {
    pub factor_name: String,
    pub raw_value: f64,
    pub weight: f64,
    pub signed_adjustment: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionResult {
    pub final_score: f64,
    pub label: CredibilityLabel,
    pub contributions: Vec<SignalContribution>,
    pub weight_sum: f64,
}

/// Fusion engine with fixed weights and thresholds
#[derive(Debug, Clone, Default)]
pub struct FusionEngine {
    weights: FusionWeights,
    thresholds: LabelThresholds,
}

impl FusionEngine {
    pub fn new(weights: FusionWeights, thresholds: LabelThresholds) -> Self {
        Self {
            weights,
            thresholds,
        }
    }

    pub fn weights(&self) -> &FusionWeights {
        &self.weights
    }

    pub fn label(&self, score: f64) -> CredibilityLabel {
        CredibilityLabel::from_score(score, &self.thresholds)
    }

    /// Fuse the present signals (deterministic, pure)
    pub fn fuse(&self, signals: &SignalSet) -> FusionResult {
        let mut adjustment_sum = 0.0;
        let mut weight_sum = 0.0;
        let mut contributions = Vec::new();

        for (factor, signal) in signals.iter() {
            let weight = signal.weight.unwrap_or_else(|| self.weights.get(factor));
            if weight <= 0.0 || !factor.policy().fires(signal.value) {
                continue;
            }

            let deviation = match factor.polarity() {
                Polarity::Supports => signal.value - 0.5,
                Polarity::Undermines => 0.5 - signal.value,
            };
            let adjustment = weight * deviation;

            adjustment_sum += adjustment;
            weight_sum += weight;
            contributions.push(SignalContribution {
                factor_name: factor.as_str().to_string(),
                raw_value: signal.value,
                weight,
                signed_adjustment: adjustment,
            });
        }

        let final_score = if weight_sum > 0.0 {
            (0.5 + adjustment_sum / weight_sum).clamp(0.0, 1.0)
        } else {
            0.5
        };

        FusionResult {
            final_score,
            label: self.label(final_score),
            contributions,
            weight_sum,
        }
    }
}
