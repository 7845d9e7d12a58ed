//! Signal slots: the fixed set of credibility factors and their policies

use serde::{Deserialize, Serialize};

/// Every factor the fusion engine knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Factor {
    SourceReputation,
    DomainAge,
    Certainty,
    Doubt,
    Sensationalism,
    NegativeSentiment,
    Bias,
    Coherence,
    EntityPresence,
    FactCheck,
    GraphContext,
    RetrievalQuality,
}

/// Which direction a high value pushes credibility
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Supports,
    Undermines,
}

/// When a present signal is allowed to adjust the score
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Policy {
    /// Always contributes, proportional to its deviation from 0.5
    Continuous,
    /// Contributes only when the value is strictly below `below` or strictly above `above`
    Gated {
        below: Option<f64>,
        above: Option<f64>,
    },
}

impl Policy {
    pub fn fires(&self, value: f64) -> bool {
        match *self {
            Policy::Continuous => true,
            Policy::Gated { below, above } => {
                below.is_some_and(|b| value < b) || above.is_some_and(|a| value > a)
            }
        }
    }
}

impl Factor {
    pub const COUNT: usize = 12;

    /// Slot order; also the order of contribution records
    pub const ALL: [Factor; Factor::COUNT] = [
        Factor::SourceReputation,
        Factor::DomainAge,
        Factor::Certainty,
        Factor::Doubt,
        Factor::Sensationalism,
        Factor::NegativeSentiment,
        Factor::Bias,
        Factor::Coherence,
        Factor::EntityPresence,
        Factor::FactCheck,
        Factor::GraphContext,
        Factor::RetrievalQuality,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Factor::SourceReputation => "source_reputation",
            Factor::DomainAge => "domain_age",
            Factor::Certainty => "certainty",
            Factor::Doubt => "doubt",
            Factor::Sensationalism => "sensationalism",
            Factor::NegativeSentiment => "negative_sentiment",
            Factor::Bias => "bias",
            Factor::Coherence => "coherence",
            Factor::EntityPresence => "entity_presence",
            Factor::FactCheck => "fact_check",
            Factor::GraphContext => "graph_context",
            Factor::RetrievalQuality => "retrieval_quality",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        Factor::ALL.into_iter().find(|f| f.as_str() == s)
    }

    pub fn polarity(&self) -> Polarity {
        match self {
            Factor::Doubt
            | Factor::Sensationalism
            | Factor::NegativeSentiment
            | Factor::Bias => Polarity::Undermines,
            _ => Polarity::Supports,
        }
    }

    pub fn policy(&self) -> Policy {
        match self {
            Factor::SourceReputation | Factor::DomainAge => Policy::Gated {
                below: Some(0.25),
                above: Some(0.75),
            },
            Factor::NegativeSentiment => Policy::Gated {
                below: None,
                above: Some(0.85),
            },
            Factor::Bias => Policy::Gated {
                below: None,
                above: Some(0.5),
            },
            _ => Policy::Continuous,
        }
    }
}

impl std::fmt::Display for Factor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A present signal: value in [0,1], optional weight override
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

/// One optional slot per factor
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignalSet {
    slots: [Option<Signal>; Factor::COUNT],
}

impl SignalSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a signal at the configured base weight
    ///
    /// Non-finite values are ignored (the slot stays as it was); finite
    /// values are clamped to [0,1].
    pub fn insert(&mut self, factor: Factor, value: f64) -> &mut Self {
        self.put(factor, value, None)
    }

    /// Set a signal with an explicit weight (negative weights become 0)
    pub fn insert_weighted(&mut self, factor: Factor, value: f64, weight: f64) -> &mut Self {
        let weight = if weight.is_finite() { weight.max(0.0) } else { 0.0 };
        self.put(factor, value, Some(weight))
    }

    fn put(&mut self, factor: Factor, value: f64, weight: Option<f64>) -> &mut Self {
        if !value.is_finite() {
            tracing::warn!(factor = factor.as_str(), "non-finite signal value ignored");
            return self;
        }
        self.slots[factor.index()] = Some(Signal {
            value: value.clamp(0.0, 1.0),
            weight,
        });
        self
    }

    pub fn remove(&mut self, factor: Factor) -> Option<Signal> {
        self.slots[factor.index()].take()
    }

    pub fn get(&self, factor: Factor) -> Option<Signal> {
        self.slots[factor.index()]
    }

    pub fn contains(&self, factor: Factor) -> bool {
        self.slots[factor.index()].is_some()
    }

    /// Present signals in slot order
    pub fn iter(&self) -> impl Iterator<Item = (Factor, Signal)> + '_ {
        Factor::ALL
            .into_iter()
            .zip(self.slots.iter())
            .filter_map(|(f, s)| s.map(|s| (f, s)))
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
