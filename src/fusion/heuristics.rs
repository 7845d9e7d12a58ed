//! Rule-based signals: linguistic markers and source facts

use serde::{Deserialize, Serialize};

use super::signals::{Factor, SignalSet};

const SENSATIONAL_WORDS: &[&str] = &["shocking", "revealed", "conspiracy", "amazing", "secret"];
const CERTAINTY_WORDS: &[&str] = &["verified", "authentic", "credible", "proven", "fact"];
const DOUBT_WORDS: &[&str] = &["hoax", "false", "fake", "unproven", "rumor"];

/// Marker counts above this saturate
const MARKER_SATURATION: usize = 3;

/// Domain younger than this is a negative signal
const YOUNG_DOMAIN_DAYS: i64 = 90;
/// Domain older than this (two years) is a positive signal
const ESTABLISHED_DOMAIN_DAYS: i64 = 730;

/// Number of distinct marker words of each kind present in the text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinguisticMarkers {
    pub sensationalism: usize,
    pub certainty: usize,
    pub doubt: usize,
}

impl LinguisticMarkers {
    /// Count markers; a word matches itself or its plural with a trailing "s"
    pub fn scan(text: &str) -> Self {
        let folded = text.to_lowercase();
        let tokens: Vec<&str> = folded
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .collect();

        let count = |words: &[&str]| -> usize {
            words
                .iter()
                .filter(|w| {
                    tokens
                        .iter()
                        .any(|t| t == *w || t.strip_suffix('s') == Some(**w))
                })
                .count()
        };

        Self {
            sensationalism: count(SENSATIONAL_WORDS),
            certainty: count(CERTAINTY_WORDS),
            doubt: count(DOUBT_WORDS),
        }
    }
}

/// Map a marker count to a signal intensity in (0.5, 1]; `None` for zero
pub fn marker_intensity(count: usize) -> Option<f64> {
    if count == 0 {
        return None;
    }
    let saturated = count.min(MARKER_SATURATION) as f64 / MARKER_SATURATION as f64;
    Some(0.5 + 0.5 * saturated)
}

/// Known reputation of a source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reputation {
    High,
    Medium,
    Low,
    #[default]
    Unknown,
}

impl Reputation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reputation::High => "High",
            Reputation::Medium => "Medium",
            Reputation::Low => "Low",
            Reputation::Unknown => "Unknown",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "high" => Some(Reputation::High),
            "medium" => Some(Reputation::Medium),
            "low" => Some(Reputation::Low),
            "unknown" => Some(Reputation::Unknown),
            _ => None,
        }
    }

    /// Signal value, `None` when unknown
    pub fn value(&self) -> Option<f64> {
        match self {
            Reputation::High => Some(0.9),
            Reputation::Medium => Some(0.5),
            Reputation::Low => Some(0.1),
            Reputation::Unknown => None,
        }
    }
}

/// Signal value for a domain age
pub fn domain_age_value(days: i64) -> f64 {
    if days > ESTABLISHED_DOMAIN_DAYS {
        0.9
    } else if days < YOUNG_DOMAIN_DAYS {
        0.1
    } else {
        0.5
    }
}

/// What is known about the claim's source (from lookups outside this crate)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceFacts {
    #[serde(default)]
    pub reputation: Reputation,
    #[serde(default)]
    pub domain_age_days: Option<i64>,
}

/// Write rule-based signals into `signals`
///
/// Certainty only counts when no doubt markers are present.
pub fn apply_rules(markers: &LinguisticMarkers, source: &SourceFacts, signals: &mut SignalSet) {
    if let Some(v) = source.reputation.value() {
        signals.insert(Factor::SourceReputation, v);
    }
    if let Some(days) = source.domain_age_days {
        signals.insert(Factor::DomainAge, domain_age_value(days));
    }

    if let Some(v) = marker_intensity(markers.sensationalism) {
        signals.insert(Factor::Sensationalism, v);
    }
    if let Some(v) = marker_intensity(markers.doubt) {
        signals.insert(Factor::Doubt, v);
    } else if let Some(v) = marker_intensity(markers.certainty) {
        signals.insert(Factor::Certainty, v);
    }
}
