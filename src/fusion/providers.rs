//! External signal providers (NLP models, fact-check services)
//!
//! Providers are synchronous collaborators. `ProviderSet` calls each one
//! under a deadline; a provider that times out, fails, or has nothing to
//! say leaves its slot empty rather than writing a zero.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::signals::{Factor, SignalSet};
use crate::deadline::{run_with_timeout, DeadlineError};

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider timed out after {0:?}")]
    Timeout(Duration),

    #[error("provider failed: {0}")]
    Failed(String),
}

impl From<DeadlineError> for ProviderError {
    fn from(e: DeadlineError) -> Self {
        match e {
            DeadlineError::Elapsed(d) => ProviderError::Timeout(d),
            other => ProviderError::Failed(other.to_string()),
        }
    }
}

/// A provider's answer: value in [0,1] plus its own label
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderSignal {
    pub value: f64,
    pub label: String,
}

impl ProviderSignal {
    pub fn new(value: f64, label: impl Into<String>) -> Self {
        Self {
            value,
            label: label.into(),
        }
    }

    /// Negativity from a sentiment classifier's (label, confidence)
    ///
    /// NEGATIVE at confidence c is c; POSITIVE at c is 1 - c; anything
    /// else is neutral.
    pub fn from_sentiment(label: &str, confidence: f64) -> Self {
        let value = match label.to_ascii_uppercase().as_str() {
            "NEGATIVE" => confidence,
            "POSITIVE" => 1.0 - confidence,
            _ => 0.5,
        };
        Self::new(value.clamp(0.0, 1.0), label)
    }
}

/// One external signal source
pub trait SignalProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Fusion slot this provider fills
    fn factor(&self) -> Factor;

    /// Evaluate claim text; `Ok(None)` means "no opinion"
    fn evaluate(&self, text: &str) -> Result<Option<ProviderSignal>, ProviderError>;
}

/// Provider backed by a closure (adapters, tests, precomputed scores)
pub struct FnProvider<F> {
    name: String,
    factor: Factor,
    f: F,
}

impl<F> FnProvider<F>
where
    F: Fn(&str) -> Result<Option<ProviderSignal>, ProviderError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, factor: Factor, f: F) -> Self {
        Self {
            name: name.into(),
            factor,
            f,
        }
    }
}

impl<F> SignalProvider for FnProvider<F>
where
    F: Fn(&str) -> Result<Option<ProviderSignal>, ProviderError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn factor(&self) -> Factor {
        self.factor
    }

    fn evaluate(&self, text: &str) -> Result<Option<ProviderSignal>, ProviderError> {
        (self.f)(text)
    }
}

/// What happened when a provider was asked
#[derive(Debug, Clone, Serialize)]
pub struct ProviderOutcome {
    pub provider: String,
    pub factor: Factor,
    pub signal: Option<ProviderSignal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Providers called in registration order, each under the same deadline
pub struct ProviderSet {
    providers: Vec<Arc<dyn SignalProvider>>,
    timeout: Duration,
}

impl ProviderSet {
    pub fn new(timeout: Duration) -> Self {
        Self {
            providers: Vec::new(),
            timeout,
        }
    }

    pub fn with(mut self, provider: Arc<dyn SignalProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Ask every provider and write the answers into `signals`
    pub fn collect(&self, text: &str, signals: &mut SignalSet) -> Vec<ProviderOutcome> {
        self.providers
            .iter()
            .map(|provider| {
                let outcome = self.call(provider, text);
                match (&outcome.signal, &outcome.error) {
                    (Some(sig), _) => {
                        signals.insert(outcome.factor, sig.value);
                    }
                    (None, Some(err)) => {
                        tracing::warn!(provider = %outcome.provider, error = %err, "signal provider unavailable");
                    }
                    (None, None) => {}
                }
                outcome
            })
            .collect()
    }

    fn call(&self, provider: &Arc<dyn SignalProvider>, text: &str) -> ProviderOutcome {
        let worker = Arc::clone(provider);
        let owned = text.to_string();
        let result = run_with_timeout("provider", self.timeout, move || worker.evaluate(&owned))
            .map_err(ProviderError::from)
            .and_then(|r| r);

        let (signal, error) = match result {
            Ok(Some(sig)) if sig.value.is_finite() => (Some(sig), None),
            Ok(Some(_)) => (None, Some("non-finite value".to_string())),
            Ok(None) => (None, None),
            Err(e) => (None, Some(e.to_string())),
        };

        ProviderOutcome {
            provider: provider.name().to_string(),
            factor: provider.factor(),
            signal,
            error,
        }
    }
}
