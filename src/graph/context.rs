//! GraphRAG context scorer - prior reports turned into a weighted signal
//!
//! Two lookups feed the score: the history of the claim's source domain
//! and prior reports on claims sharing keywords. Each lookup runs under a
//! deadline; failures and timeouts count as "no data".

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::query::ReportQuery;
use super::store::{KnowledgeGraph, ReportRow};
use crate::deadline::run_with_timeout;

/// Characters of prior claim content kept in summaries
const EXCERPT_CHARS: usize = 100;

/// Tunable constants of the context score
#[derive(Debug, Clone, PartialEq)]
pub struct ContextParams {
    pub history_limit: usize,
    pub pattern_limit: usize,
    pub history_weight: f64,
    pub pattern_weight: f64,
    /// Reports needed for full history confidence
    pub history_saturation: usize,
    /// Similar claims needed for full pattern confidence
    pub pattern_saturation: usize,
    pub history_only_factor: f64,
    pub pattern_only_factor: f64,
    /// Confidence split when both signals are present
    pub history_confidence_share: f64,
    pub pattern_confidence_share: f64,
    pub min_keyword_len: usize,
    pub timeout: Duration,
}

impl Default for ContextParams {
    fn default() -> Self {
        Self {
            history_limit: 10,
            pattern_limit: 3,
            history_weight: 0.7,
            pattern_weight: 0.3,
            history_saturation: 5,
            pattern_saturation: 3,
            history_only_factor: 0.8,
            pattern_only_factor: 0.5,
            history_confidence_share: 0.6,
            pattern_confidence_share: 0.4,
            min_keyword_len: 4,
            timeout: Duration::from_secs(5),
        }
    }
}

/// Numeric context signal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContextScore {
    pub history_score: f64,
    pub pattern_score: f64,
    pub combined_score: f64,
    pub confidence: f64,
    pub has_history: bool,
    pub history_count: usize,
    pub similar_count: usize,
}

impl ContextScore {
    /// No supporting data: everything at the midpoint, zero confidence
    pub fn neutral() -> Self {
        Self {
            history_score: 0.5,
            pattern_score: 0.5,
            combined_score: 0.5,
            confidence: 0.0,
            has_history: false,
            history_count: 0,
            similar_count: 0,
        }
    }

    pub fn has_data(&self) -> bool {
        self.history_count > 0 || self.similar_count > 0
    }
}

fn mean(scores: &[f64]) -> Option<f64> {
    if scores.is_empty() {
        None
    } else {
        Some(scores.iter().sum::<f64>() / scores.len() as f64)
    }
}

fn saturating_ratio(count: usize, saturation: usize) -> f64 {
    if saturation == 0 {
        return if count > 0 { 1.0 } else { 0.0 };
    }
    (count as f64 / saturation as f64).min(1.0)
}

/// Combine history and pattern scores (pure)
pub fn combine(history_scores: &[f64], pattern_scores: &[f64], params: &ContextParams) -> ContextScore {
    let mut score = ContextScore::neutral();

    let history_mean = mean(history_scores);
    let pattern_mean = mean(pattern_scores);

    let history_conf = saturating_ratio(history_scores.len(), params.history_saturation);
    let pattern_conf = saturating_ratio(pattern_scores.len(), params.pattern_saturation);

    if let Some(h) = history_mean {
        score.history_score = h.clamp(0.0, 1.0);
        score.has_history = true;
        score.history_count = history_scores.len();
    }
    if let Some(p) = pattern_mean {
        score.pattern_score = p.clamp(0.0, 1.0);
        score.similar_count = pattern_scores.len();
    }

    match (history_mean.is_some(), pattern_mean.is_some()) {
        (true, true) => {
            score.combined_score = params.history_weight * score.history_score
                + params.pattern_weight * score.pattern_score;
            score.confidence = params.history_confidence_share * history_conf
                + params.pattern_confidence_share * pattern_conf;
        }
        (true, false) => {
            score.combined_score = score.history_score;
            score.confidence = history_conf * params.history_only_factor;
        }
        (false, true) => {
            score.combined_score = score.pattern_score;
            score.confidence = pattern_conf * params.pattern_only_factor;
        }
        (false, false) => {}
    }

    score.combined_score = score.combined_score.clamp(0.0, 1.0);
    score.confidence = score.confidence.clamp(0.0, 1.0);
    score
}

/// Summary of a source's prior evaluations
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceHistory {
    pub count: usize,
    pub mean_score: f64,
    pub last_verdict: String,
    pub last_date: String,
}

/// A prior report on a similar claim
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarClaim {
    pub report_uri: String,
    pub excerpt: String,
    pub verdict: String,
    pub score: f64,
}

/// Full graph context: numeric score plus what produced it
#[derive(Debug, Clone, Serialize)]
pub struct GraphContext {
    pub domain: Option<String>,
    pub history: Option<SourceHistory>,
    pub similar: Vec<SimilarClaim>,
    pub score: ContextScore,
}

impl GraphContext {
    /// URIs of matched similar-claim reports, for linking
    pub fn similar_uris(&self) -> Vec<&str> {
        self.similar.iter().map(|s| s.report_uri.as_str()).collect()
    }

    /// Human-readable context
    pub fn summary(&self) -> String {
        let mut parts: Vec<String> = Vec::new();

        match (&self.domain, &self.history) {
            (Some(domain), Some(h)) => parts.push(format!(
                "Graph memory for '{}':\n- Analyzed {} times previously.\n- Average credibility score: {:.2} / 1.0\n- Most recent verdict ({}): {}.",
                domain, h.count, h.mean_score, h.last_date, h.last_verdict
            )),
            (Some(domain), None) => parts.push(format!(
                "The graph contains no previous evaluations for {}.",
                domain
            )),
            _ => {}
        }

        if !self.similar.is_empty() {
            let mut lines = vec![format!(
                "Found {} similar claims in history:",
                self.similar.len()
            )];
            for s in &self.similar {
                lines.push(format!("- \"{}\" ({}, score: {:.2})", s.excerpt, s.verdict, s.score));
            }
            parts.push(lines.join("\n"));
        }

        if parts.is_empty() {
            "No prior knowledge found in the graph.".to_string()
        } else {
            parts.join("\n\n")
        }
    }
}

fn excerpt(content: &str) -> String {
    let mut out: String = content.chars().take(EXCERPT_CHARS).collect();
    out.push_str("...");
    out
}

/// Scorer over an injected knowledge graph
pub struct ContextScorer {
    graph: Arc<dyn KnowledgeGraph>,
    params: ContextParams,
}

impl ContextScorer {
    pub fn new(graph: Arc<dyn KnowledgeGraph>, params: ContextParams) -> Self {
        Self { graph, params }
    }

    pub fn params(&self) -> &ContextParams {
        &self.params
    }

    /// Numeric context score for a source domain and claim keywords
    pub fn compute_context_score(&self, domain: Option<&str>, keywords: &[String]) -> ContextScore {
        self.context(domain, keywords).score
    }

    /// Score plus textual context, from one pair of lookups
    pub fn context(&self, domain: Option<&str>, keywords: &[String]) -> GraphContext {
        let history_rows = domain
            .and_then(|d| ReportQuery::source_history(d, self.params.history_limit))
            .map(|q| self.fetch(q))
            .unwrap_or_default();

        let similar_rows = ReportQuery::similar_claims(
            keywords,
            self.params.min_keyword_len,
            self.params.pattern_limit,
        )
        .map(|q| self.fetch(q))
        .unwrap_or_default();

        let history_scores: Vec<f64> = history_rows.iter().map(|r| r.score).collect();
        let pattern_scores: Vec<f64> = similar_rows.iter().map(|r| r.score).collect();
        let score = combine(&history_scores, &pattern_scores, &self.params);

        let history = history_rows.first().map(|latest| SourceHistory {
            count: history_rows.len(),
            mean_score: score.history_score,
            last_verdict: latest.level.clone(),
            last_date: latest.completed_at.format("%Y-%m-%d").to_string(),
        });

        let similar = similar_rows
            .iter()
            .map(|r| SimilarClaim {
                report_uri: r.report_uri.clone(),
                excerpt: excerpt(r.content.as_deref().unwrap_or_default()),
                verdict: r.level.clone(),
                score: r.score,
            })
            .collect();

        GraphContext {
            domain: domain.map(str::trim).filter(|d| !d.is_empty()).map(String::from),
            history,
            similar,
            score,
        }
    }

    /// Run one query under the deadline; any failure is "no rows"
    fn fetch(&self, query: ReportQuery) -> Vec<ReportRow> {
        let graph = Arc::clone(&self.graph);
        let graph_name = graph.name();
        let limit = query.limit;

        match run_with_timeout("graph", self.params.timeout, move || graph.reports(&query)) {
            Ok(Ok(mut rows)) => {
                rows.truncate(limit);
                rows
            }
            Ok(Err(e)) => {
                tracing::warn!(graph = graph_name, error = %e, "graph query failed, treating as no data");
                Vec::new()
            }
            Err(e) => {
                tracing::warn!(graph = graph_name, error = %e, "graph query abandoned, treating as no data");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::store::MemoryGraph;
    use crate::graph::GraphError;
    use chrono::{TimeZone, Utc};

    fn report(uri: &str, url: &str, content: &str, score: f64, day: u32, level: &str) -> ReportRow {
        ReportRow {
            report_uri: uri.to_string(),
            subject_url: Some(url.to_string()),
            content: Some(content.to_string()),
            score,
            level: level.to_string(),
            completed_at: Utc.with_ymd_and_hms(2025, 3, day, 8, 0, 0).unwrap(),
        }
    }

    struct FailingGraph;

    impl KnowledgeGraph for FailingGraph {
        fn name(&self) -> &'static str {
            "failing"
        }
        fn reports(&self, _query: &ReportQuery) -> Result<Vec<ReportRow>, GraphError> {
            Err(GraphError::Transport("connection refused".to_string()))
        }
    }

    struct SlowGraph;

    impl KnowledgeGraph for SlowGraph {
        fn name(&self) -> &'static str {
            "slow"
        }
        fn reports(&self, _query: &ReportQuery) -> Result<Vec<ReportRow>, GraphError> {
            std::thread::sleep(Duration::from_millis(300));
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_combine_neither() {
        let s = combine(&[], &[], &ContextParams::default());
        assert_eq!(s, ContextScore::neutral());
    }

    #[test]
    fn test_combine_history_only() {
        let s = combine(&[0.8, 0.6], &[], &ContextParams::default());
        assert!((s.combined_score - 0.7).abs() < 1e-12);
        // min(1, 2/5) * 0.8
        assert!((s.confidence - 0.32).abs() < 1e-12);
        assert!(s.has_history);
        assert_eq!(s.history_count, 2);
    }

    #[test]
    fn test_combine_pattern_only() {
        let s = combine(&[], &[0.2, 0.4, 0.3, 0.1], &ContextParams::default());
        assert!((s.combined_score - 0.25).abs() < 1e-12);
        // saturated at 3, then * 0.5
        assert!((s.confidence - 0.5).abs() < 1e-12);
        assert!(!s.has_history);
    }

    #[test]
    fn test_combine_both() {
        let s = combine(&[0.9; 5], &[0.3], &ContextParams::default());
        assert!((s.combined_score - (0.7 * 0.9 + 0.3 * 0.3)).abs() < 1e-12);
        assert!((s.confidence - (0.6 * 1.0 + 0.4 * (1.0 / 3.0))).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_domain_is_neutral() {
        let scorer = ContextScorer::new(Arc::new(MemoryGraph::new()), ContextParams::default());
        let s = scorer.compute_context_score(Some("never-seen.org"), &[]);
        assert_eq!(s.combined_score, 0.5);
        assert_eq!(s.confidence, 0.0);
    }

    #[test]
    fn test_graph_failure_is_neutral() {
        let scorer = ContextScorer::new(Arc::new(FailingGraph), ContextParams::default());
        let s = scorer.compute_context_score(Some("lemonde.fr"), &["vaccine".to_string()]);
        assert_eq!(s, ContextScore::neutral());
    }

    #[test]
    fn test_graph_timeout_is_neutral() {
        let params = ContextParams {
            timeout: Duration::from_millis(20),
            ..Default::default()
        };
        let scorer = ContextScorer::new(Arc::new(SlowGraph), params);
        let s = scorer.compute_context_score(Some("lemonde.fr"), &[]);
        assert_eq!(s, ContextScore::neutral());
    }

    #[test]
    fn test_context_summary() {
        let graph = MemoryGraph::with_reports(vec![
            report("r1", "https://lemonde.fr/a", "Climate report", 0.8, 1, "High"),
            report("r2", "https://lemonde.fr/b", "Budget story", 0.6, 4, "Medium"),
            report("r3", "https://blog.net/x", "Vaccines cause autism claims spread", 0.1, 2, "Low"),
        ]);
        let scorer = ContextScorer::new(Arc::new(graph), ContextParams::default());
        let ctx = scorer.context(Some("lemonde.fr"), &["vaccines".to_string(), "the".to_string()]);

        let history = ctx.history.as_ref().unwrap();
        assert_eq!(history.count, 2);
        assert_eq!(history.last_verdict, "Medium");
        assert_eq!(history.last_date, "2025-03-04");
        assert_eq!(ctx.similar_uris(), vec!["r3"]);
        assert!(ctx.similar[0].excerpt.ends_with("..."));

        let text = ctx.summary();
        assert!(text.contains("Analyzed 2 times previously."));
        assert!(text.contains("Average credibility score: 0.70 / 1.0"));
        assert!(text.contains("Found 1 similar claims in history:"));
        assert!(ctx.score.has_history);
    }

    #[test]
    fn test_summary_without_data() {
        let scorer = ContextScorer::new(Arc::new(MemoryGraph::new()), ContextParams::default());
        assert_eq!(scorer.context(None, &[]).summary(), "No prior knowledge found in the graph.");
        assert_eq!(
            scorer.context(Some("x.org"), &[]).summary(),
            "The graph contains no previous evaluations for x.org."
        );
    }
}
