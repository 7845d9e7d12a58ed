//! Knowledge-graph collaborators: in-memory report store and SPARQL endpoint

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use parking_lot::RwLock;
use reqwest::blocking::Client as HttpClient;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use super::query::{local_name, ReportQuery};
use super::GraphError;

/// One prior credibility report as returned by a report query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    pub report_uri: String,
    #[serde(default)]
    pub subject_url: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    pub score: f64,
    /// Verdict label (local name of the credibility level)
    pub level: String,
    pub completed_at: DateTime<Utc>,
}

/// Read-only access to prior reports
pub trait KnowledgeGraph: Send + Sync {
    fn name(&self) -> &'static str;

    /// Rows matching `query`, newest first, at most `query.limit`
    fn reports(&self, query: &ReportQuery) -> Result<Vec<ReportRow>, GraphError>;
}

/// Report store held in memory (tests, offline runs, seeded history)
#[derive(Debug, Default)]
pub struct MemoryGraph {
    rows: RwLock<Vec<ReportRow>>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reports(rows: Vec<ReportRow>) -> Self {
        Self {
            rows: RwLock::new(rows),
        }
    }

    pub fn insert(&self, row: ReportRow) {
        self.rows.write().push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }
}

impl KnowledgeGraph for MemoryGraph {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn reports(&self, query: &ReportQuery) -> Result<Vec<ReportRow>, GraphError> {
        let mut matched: Vec<ReportRow> = self
            .rows
            .read()
            .iter()
            .filter(|r| query.matches(r.subject_url.as_deref(), r.content.as_deref()))
            .cloned()
            .collect();

        matched.sort_by(|a, b| {
            b.completed_at
                .cmp(&a.completed_at)
                .then_with(|| a.report_uri.cmp(&b.report_uri))
        });
        matched.truncate(query.limit);
        Ok(matched)
    }
}

/// SPARQL 1.1 protocol endpoint (POST form, JSON results)
pub struct SparqlEndpoint {
    url: String,
    http: HttpClient,
}

impl SparqlEndpoint {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, GraphError> {
        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GraphError::Transport(e.to_string()))?;
        Ok(Self {
            url: url.into(),
            http,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl KnowledgeGraph for SparqlEndpoint {
    fn name(&self) -> &'static str {
        "sparql"
    }

    fn reports(&self, query: &ReportQuery) -> Result<Vec<ReportRow>, GraphError> {
        let sparql = query.to_sparql();
        let response = self
            .http
            .post(&self.url)
            .header("Accept", "application/sparql-results+json")
            .form(&[("query", sparql.as_str())])
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    GraphError::Timeout
                } else {
                    GraphError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(GraphError::Status(status.as_u16(), body));
        }

        let results: SparqlResults = response
            .json()
            .map_err(|e| GraphError::Decode(e.to_string()))?;
        Ok(rows_from_results(results, query.limit))
    }
}

#[derive(Debug, Deserialize)]
struct SparqlResults {
    results: SparqlBindings,
}

#[derive(Debug, Deserialize)]
struct SparqlBindings {
    bindings: Vec<HashMap<String, SparqlTerm>>,
}

#[derive(Debug, Deserialize)]
struct SparqlTerm {
    value: String,
}

fn rows_from_results(results: SparqlResults, limit: usize) -> Vec<ReportRow> {
    let mut rows = Vec::new();
    for binding in results.results.bindings {
        match row_from_binding(&binding) {
            Some(row) => rows.push(row),
            None => tracing::warn!(?binding, "unusable report row skipped"),
        }
        if rows.len() >= limit {
            break;
        }
    }
    rows
}

fn row_from_binding(binding: &HashMap<String, SparqlTerm>) -> Option<ReportRow> {
    let get = |var: &str| binding.get(var).map(|t| t.value.clone());

    let score: f64 = get("score")?.trim().parse().ok()?;
    let completed_at = parse_timestamp(&get("timestamp")?)?;
    Some(ReportRow {
        report_uri: get("report")?,
        subject_url: get("url"),
        content: get("content"),
        score: score.clamp(0.0, 1.0),
        level: local_name(&get("level")?).to_string(),
        completed_at,
    })
}

/// xsd:dateTime (with or without offset) or xsd:date
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn row(uri: &str, url: &str, content: &str, score: f64, day: u32) -> ReportRow {
        ReportRow {
            report_uri: uri.to_string(),
            subject_url: Some(url.to_string()),
            content: Some(content.to_string()),
            score,
            level: "High".to_string(),
            completed_at: Utc.with_ymd_and_hms(2025, 1, day, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_memory_graph_orders_newest_first_and_limits() {
        let graph = MemoryGraph::with_reports(vec![
            row("r1", "https://lemonde.fr/a", "x", 0.8, 1),
            row("r2", "https://lemonde.fr/b", "y", 0.6, 3),
            row("r3", "https://other.com", "z", 0.1, 5),
            row("r4", "https://lemonde.fr/c", "w", 0.7, 2),
        ]);
        let q = ReportQuery::source_history("lemonde.fr", 2).unwrap();
        let rows = graph.reports(&q).unwrap();
        let uris: Vec<&str> = rows.iter().map(|r| r.report_uri.as_str()).collect();
        assert_eq!(uris, vec!["r2", "r4"]);
    }

    #[test]
    fn test_rows_from_sparql_json() {
        let json = r#"{
            "head": {"vars": ["report","url","content","score","level","timestamp"]},
            "results": {"bindings": [
                {"report": {"type": "uri", "value": "https://x.org/onto#Report_1"},
                 "url": {"type": "literal", "value": "https://lemonde.fr/a"},
                 "score": {"type": "literal", "value": "0.82", "datatype": "http://www.w3.org/2001/XMLSchema#float"},
                 "level": {"type": "uri", "value": "https://x.org/onto#High"},
                 "timestamp": {"type": "literal", "value": "2025-01-02T10:00:00"}},
                {"report": {"type": "uri", "value": "https://x.org/onto#Report_2"},
                 "score": {"type": "literal", "value": "not a number"},
                 "level": {"type": "uri", "value": "https://x.org/onto#Low"},
                 "timestamp": {"type": "literal", "value": "2025-01-01"}}
            ]}
        }"#;
        let parsed: SparqlResults = serde_json::from_str(json).unwrap();
        let rows = rows_from_results(parsed, 10);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].level, "High");
        assert_eq!(rows[0].report_uri, "https://x.org/onto#Report_1");
        assert!(rows[0].content.is_none());
        assert!((rows[0].score - 0.82).abs() < 1e-9);
    }

    #[test]
    fn test_parse_timestamp_forms() {
        assert!(parse_timestamp("2025-01-02T10:00:00Z").is_some());
        assert!(parse_timestamp("2025-01-02T10:00:00.123").is_some());
        assert!(parse_timestamp("2025-01-02").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }
}
