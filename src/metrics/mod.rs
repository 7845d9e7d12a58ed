//! Evaluation metrics - IR quality over ranked lists and relevance judgments
//!
//! Public interface:
//! - `precision_at_k`, `recall_at_k`, `average_precision`, `reciprocal_rank`, `ndcg_at_k`
//! - `Judgments` - binary (set) or graded (map) relevance
//! - `evaluate_query` / `aggregate` - per-query metrics and their means
//! - `retrieval_quality` - self-reported quality of a live retrieval
//!
//! Every function is pure. Empty inputs and `k == 0` give 0.0, and `k`
//! larger than the ranked list means "the whole list".

mod quality;

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

pub use quality::{grade_evidence, retrieval_quality};

/// Relevance judgments for one topic
pub trait Judgments {
    /// Relevance grade of a document (0 = not relevant)
    fn grade(&self, doc_id: &str) -> i32;

    /// Grades of every judged-relevant document (all > 0)
    fn relevant_grades(&self) -> Vec<i32>;

    fn is_relevant(&self, doc_id: &str) -> bool {
        self.grade(doc_id) > 0
    }

    fn relevant_count(&self) -> usize {
        self.relevant_grades().len()
    }
}

impl Judgments for HashSet<String> {
    fn grade(&self, doc_id: &str) -> i32 {
        i32::from(self.contains(doc_id))
    }

    fn relevant_grades(&self) -> Vec<i32> {
        vec![1; self.len()]
    }
}

impl Judgments for HashMap<String, i32> {
    fn grade(&self, doc_id: &str) -> i32 {
        self.get(doc_id).copied().unwrap_or(0).max(0)
    }

    fn relevant_grades(&self) -> Vec<i32> {
        self.values().copied().filter(|g| *g > 0).collect()
    }
}

fn cutoff<S>(retrieved: &[S], k: usize) -> &[S] {
    &retrieved[..k.min(retrieved.len())]
}

fn hits_in<S: AsRef<str>>(retrieved: &[S], judgments: &impl Judgments) -> usize {
    retrieved
        .iter()
        .filter(|d| judgments.is_relevant(d.as_ref()))
        .count()
}

/// Fraction of the top `k` that is relevant (denominator = min(k, list length))
pub fn precision_at_k<S: AsRef<str>>(retrieved: &[S], judgments: &impl Judgments, k: usize) -> f64 {
    let top = cutoff(retrieved, k);
    if top.is_empty() {
        return 0.0;
    }
    hits_in(top, judgments) as f64 / top.len() as f64
}

/// Fraction of all relevant documents found in the top `k`
pub fn recall_at_k<S: AsRef<str>>(retrieved: &[S], judgments: &impl Judgments, k: usize) -> f64 {
    let total = judgments.relevant_count();
    if total == 0 {
        return 0.0;
    }
    (hits_in(cutoff(retrieved, k), judgments) as f64 / total as f64).min(1.0)
}

/// Mean of precision@i over the ranks i holding a relevant document
pub fn average_precision<S: AsRef<str>>(retrieved: &[S], judgments: &impl Judgments) -> f64 {
    let mut hits = 0usize;
    let mut sum = 0.0;
    for (i, doc) in retrieved.iter().enumerate() {
        if judgments.is_relevant(doc.as_ref()) {
            hits += 1;
            sum += hits as f64 / (i + 1) as f64;
        }
    }
    if hits == 0 {
        0.0
    } else {
        sum / hits as f64
    }
}

/// 1 / rank of the first relevant document
pub fn reciprocal_rank<S: AsRef<str>>(retrieved: &[S], judgments: &impl Judgments) -> f64 {
    retrieved
        .iter()
        .position(|d| judgments.is_relevant(d.as_ref()))
        .map(|i| 1.0 / (i + 1) as f64)
        .unwrap_or(0.0)
}

fn dcg(grades: impl Iterator<Item = i32>) -> f64 {
    grades
        .enumerate()
        .map(|(i, g)| f64::from(g.max(0)) / ((i + 2) as f64).log2())
        .sum()
}

/// Normalized DCG at `k` with linear gain and 1/log2(rank+1) discount
pub fn ndcg_at_k<S: AsRef<str>>(retrieved: &[S], judgments: &impl Judgments, k: usize) -> f64 {
    if k == 0 {
        return 0.0;
    }
    let actual = dcg(cutoff(retrieved, k).iter().map(|d| judgments.grade(d.as_ref())));

    let mut ideal = judgments.relevant_grades();
    ideal.sort_unstable_by(|a, b| b.cmp(a));
    ideal.truncate(k);
    let ideal = dcg(ideal.into_iter());

    if ideal <= 0.0 {
        0.0
    } else {
        actual / ideal
    }
}

/// Metric values for one topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryMetrics {
    pub topic_id: String,
    pub retrieved: usize,
    pub relevant: usize,
    pub p_at_5: f64,
    pub p_at_10: f64,
    pub recall_at_100: f64,
    pub average_precision: f64,
    pub reciprocal_rank: f64,
    pub ndcg_at_10: f64,
}

/// Compute the standard metric set for one topic
pub fn evaluate_query<S: AsRef<str>>(
    topic_id: &str,
    retrieved: &[S],
    judgments: &impl Judgments,
) -> QueryMetrics {
    QueryMetrics {
        topic_id: topic_id.to_string(),
        retrieved: retrieved.len(),
        relevant: judgments.relevant_count(),
        p_at_5: precision_at_k(retrieved, judgments, 5),
        p_at_10: precision_at_k(retrieved, judgments, 10),
        recall_at_100: recall_at_k(retrieved, judgments, 100),
        average_precision: average_precision(retrieved, judgments),
        reciprocal_rank: reciprocal_rank(retrieved, judgments),
        ndcg_at_10: ndcg_at_k(retrieved, judgments, 10),
    }
}

/// Per-query metrics plus their means; built once, never mutated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkMetrics {
    pub num_queries: usize,
    pub map: f64,
    pub mrr: f64,
    pub mean_ndcg_at_10: f64,
    pub mean_p_at_5: f64,
    pub mean_p_at_10: f64,
    pub mean_recall_at_100: f64,
    pub per_query: Vec<QueryMetrics>,
}

/// Mean every metric across topics (all zero for an empty set)
pub fn aggregate(per_query: Vec<QueryMetrics>) -> BenchmarkMetrics {
    let n = per_query.len();
    let mean = |f: fn(&QueryMetrics) -> f64| -> f64 {
        if n == 0 {
            0.0
        } else {
            per_query.iter().map(f).sum::<f64>() / n as f64
        }
    };

    BenchmarkMetrics {
        num_queries: n,
        map: mean(|q| q.average_precision),
        mrr: mean(|q| q.reciprocal_rank),
        mean_ndcg_at_10: mean(|q| q.ndcg_at_10),
        mean_p_at_5: mean(|q| q.p_at_5),
        mean_p_at_10: mean(|q| q.p_at_10),
        mean_recall_at_100: mean(|q| q.recall_at_100),
        per_query,
    }
}
