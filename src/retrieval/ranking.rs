//! Ranking core: BM25 and Dirichlet query likelihood over a tokenized corpus
//!
//! Scoring is exhaustive (every document is scored against every query
//! term) and parallel across documents. Output order is fully
//! deterministic: score descending, then doc_id ascending.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use super::corpus::{TokenizedCorpus, TokenizedDoc};

/// Retrieval model used to score documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalModel {
    Bm25,
    Qld,
}

impl RetrievalModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetrievalModel::Bm25 => "bm25",
            RetrievalModel::Qld => "qld",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "bm25" => Some(RetrievalModel::Bm25),
            "qld" | "lm" | "dirichlet" => Some(RetrievalModel::Qld),
            _ => None,
        }
    }
}

impl std::fmt::Display for RetrievalModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// BM25 parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
    pub k1: f64,
    pub b: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 0.9, b: 0.4 }
    }
}

/// Dirichlet smoothing parameter for query likelihood
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QldParams {
    pub mu: f64,
}

impl Default for QldParams {
    fn default() -> Self {
        Self { mu: 1000.0 }
    }
}

/// A scored document reference (no text)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredDoc {
    pub doc_id: String,
    pub score: f64,
}

/// Total order used everywhere results are ranked
pub fn compare_scored(a: &ScoredDoc, b: &ScoredDoc) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.doc_id.cmp(&b.doc_id))
}

/// Sort descending by score with doc_id tie-break, then keep the top `k`
pub fn top_k(mut scored: Vec<ScoredDoc>, k: usize) -> Vec<ScoredDoc> {
    scored.sort_by(compare_scored);
    scored.truncate(k);
    scored
}

/// In-memory scorer with fixed parameters
#[derive(Debug, Clone, Copy, Default)]
pub struct RankingCore {
    pub bm25: Bm25Params,
    pub qld: QldParams,
}

impl RankingCore {
    pub fn new(bm25: Bm25Params, qld: QldParams) -> Self {
        Self { bm25, qld }
    }

    /// Score `query` against `corpus` and return the top `k` non-zero hits
    ///
    /// Empty query or empty corpus gives an empty result.
    pub fn rank(
        &self,
        query: &[String],
        corpus: &TokenizedCorpus,
        k: usize,
        model: RetrievalModel,
    ) -> Vec<ScoredDoc> {
        assert!(k > 0, "ranking requires k > 0");

        if query.is_empty() || corpus.is_empty() {
            return Vec::new();
        }

        // BTreeMap keeps per-document summation order fixed across runs
        let mut query_tf: BTreeMap<&str, u32> = BTreeMap::new();
        for term in query {
            *query_tf.entry(term.as_str()).or_default() += 1;
        }

        let weights = self.term_weights(&query_tf, corpus, model);
        if weights.is_empty() {
            return Vec::new();
        }

        let avg_len = corpus.avg_doc_len();
        let scored: Vec<ScoredDoc> = corpus
            .docs()
            .par_iter()
            .filter_map(|doc| {
                let score = match model {
                    RetrievalModel::Bm25 => self.bm25_score(doc, &weights, avg_len),
                    RetrievalModel::Qld => self.qld_score(doc, &weights),
                };
                (score > 0.0).then(|| ScoredDoc {
                    doc_id: doc.doc_id.clone(),
                    score,
                })
            })
            .collect();

        top_k(scored, k)
    }

    /// Per-term constants: (term, query tf, idf for BM25 or p(t|C) for QLD)
    fn term_weights<'q>(
        &self,
        query_tf: &BTreeMap<&'q str, u32>,
        corpus: &TokenizedCorpus,
        model: RetrievalModel,
    ) -> Vec<(&'q str, f64, f64)> {
        let n = corpus.len() as f64;
        query_tf
            .iter()
            .filter_map(|(&term, &qtf)| {
                let df = corpus.doc_freq(term);
                if df == 0 {
                    return None;
                }
                let constant = match model {
                    RetrievalModel::Bm25 => {
                        let df = df as f64;
                        (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
                    }
                    RetrievalModel::Qld => corpus.collection_prob(term),
                };
                Some((term, f64::from(qtf), constant))
            })
            .collect()
    }

    fn bm25_score(&self, doc: &TokenizedDoc, weights: &[(&str, f64, f64)], avg_len: f64) -> f64 {
        let Bm25Params { k1, b } = self.bm25;
        let norm = k1 * (1.0 - b + b * doc.length as f64 / avg_len);

        weights
            .iter()
            .map(|&(term, qtf, idf)| {
                let tf = doc.term_freqs.get(term).copied().unwrap_or(0) as f64;
                if tf == 0.0 {
                    return 0.0;
                }
                qtf * idf * tf * (k1 + 1.0) / (tf + norm)
            })
            .sum()
    }

    fn qld_score(&self, doc: &TokenizedDoc, weights: &[(&str, f64, f64)]) -> f64 {
        let mu = self.qld.mu;
        let length_penalty = (mu / (doc.length as f64 + mu)).ln();

        weights
            .iter()
            .map(|&(term, qtf, p_coll)| {
                let tf = doc.term_freqs.get(term).copied().unwrap_or(0) as f64;
                if tf == 0.0 || p_coll <= 0.0 {
                    return 0.0;
                }
                let gain = (1.0 + tf / (mu * p_coll)).ln() + length_penalty;
                qtf * gain.max(0.0)
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(s: &str) -> Vec<String> {
        s.split_whitespace().map(String::from).collect()
    }

    fn corpus() -> TokenizedCorpus {
        TokenizedCorpus::from_tokens(vec![
            ("d3".to_string(), toks("climat chang human activ")),
            ("d1".to_string(), toks("climat chang climat warm")),
            ("d2".to_string(), toks("vaccin safe effect")),
            ("d4".to_string(), toks("solar wind renew energi climat")),
        ])
    }

    #[test]
    fn test_model_parse() {
        assert_eq!(RetrievalModel::from_str("BM25"), Some(RetrievalModel::Bm25));
        assert_eq!(RetrievalModel::from_str("qld"), Some(RetrievalModel::Qld));
        assert_eq!(RetrievalModel::from_str("tfidf"), None);
        assert_eq!(RetrievalModel::Qld.as_str(), "qld");
    }

    #[test]
    fn test_bm25_ranks_and_excludes_zero() {
        let core = RankingCore::default();
        let hits = core.rank(&toks("climat chang"), &corpus(), 10, RetrievalModel::Bm25);
        let ids: Vec<&str> = hits.iter().map(|h| h.doc_id.as_str()).collect();
        assert_eq!(ids[0], "d1");
        assert!(!ids.contains(&"d2"));
        assert_eq!(hits.len(), 3);
        for pair in hits.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn test_ties_broken_by_doc_id() {
        let tc = TokenizedCorpus::from_tokens(vec![
            ("zeta".to_string(), toks("alpha beta")),
            ("alpha".to_string(), toks("alpha beta")),
            ("mid".to_string(), toks("alpha beta")),
        ]);
        let hits = RankingCore::default().rank(&toks("alpha"), &tc, 3, RetrievalModel::Bm25);
        let ids: Vec<&str> = hits.iter().map(|h| h.doc_id.as_str()).collect();
        assert_eq!(ids, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_rank_is_deterministic() {
        let core = RankingCore::default();
        let tc = corpus();
        for model in [RetrievalModel::Bm25, RetrievalModel::Qld] {
            let a = core.rank(&toks("climat energi human"), &tc, 4, model);
            let b = core.rank(&toks("climat energi human"), &tc, 4, model);
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_top_k_truncates() {
        let hits = RankingCore::default().rank(&toks("climat"), &corpus(), 2, RetrievalModel::Bm25);
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn test_empty_inputs() {
        let core = RankingCore::default();
        assert!(core.rank(&[], &corpus(), 5, RetrievalModel::Bm25).is_empty());
        assert!(core
            .rank(&toks("climat"), &TokenizedCorpus::default(), 5, RetrievalModel::Qld)
            .is_empty());
        assert!(core.rank(&toks("unseen"), &corpus(), 5, RetrievalModel::Bm25).is_empty());
    }

    #[test]
    fn test_qld_prefers_higher_tf() {
        let hits = RankingCore::default().rank(&toks("climat"), &corpus(), 4, RetrievalModel::Qld);
        assert_eq!(hits[0].doc_id, "d1");
        assert!(hits.iter().all(|h| h.score > 0.0));
    }

    #[test]
    #[should_panic(expected = "k > 0")]
    fn test_zero_k_is_contract_violation() {
        RankingCore::default().rank(&toks("climat"), &corpus(), 0, RetrievalModel::Bm25);
    }
}
