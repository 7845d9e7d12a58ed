//! Pseudo-relevance feedback query expansion
//!
//! Terms are mined from the normalized text of the top-ranked documents.
//! A term's weight is the number of feedback documents containing it,
//! then its total frequency across them; remaining ties go to the
//! lexicographically smaller term so expansion is deterministic.

use std::collections::{HashMap, HashSet};

use crate::text::is_stopword;

/// PRF settings: how many feedback documents, how many terms to append
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrfExpander {
    pub top_docs: usize,
    pub max_terms: usize,
}

impl Default for PrfExpander {
    fn default() -> Self {
        Self {
            top_docs: 3,
            max_terms: 10,
        }
    }
}

impl PrfExpander {
    pub fn new(top_docs: usize, max_terms: usize) -> Self {
        Self {
            top_docs,
            max_terms,
        }
    }

    /// Whether a result list is large enough to run feedback on
    pub fn applies_to(&self, hits: usize) -> bool {
        self.top_docs > 0 && self.max_terms > 0 && hits >= self.top_docs
    }

    /// Expanded query: the original terms followed by up to `max_terms` new ones
    ///
    /// `feedback` holds normalized token sequences of the top-ranked
    /// documents, best first. Returns the query unchanged when fewer than
    /// `top_docs` documents are supplied or no new terms exist.
    pub fn expand(&self, query: &[String], feedback: &[Vec<String>]) -> Vec<String> {
        let mut expanded = query.to_vec();
        expanded.extend(self.expansion_terms(query, feedback));
        expanded
    }

    /// Only the new terms `expand` would append
    pub fn expansion_terms(&self, query: &[String], feedback: &[Vec<String>]) -> Vec<String> {
        if !self.applies_to(feedback.len()) {
            return Vec::new();
        }

        let in_query: HashSet<&str> = query.iter().map(String::as_str).collect();
        // term -> (documents containing it, total tf)
        let mut stats: HashMap<&str, (usize, usize)> = HashMap::new();

        for doc in feedback.iter().take(self.top_docs) {
            let mut seen: HashSet<&str> = HashSet::new();
            for term in doc {
                let term = term.as_str();
                if in_query.contains(term) || !is_candidate(term) {
                    continue;
                }
                let entry = stats.entry(term).or_default();
                entry.1 += 1;
                if seen.insert(term) {
                    entry.0 += 1;
                }
            }
        }

        let mut ranked: Vec<(&str, (usize, usize))> = stats.into_iter().collect();
        ranked.sort_by(|(ta, (da, fa)), (tb, (db, fb))| {
            db.cmp(da).then(fb.cmp(fa)).then(ta.cmp(tb))
        });

        ranked
            .into_iter()
            .take(self.max_terms)
            .map(|(term, _)| term.to_string())
            .collect()
    }
}

fn is_candidate(term: &str) -> bool {
    term.chars().count() >= 3 && !is_stopword(term) && !term.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(s: &str) -> Vec<String> {
        s.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn test_expansion_prefers_document_frequency() {
        let prf = PrfExpander::new(3, 2);
        let feedback = vec![
            toks("climat warm ocean ocean ocean"),
            toks("climat warm carbon"),
            toks("climat warm carbon"),
        ];
        let expanded = prf.expand(&toks("climat"), &feedback);
        assert_eq!(expanded, toks("climat warm carbon"));
    }

    #[test]
    fn test_too_few_documents_is_noop() {
        let prf = PrfExpander::new(3, 10);
        let feedback = vec![toks("alpha beta"), toks("gamma delta")];
        assert_eq!(prf.expand(&toks("query"), &feedback), toks("query"));
    }

    #[test]
    fn test_no_new_terms_is_noop() {
        let prf = PrfExpander::new(2, 10);
        let q = toks("climat chang");
        let feedback = vec![toks("climat chang climat"), toks("chang")];
        assert_eq!(prf.expand(&q, &feedback), q);
        assert!(prf.expansion_terms(&q, &feedback).is_empty());
    }

    #[test]
    fn test_numbers_and_short_terms_skipped() {
        let prf = PrfExpander::new(1, 5);
        let feedback = vec![toks("1988 co report")];
        assert_eq!(prf.expansion_terms(&toks("q"), &feedback), toks("report"));
    }
}
