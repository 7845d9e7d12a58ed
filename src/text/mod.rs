//! Text normalization shared by indexing, querying and PRF
//!
//! Public interface:
//! - `Normalizer` - deterministic tokenizer (case-fold, stopwords, stemming)
//! - `is_stopword()` - stopword membership for callers that mine terms
//! - `extract_keywords()` - surface keywords for graph pattern lookups
//!
//! The same `Normalizer` settings must be used for the corpus and for
//! queries; the retrieval engine owns a single instance for that reason.

use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashSet;
use std::sync::OnceLock;

/// Tokens shorter than this are dropped (single letters, stray digits)
const MIN_TOKEN_CHARS: usize = 2;

/// Upper bound on repeated stemming; Porter2 settles in one or two passes
const MAX_STEM_PASSES: usize = 4;

const STOPWORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are",
    "as", "at", "be", "because", "been", "before", "being", "below", "between", "both", "but",
    "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "few", "for",
    "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers", "herself",
    "him", "himself", "his", "how", "i", "if", "in", "into", "is", "it", "its", "itself", "just",
    "me", "more", "most", "my", "myself", "no", "nor", "not", "now", "of", "off", "on", "once",
    "only", "or", "other", "our", "ours", "ourselves", "out", "over", "own", "same", "she",
    "should", "so", "some", "such", "than", "that", "the", "their", "theirs", "them",
    "themselves", "then", "there", "these", "they", "this", "those", "through", "to", "too",
    "under", "until", "up", "very", "was", "we", "were", "what", "when", "where", "which",
    "while", "who", "whom", "why", "will", "with", "would", "you", "your", "yours", "yourself",
    "yourselves", "also", "said", "says", "may", "might", "must", "shall", "upon", "per",
];

fn stopwords() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| STOPWORDS.iter().copied().collect())
}

fn url_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(https?://|www\.)\S+").expect("static regex"))
}

/// Check whether a (case-folded) token is an English stopword
pub fn is_stopword(token: &str) -> bool {
    stopwords().contains(token)
}

/// Deterministic text normalizer
///
/// Pipeline: strip URLs, case-fold, split on non-alphanumeric characters,
/// drop stopwords, stem (optional), then drop stopwords and short tokens
/// again. Stemming runs to a fixpoint and the stopword filter runs after
/// it, which keeps `normalize(normalize_to_text(t)) == normalize(t)`.
pub struct Normalizer {
    stemmer: Option<Stemmer>,
}

impl std::fmt::Debug for Normalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Normalizer")
            .field("stemming", &self.stemmer.is_some())
            .finish()
    }
}

impl Clone for Normalizer {
    fn clone(&self) -> Self {
        Self::new(self.stemming())
    }
}

impl Normalizer {
    /// Normalizer with optional English (Porter2) stemming
    pub fn new(stemming: bool) -> Self {
        Self {
            stemmer: stemming.then(|| Stemmer::create(Algorithm::English)),
        }
    }

    pub fn stemming(&self) -> bool {
        self.stemmer.is_some()
    }

    /// Tokenize text into normalized terms
    ///
    /// Never fails: empty or whitespace-only input yields an empty vector.
    pub fn normalize(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let without_urls = url_pattern().replace_all(text, " ");
        let folded = without_urls.to_lowercase();

        folded
            .split(|c: char| !c.is_alphanumeric())
            .filter(|raw| !raw.is_empty() && !is_stopword(raw))
            .map(|raw| self.stem(raw))
            .filter(|tok| tok.chars().count() >= MIN_TOKEN_CHARS && !is_stopword(tok))
            .collect()
    }

    /// Normalized tokens joined by single spaces
    pub fn normalize_to_text(&self, text: &str) -> String {
        self.normalize(text).join(" ")
    }

    fn stem(&self, token: &str) -> String {
        let Some(stemmer) = &self.stemmer else {
            return token.to_string();
        };

        let mut current = token.to_string();
        for _ in 0..MAX_STEM_PASSES {
            let next = stemmer.stem(&current).into_owned();
            if next == current {
                break;
            }
            current = next;
        }
        current
    }
}

/// Extract lowercase surface keywords (no stemming) from claim text
///
/// Keeps words longer than `min_len - 1` characters that are not
/// stopwords, deduplicated in first-seen order, at most `max` of them.
pub fn extract_keywords(text: &str, min_len: usize, max: usize) -> Vec<String> {
    let without_urls = url_pattern().replace_all(text, " ");
    let folded = without_urls.to_lowercase();

    let mut keywords: Vec<String> = Vec::new();
    for word in folded.split(|c: char| !c.is_alphanumeric()) {
        if keywords.len() >= max {
            break;
        }
        if word.chars().count() < min_len || is_stopword(word) {
            continue;
        }
        if !keywords.iter().any(|k| k == word) {
            keywords.push(word.to_string());
        }
    }
    keywords
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_yields_no_tokens() {
        let n = Normalizer::default();
        assert!(n.normalize("").is_empty());
        assert!(n.normalize("   \n\t").is_empty());
        assert!(n.normalize("!!! ... ???").is_empty());
    }

    #[test]
    fn test_case_folding_and_stopwords() {
        let n = Normalizer::new(false);
        let tokens = n.normalize("The Climate is CHANGING, and it is real!");
        assert_eq!(tokens, vec!["climate", "changing", "real"]);
    }

    #[test]
    fn test_urls_are_stripped() {
        let n = Normalizer::new(false);
        let tokens = n.normalize("see https://example.com/a?b=c and www.test.org for vaccines");
        assert_eq!(tokens, vec!["see", "vaccines"]);
    }

    #[test]
    fn test_stemming_conflates_inflections() {
        let n = Normalizer::new(true);
        assert_eq!(n.normalize("emissions"), n.normalize("emission"));
        assert_eq!(n.normalize("warming"), n.normalize("warmed"));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let n = Normalizer::new(true);
        let samples = [
            "Climate change is primarily caused by human activities!",
            "The agreed conditional happiness of hers generalizations",
            "Scientists say 97% of studies agree; rumors claim otherwise.",
            "Renewable energy sources like solar and wind can help",
        ];
        for text in samples {
            let once = n.normalize(text);
            let twice = n.normalize(&n.normalize_to_text(text));
            assert_eq!(once, twice, "not idempotent for {:?}", text);
        }
    }

    #[test]
    fn test_query_and_document_share_rules() {
        let n = Normalizer::default();
        let doc = n.normalize("Greenhouse gas emissions are rising.");
        let query = n.normalize("rising EMISSIONS");
        assert!(query.iter().all(|q| doc.contains(q)));
    }

    #[test]
    fn test_extract_keywords() {
        let kw = extract_keywords("The vaccine CAUSES autism, the vaccine said so", 4, 10);
        assert_eq!(kw, vec!["vaccine", "causes", "autism"]);
        assert_eq!(extract_keywords("vaccine causes autism", 4, 2).len(), 2);
        assert!(extract_keywords("", 4, 5).is_empty());
    }

    #[test]
    fn test_short_tokens_dropped() {
        let n = Normalizer::new(false);
        assert_eq!(n.normalize("x y z co2"), vec!["co2"]);
    }
}
