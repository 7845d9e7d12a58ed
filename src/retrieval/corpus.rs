//! Corpus documents and precomputed term statistics
//!
//! `Corpus` owns the raw documents (lookup by doc_id), `TokenizedCorpus`
//! holds what the ranking core needs: per-document term frequencies,
//! lengths, document frequencies and collection frequencies.

use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::text::Normalizer;

/// A single indexed document. Immutable once inserted into a corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub doc_id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Document {
    pub fn new(doc_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            doc_id: doc_id.into(),
            text: text.into(),
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// JSONL record as written by Pyserini-style collection tools
#[derive(Debug, Deserialize)]
struct JsonlRecord {
    #[serde(alias = "docid", alias = "doc_id")]
    id: Option<String>,
    #[serde(alias = "text")]
    contents: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

/// Document store keyed by doc_id (ordered, so iteration is deterministic)
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    docs: BTreeMap<String, Document>,
}

impl Corpus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_documents(documents: impl IntoIterator<Item = Document>) -> Self {
        let mut corpus = Self::new();
        for doc in documents {
            corpus.insert(doc);
        }
        corpus
    }

    /// Insert a document. Returns false (and keeps the original) on duplicate id.
    pub fn insert(&mut self, doc: Document) -> bool {
        if self.docs.contains_key(&doc.doc_id) {
            tracing::warn!(doc_id = %doc.doc_id, "duplicate doc_id ignored");
            return false;
        }
        self.docs.insert(doc.doc_id.clone(), doc);
        true
    }

    /// Load a JSONL corpus: one `{"id", "contents"|"text", "title"}` object per line
    ///
    /// Malformed lines and records without an id are skipped with a warning.
    pub fn load_jsonl(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open corpus: {}", path.display()))?;
        let reader = BufReader::new(file);

        let mut corpus = Self::new();
        let mut skipped = 0usize;

        for (line_no, line) in reader.lines().enumerate() {
            let line = line.with_context(|| format!("Failed to read corpus: {}", path.display()))?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            match serde_json::from_str::<JsonlRecord>(trimmed) {
                Ok(JsonlRecord {
                    id: Some(id),
                    contents,
                    title,
                }) if !id.is_empty() => {
                    let doc = Document {
                        doc_id: id,
                        text: contents.unwrap_or_default(),
                        title: title.filter(|t| !t.is_empty()),
                    };
                    corpus.insert(doc);
                }
                Ok(_) => {
                    skipped += 1;
                    tracing::warn!(line = line_no + 1, "corpus record without id skipped");
                }
                Err(e) => {
                    skipped += 1;
                    tracing::warn!(line = line_no + 1, error = %e, "malformed corpus line skipped");
                }
            }
        }

        tracing::info!(
            path = %path.display(),
            documents = corpus.len(),
            skipped,
            "corpus loaded"
        );
        Ok(corpus)
    }

    pub fn get(&self, doc_id: &str) -> Option<&Document> {
        self.docs.get(doc_id)
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Documents in ascending doc_id order
    pub fn iter(&self) -> impl Iterator<Item = &Document> {
        self.docs.values()
    }
}

/// Term statistics for one document
#[derive(Debug, Clone)]
pub(crate) struct TokenizedDoc {
    pub doc_id: String,
    pub term_freqs: HashMap<String, u32>,
    pub length: usize,
}

/// Precomputed statistics consumed by the ranking core
#[derive(Debug, Clone, Default)]
pub struct TokenizedCorpus {
    docs: Vec<TokenizedDoc>,
    doc_freq: HashMap<String, usize>,
    collection_freq: HashMap<String, u64>,
    total_tokens: u64,
}

impl TokenizedCorpus {
    /// Tokenize every document with the given normalizer (parallel)
    pub fn build(corpus: &Corpus, normalizer: &Normalizer) -> Self {
        let docs: Vec<&Document> = corpus.iter().collect();
        let tokenized: Vec<(String, Vec<String>)> = docs
            .par_iter()
            .map(|doc| (doc.doc_id.clone(), normalizer.normalize(&doc.text)))
            .collect();
        Self::from_tokens(tokenized)
    }

    /// Build from already-normalized token sequences (doc_id → tokens)
    pub fn from_tokens(documents: impl IntoIterator<Item = (String, Vec<String>)>) -> Self {
        let mut docs: Vec<TokenizedDoc> = Vec::new();
        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        let mut collection_freq: HashMap<String, u64> = HashMap::new();
        let mut total_tokens = 0u64;

        for (doc_id, tokens) in documents {
            let mut term_freqs: HashMap<String, u32> = HashMap::new();
            for token in &tokens {
                *term_freqs.entry(token.clone()).or_default() += 1;
            }
            for (term, tf) in &term_freqs {
                *doc_freq.entry(term.clone()).or_default() += 1;
                *collection_freq.entry(term.clone()).or_default() += u64::from(*tf);
            }
            total_tokens += tokens.len() as u64;
            docs.push(TokenizedDoc {
                doc_id,
                term_freqs,
                length: tokens.len(),
            });
        }

        docs.sort_by(|a, b| a.doc_id.cmp(&b.doc_id));

        Self {
            docs,
            doc_freq,
            collection_freq,
            total_tokens,
        }
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Mean document length in tokens (1.0 for an empty corpus)
    pub fn avg_doc_len(&self) -> f64 {
        if self.docs.is_empty() {
            return 1.0;
        }
        (self.total_tokens as f64 / self.docs.len() as f64).max(f64::MIN_POSITIVE)
    }

    pub fn doc_freq(&self, term: &str) -> usize {
        self.doc_freq.get(term).copied().unwrap_or(0)
    }

    /// Background probability p(term | collection); 0 for unseen terms
    pub fn collection_prob(&self, term: &str) -> f64 {
        if self.total_tokens == 0 {
            return 0.0;
        }
        self.collection_freq.get(term).copied().unwrap_or(0) as f64 / self.total_tokens as f64
    }

    pub fn doc_len(&self, doc_id: &str) -> Option<usize> {
        self.docs
            .binary_search_by(|d| d.doc_id.as_str().cmp(doc_id))
            .ok()
            .map(|i| self.docs[i].length)
    }

    pub(crate) fn docs(&self) -> &[TokenizedDoc] {
        &self.docs
    }
}
