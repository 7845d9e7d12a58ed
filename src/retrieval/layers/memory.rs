//! In-memory fallback layer - exhaustive ranking over a loaded corpus

use crate::retrieval::corpus::{Corpus, TokenizedCorpus};
use crate::retrieval::layer::{LayerError, SearchLayer};
use crate::retrieval::ranking::{RankingCore, RetrievalModel, ScoredDoc};
use crate::text::Normalizer;

/// Always-available layer backed by `RankingCore`
pub struct MemoryLayer {
    corpus: Corpus,
    tokenized: TokenizedCorpus,
    core: RankingCore,
}

impl MemoryLayer {
    /// Tokenize `corpus` with `normalizer`; must be the engine's normalizer
    pub fn new(corpus: Corpus, normalizer: &Normalizer, core: RankingCore) -> Self {
        let tokenized = TokenizedCorpus::build(&corpus, normalizer);
        Self {
            corpus,
            tokenized,
            core,
        }
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }
}

impl SearchLayer for MemoryLayer {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn supports(&self, _model: RetrievalModel) -> bool {
        true
    }

    fn search(
        &self,
        query_tokens: &[String],
        k: usize,
        model: RetrievalModel,
    ) -> Result<Vec<ScoredDoc>, LayerError> {
        Ok(self.core.rank(query_tokens, &self.tokenized, k, model))
    }

    fn lookup(&self, doc_id: &str) -> Option<String> {
        self.corpus.get(doc_id).map(|d| d.text.clone())
    }

    fn doc_count(&self) -> usize {
        self.corpus.len()
    }

    fn is_fallback(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::corpus::Document;

    #[test]
    fn test_memory_layer_search_and_lookup() {
        let normalizer = Normalizer::default();
        let corpus = Corpus::from_documents(vec![
            Document::new("D1", "Vaccines are safe and effective."),
            Document::new("D2", "The stock market closed higher."),
        ]);
        let layer = MemoryLayer::new(corpus, &normalizer, RankingCore::default());

        let hits = layer
            .search(&normalizer.normalize("vaccine safety"), 5, RetrievalModel::Bm25)
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].doc_id, "D1");
        assert_eq!(layer.lookup("D2").as_deref(), Some("The stock market closed higher."));
        assert!(layer.lookup("D9").is_none());
        assert_eq!(layer.doc_count(), 2);
    }
}
