//! External index layer - SQLite FTS5 over normalized document text
//!
//! The index stores the normalizer's output rather than raw text, so FTS5
//! only has to split on whitespace and query terms line up exactly with
//! indexed terms. Raw text lives in a plain `documents` table for lookup.
//! FTS5 ranks with its built-in BM25 (k1=1.2, b=0.75); QLD requests are
//! refused so the engine falls through to the in-memory layer.

use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::retrieval::corpus::Corpus;
use crate::retrieval::layer::{LayerError, SearchLayer};
use crate::retrieval::ranking::{top_k, RetrievalModel, ScoredDoc};
use crate::text::Normalizer;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS documents (
        doc_id TEXT PRIMARY KEY,
        title TEXT,
        text TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS index_meta (
        key TEXT PRIMARY KEY,
        value TEXT
    );

    CREATE VIRTUAL TABLE IF NOT EXISTS evidence_fts USING fts5(
        doc_id UNINDEXED,
        content,
        tokenize='unicode61 remove_diacritics 0'
    );
"#;

pub struct FtsIndexLayer {
    db_path: PathBuf,
    /// Index was built with a different stemming setting than the query side
    stemming_mismatch: bool,
}

impl FtsIndexLayer {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            stemming_mismatch: false,
        }
    }

    /// Open the index for queries normalized by `normalizer`
    ///
    /// An index built with a different stemming setting would silently stop
    /// matching, so it is reported unavailable and the engine falls through.
    pub fn open(db_path: impl Into<PathBuf>, normalizer: &Normalizer) -> Self {
        let mut layer = Self::new(db_path);
        if let Some(stored) = layer.stored_stemming() {
            if stored != normalizer.stemming() {
                tracing::warn!(
                    path = %layer.db_path.display(),
                    index_stemming = stored,
                    query_stemming = normalizer.stemming(),
                    "fts index built with different stemming, rebuild with `credence index`"
                );
                layer.stemming_mismatch = true;
            }
        }
        layer
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// (Re)build the index at `db_path` from `corpus`
    ///
    /// Returns the number of documents indexed.
    pub fn build(db_path: &Path, corpus: &Corpus, normalizer: &Normalizer) -> Result<usize> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create index directory: {}", parent.display())
                })?;
            }
        }

        let mut conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open index: {}", db_path.display()))?;
        conn.execute_batch(SCHEMA)
            .context("Failed to create index schema")?;

        let tx = conn.transaction()?;
        tx.execute("DELETE FROM documents", [])?;
        tx.execute("DELETE FROM evidence_fts", [])?;

        let mut count = 0usize;
        {
            let mut insert_doc =
                tx.prepare("INSERT INTO documents (doc_id, title, text) VALUES (?1, ?2, ?3)")?;
            let mut insert_fts =
                tx.prepare("INSERT INTO evidence_fts (doc_id, content) VALUES (?1, ?2)")?;

            for doc in corpus.iter() {
                insert_doc.execute(rusqlite::params![&doc.doc_id, &doc.title, &doc.text])?;
                insert_fts.execute(rusqlite::params![
                    &doc.doc_id,
                    normalizer.normalize_to_text(&doc.text)
                ])?;
                count += 1;
            }
        }

        tx.execute(
            "INSERT OR REPLACE INTO index_meta (key, value) VALUES ('stemming', ?1)",
            [if normalizer.stemming() { "true" } else { "false" }],
        )?;
        tx.commit().context("Failed to commit index")?;

        tracing::info!(path = %db_path.display(), documents = count, "fts index built");
        Ok(count)
    }

    /// Stemming setting recorded at build time, if the index has one
    pub fn stored_stemming(&self) -> Option<bool> {
        let conn = self.connect().ok()?;
        let value: String = conn
            .query_row(
                "SELECT value FROM index_meta WHERE key = 'stemming'",
                [],
                |row| row.get(0),
            )
            .ok()?;
        match value.as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        }
    }

    fn connect(&self) -> Result<Connection, LayerError> {
        if !self.db_path.exists() {
            return Err(LayerError::Unavailable(self.db_path.display().to_string()));
        }
        let conn = Connection::open_with_flags(
            &self.db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(conn)
    }
}

/// FTS5 MATCH expression: distinct quoted terms joined with OR
fn match_expression(query_tokens: &[String]) -> Option<String> {
    let terms: BTreeSet<&str> = query_tokens
        .iter()
        .map(String::as_str)
        .filter(|t| !t.is_empty())
        .collect();
    if terms.is_empty() {
        return None;
    }
    Some(
        terms
            .iter()
            .map(|t| format!("\"{}\"", t.replace('"', "\"\"")))
            .collect::<Vec<_>>()
            .join(" OR "),
    )
}

impl SearchLayer for FtsIndexLayer {
    fn name(&self) -> &'static str {
        "fts5"
    }

    fn is_available(&self) -> bool {
        !self.stemming_mismatch && self.db_path.exists()
    }

    fn supports(&self, model: RetrievalModel) -> bool {
        model == RetrievalModel::Bm25
    }

    fn search(
        &self,
        query_tokens: &[String],
        k: usize,
        model: RetrievalModel,
    ) -> Result<Vec<ScoredDoc>, LayerError> {
        if !self.supports(model) {
            return Err(LayerError::UnsupportedModel(model));
        }
        let Some(expr) = match_expression(query_tokens) else {
            return Ok(Vec::new());
        };

        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT doc_id, -bm25(evidence_fts) AS score
             FROM evidence_fts
             WHERE evidence_fts MATCH ?1
             ORDER BY score DESC, doc_id ASC
             LIMIT ?2",
        )?;

        let rows = stmt.query_map(rusqlite::params![expr, k as i64], |row| {
            Ok(ScoredDoc {
                doc_id: row.get(0)?,
                score: row.get(1)?,
            })
        })?;

        let mut hits = Vec::new();
        for row in rows {
            let hit = row?;
            if hit.score > 0.0 {
                hits.push(hit);
            }
        }
        Ok(top_k(hits, k))
    }

    fn lookup(&self, doc_id: &str) -> Option<String> {
        let conn = self.connect().ok()?;
        match conn.query_row(
            "SELECT text FROM documents WHERE doc_id = ?1",
            [doc_id],
            |row| row.get::<_, String>(0),
        ) {
            Ok(text) => Some(text),
            Err(rusqlite::Error::QueryReturnedNoRows) => None,
            Err(e) => {
                tracing::warn!(layer = "fts5", doc_id, error = %e, "document lookup failed");
                None
            }
        }
    }

    fn doc_count(&self) -> usize {
        self.connect()
            .ok()
            .and_then(|conn| {
                conn.query_row("SELECT COUNT(*) FROM documents", [], |row| {
                    row.get::<_, i64>(0)
                })
                .ok()
            })
            .map(|n| n.max(0) as usize)
            .unwrap_or(0)
    }
}
