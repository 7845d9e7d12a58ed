//! TREC file formats: run files, qrels, topics
//!
//! Run line: `<topic_id> Q0 <doc_id> <rank> <score:.6> <run_tag>`
//! Qrels line: `<topic_id> <iteration> <doc_id> <relevance>`
//!
//! Readers never fail on a bad line: it is skipped, counted and logged.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::retrieval::RetrievalResult;

/// Records parsed from a line-oriented file plus the number of rejected lines
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFile<T> {
    pub records: T,
    pub skipped: usize,
}

/// One line of a run file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEntry {
    pub topic_id: String,
    pub doc_id: String,
    pub rank: usize,
    pub score: f64,
}

/// Run entries for one topic's retrieval result
pub fn run_entries(topic_id: &str, result: &RetrievalResult) -> Vec<RunEntry> {
    result
        .evidences
        .iter()
        .map(|ev| RunEntry {
            topic_id: topic_id.to_string(),
            doc_id: ev.doc_id.clone(),
            rank: ev.rank,
            score: ev.score,
        })
        .collect()
}

pub fn format_run_line(entry: &RunEntry, run_tag: &str) -> String {
    format!(
        "{} Q0 {} {} {:.6} {}",
        entry.topic_id, entry.doc_id, entry.rank, entry.score, run_tag
    )
}

/// Parse a run line; returns the entry and its run tag
pub fn parse_run_line(line: &str) -> Option<(RunEntry, String)> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != 6 {
        return None;
    }
    let rank: usize = fields[3].parse().ok()?;
    let score: f64 = fields[4].parse().ok()?;
    if rank == 0 || !score.is_finite() {
        return None;
    }
    Some((
        RunEntry {
            topic_id: fields[0].to_string(),
            doc_id: fields[2].to_string(),
            rank,
            score,
        },
        fields[5].to_string(),
    ))
}

pub fn write_run(path: &Path, entries: &[RunEntry], run_tag: &str) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create run file: {}", path.display()))?;
    let mut out = BufWriter::new(file);
    for entry in entries {
        writeln!(out, "{}", format_run_line(entry, run_tag))?;
    }
    out.flush()
        .with_context(|| format!("Failed to write run file: {}", path.display()))?;
    Ok(())
}

/// Read a run file, grouped per topic and sorted by rank
pub fn read_run(path: &Path) -> Result<ParsedFile<BTreeMap<String, Vec<RunEntry>>>> {
    let mut runs: BTreeMap<String, Vec<RunEntry>> = BTreeMap::new();
    let skipped = for_each_line(path, "run", |line| {
        let (entry, _tag) = parse_run_line(line)?;
        runs.entry(entry.topic_id.clone()).or_default().push(entry);
        Some(())
    })?;

    for entries in runs.values_mut() {
        entries.sort_by(|a, b| a.rank.cmp(&b.rank).then_with(|| a.doc_id.cmp(&b.doc_id)));
    }
    Ok(ParsedFile {
        records: runs,
        skipped,
    })
}

/// Relevance judgments for a whole topic set
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Qrels {
    topics: BTreeMap<String, HashMap<String, i32>>,
}

impl Qrels {
    pub fn insert(&mut self, topic_id: &str, doc_id: &str, relevance: i32) {
        self.topics
            .entry(topic_id.to_string())
            .or_default()
            .insert(doc_id.to_string(), relevance);
    }

    pub fn judgments(&self, topic_id: &str) -> Option<&HashMap<String, i32>> {
        self.topics.get(topic_id)
    }

    pub fn topic_ids(&self) -> impl Iterator<Item = &str> {
        self.topics.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}

/// Parse a qrels line into (topic_id, doc_id, relevance)
pub fn parse_qrel_line(line: &str) -> Option<(String, String, i32)> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 4 {
        return None;
    }
    let relevance: i32 = fields[3].parse().ok()?;
    Some((fields[0].to_string(), fields[2].to_string(), relevance))
}

pub fn read_qrels(path: &Path) -> Result<ParsedFile<Qrels>> {
    let mut qrels = Qrels::default();
    let skipped = for_each_line(path, "qrels", |line| {
        let (topic, doc, rel) = parse_qrel_line(line)?;
        qrels.insert(&topic, &doc, rel);
        Some(())
    })?;
    Ok(ParsedFile {
        records: qrels,
        skipped,
    })
}

/// A benchmark topic (query)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    #[serde(alias = "topic_id", alias = "num")]
    pub id: String,
    #[serde(alias = "title", alias = "text")]
    pub query: String,
}

/// Read topics: a JSON array of `{id, query}` or TSV `topic_id<TAB>query`
pub fn read_topics(path: &Path) -> Result<ParsedFile<Vec<Topic>>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read topics: {}", path.display()))?;

    if content.trim_start().starts_with('[') {
        let topics: Vec<Topic> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse topics: {}", path.display()))?;
        let total = topics.len();
        let topics: Vec<Topic> = topics
            .into_iter()
            .filter(|t| !t.id.trim().is_empty() && !t.query.trim().is_empty())
            .collect();
        let skipped = total - topics.len();
        if skipped > 0 {
            tracing::warn!(skipped, "topics without id or query skipped");
        }
        return Ok(ParsedFile {
            records: topics,
            skipped,
        });
    }

    let mut topics = Vec::new();
    let mut skipped = 0usize;
    for (line_no, line) in content.lines().enumerate() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        match line.split_once('\t') {
            Some((id, query)) if !id.trim().is_empty() && !query.trim().is_empty() => {
                topics.push(Topic {
                    id: id.trim().to_string(),
                    query: query.trim().to_string(),
                });
            }
            _ => {
                skipped += 1;
                tracing::warn!(line = line_no + 1, "malformed topic line skipped");
            }
        }
    }
    Ok(ParsedFile {
        records: topics,
        skipped,
    })
}

/// Feed each non-blank, non-comment line to `parse`; returns the skip count
fn for_each_line(
    path: &Path,
    kind: &str,
    mut parse: impl FnMut(&str) -> Option<()>,
) -> Result<usize> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open {} file: {}", kind, path.display()))?;

    let mut skipped = 0usize;
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read {} file: {}", kind, path.display()))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if parse(trimmed).is_none() {
            skipped += 1;
            tracing::warn!(kind, line = line_no + 1, "malformed line skipped");
        }
    }
    Ok(skipped)
}
