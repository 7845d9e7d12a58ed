//! Offline benchmark runner
//!
//! For each run configuration: retrieve every topic, append completed
//! topics to a JSONL checkpoint, write the run file, then score it against
//! the qrels. A cancelled run flushes its checkpoint and stops; `resume`
//! picks up from the checkpoint and skips topics already done.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::formats::{run_entries, write_run, ParsedFile, Qrels, RunEntry, Topic};
use crate::metrics::{aggregate, evaluate_query, BenchmarkMetrics};
use crate::retrieval::{EvidenceRetriever, RetrievalModel, RetrievalOptions, NO_LAYER};

/// Sleep granularity while pacing, so cancellation is noticed quickly
const CANCEL_POLL: Duration = Duration::from_millis(50);

/// One retrieval configuration (model x PRF)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    pub name: String,
    pub model: RetrievalModel,
    pub use_prf: bool,
}

impl RunConfig {
    pub fn new(model: RetrievalModel, use_prf: bool) -> Self {
        let name = if use_prf {
            format!("{}_prf", model.as_str())
        } else {
            model.as_str().to_string()
        };
        Self {
            name,
            model,
            use_prf,
        }
    }

    /// bm25, bm25_prf, qld, qld_prf
    pub fn standard() -> Vec<Self> {
        [RetrievalModel::Bm25, RetrievalModel::Qld]
            .into_iter()
            .flat_map(|m| [Self::new(m, false), Self::new(m, true)])
            .collect()
    }

    /// Parse a configuration name like "qld_prf"
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        let (model, prf) = match s.strip_suffix("_prf") {
            Some(model) => (model, true),
            None => (s, false),
        };
        RetrievalModel::from_str(model).map(|m| Self::new(m, prf))
    }

    /// `<prefix>_<config>_<query_type>`
    pub fn run_tag(&self, prefix: &str, query_type: &str) -> String {
        format!("{}_{}_{}", prefix, self.name, query_type)
    }

    fn options(&self, k: usize) -> RetrievalOptions {
        RetrievalOptions {
            k,
            model: self.model,
            use_prf: self.use_prf,
        }
    }
}

/// Shared cancellation flag; clones observe the same state
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Delay between requests: fixed when healthy, exponential after failures
#[derive(Debug, Clone)]
pub struct Pacer {
    delay: Duration,
    base_backoff: Duration,
    max_backoff: Duration,
    failures: u32,
}

impl Pacer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            base_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            failures: 0,
        }
    }

    pub fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.base_backoff = base;
        self.max_backoff = max.max(base);
        self
    }

    /// Record the outcome of a request and return how long to wait
    pub fn next_pause(&mut self, ok: bool) -> Duration {
        if ok {
            self.failures = 0;
            return self.delay;
        }
        let exp = self.failures.min(16);
        self.failures = self.failures.saturating_add(1);
        let backoff = self.base_backoff.saturating_mul(1u32 << exp).min(self.max_backoff);
        backoff.max(self.delay)
    }

    /// Sleep for the next pause unless cancelled first
    pub fn pause(&mut self, ok: bool, cancel: &CancelToken) {
        let mut remaining = self.next_pause(ok);
        while !remaining.is_zero() && !cancel.is_cancelled() {
            let step = remaining.min(CANCEL_POLL);
            std::thread::sleep(step);
            remaining -= step;
        }
    }
}

/// One completed topic in a checkpoint file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub run_tag: String,
    pub topic_id: String,
    pub entries: Vec<RunEntry>,
}

/// Append-only JSONL log of completed topics
pub struct Checkpoint {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
    pending: AtomicUsize,
    flush_every: usize,
}

impl Checkpoint {
    /// Open for appending; `resume = false` starts a fresh file
    ///
    /// When resuming after a torn final write, the fragment is terminated
    /// so the next record starts on its own line.
    pub fn open(path: &Path, resume: bool, flush_every: usize) -> Result<Self> {
        let mut file = if resume {
            OpenOptions::new().create(true).read(true).append(true).open(path)
        } else {
            File::create(path)
        }
        .with_context(|| format!("Failed to open checkpoint: {}", path.display()))?;

        if resume && !ends_with_newline(&mut file)? {
            file.write_all(b"\n")
                .with_context(|| format!("Failed to repair checkpoint: {}", path.display()))?;
        }

        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(BufWriter::new(file)),
            pending: AtomicUsize::new(0),
            flush_every: flush_every.max(1),
        })
    }

    /// Completed topics recorded for `run_tag`
    ///
    /// A missing file is an empty checkpoint. Lines that fail to parse
    /// (e.g. a torn final write) or belong to another run are skipped.
    pub fn load(path: &Path, run_tag: &str) -> Result<ParsedFile<HashMap<String, Vec<RunEntry>>>> {
        let mut done = HashMap::new();
        if !path.exists() {
            return Ok(ParsedFile {
                records: done,
                skipped: 0,
            });
        }

        let file = File::open(path)
            .with_context(|| format!("Failed to open checkpoint: {}", path.display()))?;
        let mut skipped = 0usize;
        for line in BufReader::new(file).lines() {
            let line = line.with_context(|| format!("Failed to read checkpoint: {}", path.display()))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<CheckpointRecord>(&line) {
                Ok(rec) if rec.run_tag == run_tag => {
                    done.insert(rec.topic_id, rec.entries);
                }
                _ => skipped += 1,
            }
        }
        if skipped > 0 {
            tracing::warn!(path = %path.display(), skipped, "checkpoint lines skipped");
        }
        Ok(ParsedFile {
            records: done,
            skipped,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a record; flushes every `flush_every` records
    pub fn record(&self, record: &CheckpointRecord) -> Result<()> {
        let line = serde_json::to_string(record)?;
        {
            let mut writer = self.writer.lock();
            writeln!(writer, "{}", line)
                .with_context(|| format!("Failed to write checkpoint: {}", self.path.display()))?;
        }
        if self.pending.fetch_add(1, Ordering::SeqCst) + 1 >= self.flush_every {
            self.flush()?;
        }
        Ok(())
    }

    pub fn flush(&self) -> Result<()> {
        self.writer
            .lock()
            .flush()
            .with_context(|| format!("Failed to flush checkpoint: {}", self.path.display()))?;
        self.pending.store(0, Ordering::SeqCst);
        Ok(())
    }
}

/// True for an empty file or one whose last byte is a newline
fn ends_with_newline(file: &mut File) -> Result<bool> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::Start(len - 1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

/// Runner settings (see `[bench]` in the project config)
#[derive(Debug, Clone)]
pub struct BenchSettings {
    pub k: usize,
    pub pacing: Duration,
    pub backoff: Duration,
    pub max_backoff: Duration,
    pub checkpoint_every: usize,
    pub run_tag_prefix: String,
    pub query_type: String,
}

impl Default for BenchSettings {
    fn default() -> Self {
        Self {
            k: 100,
            pacing: Duration::ZERO,
            backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            checkpoint_every: 10,
            run_tag_prefix: "credence".to_string(),
            query_type: "title".to_string(),
        }
    }
}

/// Outcome of one configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigReport {
    pub config: RunConfig,
    pub run_tag: String,
    pub run_file: PathBuf,
    pub topics_total: usize,
    pub topics_completed: usize,
    pub topics_resumed: usize,
    /// Topics no layer could serve
    pub topics_degraded: usize,
    pub cancelled: bool,
    pub elapsed_ms: u64,
    pub metrics: BenchmarkMetrics,
}

/// Whole benchmark report, written as JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchReport {
    pub generated_at: DateTime<Utc>,
    pub k: usize,
    pub corpus_size: usize,
    pub configs: Vec<ConfigReport>,
}

impl BenchReport {
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report: {}", path.display()))?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read report: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse report: {}", path.display()))
    }

    pub fn cancelled(&self) -> bool {
        self.configs.iter().any(|c| c.cancelled)
    }
}

/// Score the given topics of a run; topics without judgments are skipped
pub fn evaluate_topics<'a>(
    topic_ids: impl IntoIterator<Item = &'a str>,
    runs: &BTreeMap<String, Vec<RunEntry>>,
    qrels: &Qrels,
) -> BenchmarkMetrics {
    let per_query = topic_ids
        .into_iter()
        .filter_map(|topic| {
            let judgments = qrels.judgments(topic)?;
            let retrieved: Vec<&str> = runs
                .get(topic)
                .map(|entries| entries.iter().map(|e| e.doc_id.as_str()).collect())
                .unwrap_or_default();
            Some(evaluate_query(topic, &retrieved, judgments))
        })
        .collect();
    aggregate(per_query)
}

pub struct BenchRunner {
    retriever: Arc<EvidenceRetriever>,
    settings: BenchSettings,
    cancel: CancelToken,
}

impl BenchRunner {
    pub fn new(retriever: Arc<EvidenceRetriever>, settings: BenchSettings) -> Self {
        Self {
            retriever,
            settings,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Run every configuration and write run files, checkpoints and the
    /// JSON report into `out_dir`
    pub fn run(
        &self,
        topics: &[Topic],
        qrels: &Qrels,
        configs: &[RunConfig],
        out_dir: &Path,
        resume: bool,
    ) -> Result<BenchReport> {
        std::fs::create_dir_all(out_dir)
            .with_context(|| format!("Failed to create output directory: {}", out_dir.display()))?;

        let mut reports = Vec::new();
        for config in configs {
            let report = self.run_config(config, topics, qrels, out_dir, resume)?;
            let cancelled = report.cancelled;
            reports.push(report);
            if cancelled {
                break;
            }
        }

        let report = BenchReport {
            generated_at: Utc::now(),
            k: self.settings.k,
            corpus_size: self.retriever.stats().corpus_size,
            configs: reports,
        };
        let report_path = out_dir.join(format!("{}_report.json", self.settings.run_tag_prefix));
        report.save(&report_path)?;
        tracing::info!(path = %report_path.display(), "benchmark report written");
        Ok(report)
    }

    fn run_config(
        &self,
        config: &RunConfig,
        topics: &[Topic],
        qrels: &Qrels,
        out_dir: &Path,
        resume: bool,
    ) -> Result<ConfigReport> {
        let start = Instant::now();
        let tag = config.run_tag(&self.settings.run_tag_prefix, &self.settings.query_type);
        let checkpoint_path = out_dir.join(format!("{}.checkpoint.jsonl", tag));

        let mut done = if resume {
            Checkpoint::load(&checkpoint_path, &tag)?.records
        } else {
            HashMap::new()
        };
        let resumed = topics.iter().filter(|t| done.contains_key(&t.id)).count();
        let checkpoint = Checkpoint::open(&checkpoint_path, resume, self.settings.checkpoint_every)?;
        tracing::info!(run_tag = %tag, topics = topics.len(), resumed, "run started");

        let options = config.options(self.settings.k);
        let mut pacer = Pacer::new(self.settings.pacing)
            .with_backoff(self.settings.backoff, self.settings.max_backoff);
        let mut degraded = 0usize;
        let mut cancelled = false;
        let mut runs: BTreeMap<String, Vec<RunEntry>> = BTreeMap::new();
        // Outcome of the previous request; None before the first one
        let mut last_ok: Option<bool> = None;

        for topic in topics {
            if let Some(entries) = done.remove(&topic.id) {
                runs.insert(topic.id.clone(), entries);
                continue;
            }
            if self.cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            if let Some(ok) = last_ok {
                pacer.pause(ok, &self.cancel);
                if self.cancel.is_cancelled() {
                    cancelled = true;
                    break;
                }
            }

            let result = self.retriever.retrieve(&topic.query, &options);
            if result.served_by == NO_LAYER && !topic.query.trim().is_empty() {
                // Neither checkpointed nor scored; a resumed run retries it
                degraded += 1;
                tracing::warn!(topic = %topic.id, "no search layer served topic");
                last_ok = Some(false);
                continue;
            }
            last_ok = Some(true);

            let entries = run_entries(&topic.id, &result);
            checkpoint.record(&CheckpointRecord {
                run_tag: tag.clone(),
                topic_id: topic.id.clone(),
                entries: entries.clone(),
            })?;
            runs.insert(topic.id.clone(), entries);
        }
        checkpoint.flush()?;

        if cancelled {
            tracing::warn!(run_tag = %tag, completed = runs.len(), "run cancelled");
        }

        let ordered: Vec<RunEntry> = topics
            .iter()
            .filter_map(|t| runs.get(&t.id))
            .flatten()
            .cloned()
            .collect();
        let run_file = out_dir.join(format!("{}.run", tag));
        write_run(&run_file, &ordered, &tag)?;

        let completed: Vec<&str> = topics
            .iter()
            .map(|t| t.id.as_str())
            .filter(|id| runs.contains_key(*id))
            .collect();
        let metrics = evaluate_topics(completed.iter().copied(), &runs, qrels);
        tracing::info!(run_tag = %tag, map = metrics.map, queries = metrics.num_queries, "run scored");

        Ok(ConfigReport {
            config: config.clone(),
            run_tag: tag,
            run_file,
            topics_total: topics.len(),
            topics_completed: completed.len(),
            topics_resumed: resumed,
            topics_degraded: degraded,
            cancelled,
            elapsed_ms: start.elapsed().as_millis() as u64,
            metrics,
        })
    }
}
