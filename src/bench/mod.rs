//! Offline IR benchmarking against TREC-style topics and qrels
//!
//! Public interface:
//! - `formats` - run files, qrels, topics (`ParsedFile` counts skipped lines)
//! - `BenchRunner::run()` - retrieve, checkpoint, write runs, score, report
//! - `CancelToken`, `Pacer` - cooperative cancellation and request pacing

pub mod formats;
mod runner;

pub use formats::{
    format_run_line, parse_qrel_line, parse_run_line, read_qrels, read_run, read_topics,
    run_entries, write_run, ParsedFile, Qrels, RunEntry, Topic,
};
pub use runner::{
    evaluate_topics, BenchReport, BenchRunner, BenchSettings, CancelToken, Checkpoint,
    CheckpointRecord, ConfigReport, Pacer, RunConfig,
};
