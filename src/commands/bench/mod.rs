//! Benchmark command - run retrieval configurations over a topic set
//!
//! Public interface:
//! - `execute()` - run, checkpoint, score and report
//! - `BenchOptions` - CLI overrides on top of `[bench]` config
//!
//! Ctrl-C stops after the current topic; checkpoints are flushed and
//! `--resume` continues from them.

mod internal;

use anyhow::Result;
use std::path::{Path, PathBuf};

/// Options for benchmark execution
pub struct BenchOptions {
    pub topics: PathBuf,
    pub qrels: PathBuf,
    /// Override documents per topic (default: from config)
    pub k: Option<usize>,
    /// Run configuration names (default: bm25, bm25_prf, qld, qld_prf)
    pub configs: Option<Vec<String>>,
    pub out: PathBuf,
    pub resume: bool,
    pub json: bool,
}

pub fn execute(project_path: &Path, options: BenchOptions) -> Result<()> {
    internal::run_benchmark(project_path, options)
}
