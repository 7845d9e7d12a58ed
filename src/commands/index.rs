//! Index command - build the SQLite FTS5 evidence index

use anyhow::Result;
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::time::Instant;

use credence::project;
use credence::retrieval::{Corpus, FtsIndexLayer};

pub fn execute(project_path: &Path, corpus_path: &Path, output: Option<PathBuf>) -> Result<()> {
    let config = project::load(project_path)?;
    let index_path = output.unwrap_or_else(|| project::index_path(project_path, &config));

    println!("{}", "📦 Building evidence index".bold().blue());
    println!("   Corpus: {}", corpus_path.display());
    println!("   Index:  {}", index_path.display());

    let start = Instant::now();
    let corpus = Corpus::load_jsonl(corpus_path)?;
    if corpus.is_empty() {
        anyhow::bail!("Corpus {} has no documents", corpus_path.display());
    }

    let count = FtsIndexLayer::build(&index_path, &corpus, &config.retrieval.normalizer())?;

    println!(
        "   {} Indexed {} documents in {:.1}s",
        "✓".green().bold(),
        count,
        start.elapsed().as_secs_f64()
    );
    Ok(())
}
