//! Internal implementation for bench command

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;
use std::sync::Arc;

use credence::bench::{
    read_qrels, read_topics, BenchReport, BenchRunner, CancelToken, RunConfig,
};
use credence::project;

use super::BenchOptions;
use crate::commands::eval::print_metrics;

pub(super) fn run_benchmark(project_path: &Path, options: BenchOptions) -> Result<()> {
    let config = project::load(project_path)?;

    let topics = read_topics(&options.topics)?;
    let qrels = read_qrels(&options.qrels)?;
    if topics.records.is_empty() {
        anyhow::bail!("No topics in {}", options.topics.display());
    }

    let configs = parse_configs(options.configs.as_deref())?;

    let mut settings = config.bench.settings();
    if let Some(k) = options.k {
        anyhow::ensure!(k > 0, "--k must be at least 1");
        settings.k = k;
    }

    let retriever = Arc::new(config.build_retriever(project_path)?);
    let available = retriever.available_layers();

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        eprintln!("\n⏹  Cancelling after the current topic...");
        handler_token.cancel();
    })
    .context("Failed to install Ctrl-C handler")?;

    if !options.json {
        println!("🔬 Credence Retrieval Benchmark");
        println!(
            "   Topics: {} ({} skipped)   Qrels topics: {} ({} lines skipped)",
            topics.records.len(),
            topics.skipped,
            qrels.records.len(),
            qrels.skipped
        );
        println!("   Documents per topic: {}", settings.k);
        println!(
            "   Configs: {}",
            configs.iter().map(|c| c.name.as_str()).collect::<Vec<_>>().join(", ")
        );
        println!("   Layers: {}", available.join(" → "));
        if options.resume {
            println!("   Resuming from checkpoints in {}", options.out.display());
        }
        println!();
    }

    let runner = BenchRunner::new(retriever, settings).with_cancel(cancel);
    let report = runner.run(&topics.records, &qrels.records, &configs, &options.out, options.resume)?;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn parse_configs(names: Option<&[String]>) -> Result<Vec<RunConfig>> {
    let Some(names) = names else {
        return Ok(RunConfig::standard());
    };
    names
        .iter()
        .map(|n| {
            RunConfig::from_str(n.trim())
                .with_context(|| format!("Unknown run configuration '{}' (e.g. bm25, qld_prf)", n))
        })
        .collect()
}

fn print_report(report: &BenchReport) {
    for c in &report.configs {
        println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        println!("📊 {}", c.run_tag.bold());
        println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        println!(
            "   Topics: {}/{} ({} resumed)   Time: {:.1}s",
            c.topics_completed,
            c.topics_total,
            c.topics_resumed,
            c.elapsed_ms as f64 / 1000.0
        );
        if c.topics_degraded > 0 {
            println!(
                "   {} {} topics had no search layer available",
                "⚠".yellow(),
                c.topics_degraded
            );
        }
        print_metrics(&c.metrics);
        println!("   Run file: {}", c.run_file.display());
        println!();
    }

    if report.cancelled() {
        println!(
            "   {} Benchmark cancelled; rerun with --resume to continue",
            "⚠".yellow().bold()
        );
    } else {
        println!("   {} Benchmark complete", "✓".green().bold());
    }
}
