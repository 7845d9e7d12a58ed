//! Eval command - score an existing run file against qrels

use anyhow::Result;
use colored::Colorize;
use std::path::Path;

use credence::bench::{evaluate_topics, read_qrels, read_run};
use credence::metrics::BenchmarkMetrics;

pub fn execute(run_path: &Path, qrels_path: &Path, verbose: bool, json: bool) -> Result<()> {
    let run = read_run(run_path)?;
    let qrels = read_qrels(qrels_path)?;

    let metrics = evaluate_topics(run.records.keys().map(String::as_str), &run.records, &qrels.records);

    if json {
        println!("{}", serde_json::to_string_pretty(&metrics)?);
        return Ok(());
    }

    println!("{}", "📊 Run Evaluation".bold().blue());
    println!("   Run:   {} ({} topics)", run_path.display(), run.records.len());
    println!("   Qrels: {} ({} topics)", qrels_path.display(), qrels.records.len());
    if run.skipped + qrels.skipped > 0 {
        println!(
            "   {} Skipped malformed lines: {} run, {} qrels",
            "⚠".yellow(),
            run.skipped,
            qrels.skipped
        );
    }
    println!();
    print_metrics(&metrics);

    if verbose {
        println!();
        println!("   {:<10} {:>6} {:>6} {:>6} {:>6} {:>8}", "topic", "AP", "RR", "P@10", "R@100", "nDCG@10");
        for q in &metrics.per_query {
            println!(
                "   {:<10} {:>6.3} {:>6.3} {:>6.3} {:>6.3} {:>8.3}",
                q.topic_id, q.average_precision, q.reciprocal_rank, q.p_at_10, q.recall_at_100, q.ndcg_at_10
            );
        }
    }
    Ok(())
}

pub(crate) fn print_metrics(m: &BenchmarkMetrics) {
    println!("   Evaluated topics: {}", m.num_queries);
    println!("   ├─ MAP:       {:.4}", m.map);
    println!("   ├─ MRR:       {:.4}", m.mrr);
    println!("   ├─ nDCG@10:   {:.4}", m.mean_ndcg_at_10);
    println!("   ├─ P@5:       {:.4}", m.mean_p_at_5);
    println!("   ├─ P@10:      {:.4}", m.mean_p_at_10);
    println!("   └─ Recall@100: {:.4}", m.mean_recall_at_100);
}
