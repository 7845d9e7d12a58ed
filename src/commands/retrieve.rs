//! Retrieve command - ranked evidence for one claim

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;

use credence::project;
use credence::retrieval::{RetrievalModel, RetrievalResult};

use super::truncate;

pub struct RetrieveOptions {
    pub claim: String,
    pub k: Option<usize>,
    pub model: Option<String>,
    pub no_prf: bool,
    pub json: bool,
}

pub fn execute(project_path: &Path, options: RetrieveOptions) -> Result<()> {
    let config = project::load(project_path)?;
    let retriever = config.build_retriever(project_path)?;

    let mut opts = config.retrieval_options()?;
    if let Some(k) = options.k {
        anyhow::ensure!(k > 0, "--k must be at least 1");
        opts.k = k;
    }
    if let Some(model) = &options.model {
        opts.model = RetrievalModel::from_str(model)
            .with_context(|| format!("Unknown retrieval model '{}' (expected bm25 or qld)", model))?;
    }
    if options.no_prf {
        opts.use_prf = false;
    }

    let result = retriever.retrieve(&options.claim, &opts);

    if options.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    print_result(&result, config.retrieval.snippet_chars);
    Ok(())
}

fn print_result(result: &RetrievalResult, snippet_chars: usize) {
    println!("{}", "🔎 Evidence Retrieval".bold().blue());
    println!("   Claim: \"{}\"", truncate(&result.query, 80));
    println!(
        "   Model: {}   Served by: {}   Time: {}ms",
        result.model_used,
        result.served_by,
        result.search_time.as_millis()
    );
    if let Some(expanded) = &result.expanded_query {
        println!("   Expanded: {}", truncate(expanded, 80));
    }
    println!();

    if result.is_empty() {
        println!("   {} No evidence found", "⚠".yellow());
        return;
    }

    for ev in &result.evidences {
        println!(
            "   {}. {} {} ({:.3})",
            ev.rank,
            ev.doc_id.bold(),
            format!("[{}]", ev.source).dimmed(),
            ev.score
        );
        println!("      {}", ev.display_text(snippet_chars).replace('\n', " "));
    }
    println!();
    println!(
        "   {} {} of {} documents returned",
        "✓".green().bold(),
        result.evidences.len(),
        result.total_retrieved
    );
}
