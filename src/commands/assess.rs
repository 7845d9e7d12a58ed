//! Assess command - full credibility assessment for one claim

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use credence::fusion::{CredibilityLabel, ProviderSet, Reputation, SourceFacts};
use credence::pipeline::{Assessment, Assessor, Claim};
use credence::project;

use super::truncate;

/// Deadline for each external signal provider
const PROVIDER_TIMEOUT: Duration = Duration::from_secs(5);

pub struct AssessOptions {
    pub claim: String,
    pub domain: Option<String>,
    pub reputation: Option<String>,
    pub domain_age: Option<i64>,
    pub json: bool,
}

pub fn execute(project_path: &Path, options: AssessOptions) -> Result<()> {
    let config = project::load(project_path)?;
    let retriever = Arc::new(config.build_retriever(project_path)?);

    let reputation = match &options.reputation {
        Some(r) => Reputation::from_str(r)
            .with_context(|| format!("Unknown reputation '{}' (expected high, medium, low, unknown)", r))?,
        None => Reputation::Unknown,
    };

    let mut assessor = Assessor::new(
        retriever,
        config.fusion.engine(),
        ProviderSet::new(PROVIDER_TIMEOUT),
        config.retrieval_options()?,
    );
    if let Some(scorer) = config.graph.context_scorer()? {
        assessor = assessor.with_context(scorer);
    }

    let mut claim = Claim::new(options.claim).with_source(SourceFacts {
        reputation,
        domain_age_days: options.domain_age,
    });
    if let Some(domain) = options.domain {
        claim = claim.with_domain(domain);
    }

    let assessment = assessor.assess(&claim);

    if options.json {
        println!("{}", serde_json::to_string_pretty(&assessment)?);
        return Ok(());
    }

    print_assessment(&assessment);
    Ok(())
}

fn print_assessment(a: &Assessment) {
    println!("{}", "🔬 Credibility Assessment".bold().blue());
    println!("   Claim: \"{}\"", truncate(&a.claim.text, 80));
    if let Some(domain) = &a.claim.domain {
        println!("   Source: {}", domain);
    }
    println!();

    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!(
        "📊 Score: {:.3}   Label: {}",
        a.fusion.final_score,
        colored_label(a.fusion.label)
    );
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();

    if a.fusion.contributions.is_empty() {
        println!("   No signals available; score is neutral");
    } else {
        println!("   Signals:");
        let last = a.fusion.contributions.len() - 1;
        for (i, c) in a.fusion.contributions.iter().enumerate() {
            let branch = if i == last { "└─" } else { "├─" };
            println!(
                "   {} {:<20} value {:.2}  weight {:.3}  {:+.4}",
                branch, c.factor_name, c.raw_value, c.weight, c.signed_adjustment
            );
        }
    }
    println!();

    println!(
        "   Evidence: {} documents (served by {})",
        a.retrieval.evidences.len(),
        a.retrieval.served_by
    );
    for ev in a.retrieval.evidences.iter().take(3) {
        println!("   ├─ {} {}", ev.doc_id.bold(), truncate(&ev.display_text(120), 100));
    }
    if let Some(q) = a.retrieval_quality {
        println!("   └─ Retrieval quality: {:.2}", q);
    }

    if let Some(graph) = &a.graph {
        println!();
        for line in graph.summary().lines() {
            println!("   {}", line);
        }
    }

    for outcome in &a.providers {
        if let Some(err) = &outcome.error {
            println!("   {} {}: {}", "⚠".yellow(), outcome.provider, err);
        }
    }
}

fn colored_label(label: CredibilityLabel) -> colored::ColoredString {
    match label {
        CredibilityLabel::High | CredibilityLabel::MediumHigh => label.as_str().green().bold(),
        CredibilityLabel::Medium => label.as_str().yellow().bold(),
        CredibilityLabel::LowMedium | CredibilityLabel::Low => label.as_str().red().bold(),
    }
}
