use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about = "Evidence retrieval and credibility scoring for claims", long_about = None)]
struct Cli {
    /// Project root holding .credence/config.toml
    #[arg(long, global = true, default_value = ".")]
    project: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Retrieve ranked evidence for a claim
    Retrieve {
        /// Claim text
        claim: String,

        /// Number of evidence documents (default: from config)
        #[arg(short, long)]
        k: Option<usize>,

        /// Retrieval model: bm25 or qld (default: from config)
        #[arg(short, long)]
        model: Option<String>,

        /// Disable pseudo-relevance feedback
        #[arg(long)]
        no_prf: bool,

        /// Output results as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Assess a claim's credibility
    Assess {
        /// Claim text
        claim: String,

        /// Source domain (enables the graph history lookup)
        #[arg(short, long)]
        domain: Option<String>,

        /// Source reputation: high, medium, low, unknown
        #[arg(long)]
        reputation: Option<String>,

        /// Source domain age in days
        #[arg(long)]
        domain_age: Option<i64>,

        /// Output results as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Run the offline benchmark over a topic set
    Bench {
        /// Topics file (TSV `id<TAB>query` or JSON list)
        #[arg(long)]
        topics: PathBuf,

        /// TREC qrels file
        #[arg(long)]
        qrels: PathBuf,

        /// Documents per topic (default: from config)
        #[arg(short, long)]
        k: Option<usize>,

        /// Run configurations, e.g. bm25,qld_prf (default: all four)
        #[arg(long, value_delimiter = ',')]
        configs: Option<Vec<String>>,

        /// Output directory for run files, checkpoints and the report
        #[arg(short, long, default_value = "bench-out")]
        out: PathBuf,

        /// Skip topics already recorded in checkpoints
        #[arg(long)]
        resume: bool,

        /// Output report as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Score an existing run file against qrels
    Eval {
        /// TREC run file
        #[arg(long)]
        run: PathBuf,

        /// TREC qrels file
        #[arg(long)]
        qrels: PathBuf,

        /// Show per-topic metrics
        #[arg(short, long)]
        verbose: bool,

        /// Output results as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Build the SQLite FTS5 evidence index from a JSONL corpus
    Index {
        /// JSONL corpus (`{"id", "contents"}` per line)
        #[arg(long)]
        corpus: PathBuf,

        /// Index location (default: from config)
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    credence::telemetry::init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Retrieve {
            claim,
            k,
            model,
            no_prf,
            json,
        } => {
            commands::retrieve::execute(
                &cli.project,
                commands::retrieve::RetrieveOptions {
                    claim,
                    k,
                    model,
                    no_prf,
                    json,
                },
            )?;
        }
        Commands::Assess {
            claim,
            domain,
            reputation,
            domain_age,
            json,
        } => {
            commands::assess::execute(
                &cli.project,
                commands::assess::AssessOptions {
                    claim,
                    domain,
                    reputation,
                    domain_age,
                    json,
                },
            )?;
        }
        Commands::Bench {
            topics,
            qrels,
            k,
            configs,
            out,
            resume,
            json,
        } => {
            commands::bench::execute(
                &cli.project,
                commands::bench::BenchOptions {
                    topics,
                    qrels,
                    k,
                    configs,
                    out,
                    resume,
                    json,
                },
            )?;
        }
        Commands::Eval {
            run,
            qrels,
            verbose,
            json,
        } => {
            commands::eval::execute(&run, &qrels, verbose, json)?;
        }
        Commands::Index { corpus, output } => {
            commands::index::execute(&cli.project, &corpus, output)?;
        }
    }

    Ok(())
}
