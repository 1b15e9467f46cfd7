mod commands;
mod ui;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use toprank_core::{StrategyKind, config};

#[derive(Parser)]
#[command(version, about = "Category-aware Top-K ranking and recommendation")]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Generate synthetic categories and compare aggregation strategies
    Bench {
        #[arg(long, default_value_t = 8)]
        categories: usize,
        #[arg(long, default_value_t = 10_000)]
        per_category: usize,
        #[arg(long)]
        k: Option<usize>,
        #[arg(long, default_value_t = 200)]
        requests: usize,
        /// Share of entities that also appear in a second category
        #[arg(long, default_value_t = 0.1)]
        overlap: f64,
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
    /// Print one category's Top-K from a dump file
    Top {
        #[arg(long)]
        dump: PathBuf,
        #[arg(long)]
        category: String,
        #[arg(long)]
        k: Option<usize>,
    },
    /// Recommend across several categories from a dump file
    Recommend {
        #[arg(long)]
        dump: PathBuf,
        #[arg(long, value_delimiter = ',', required = true)]
        categories: Vec<String>,
        #[arg(long)]
        k: Option<usize>,
        #[arg(long)]
        strategy: Option<StrategyKind>,
        #[arg(long)]
        budget_ms: Option<u64>,
    },
}

fn main() -> Result<()> {
    toprank_utils::init_tracing("warn");

    let cli = Cli::parse();
    let cwd = std::env::current_dir()?;
    let settings = config::load_settings(&cwd);

    match cli.cmd {
        Cmd::Bench {
            categories,
            per_category,
            k,
            requests,
            overlap,
            seed,
        } => commands::bench::run(
            settings,
            commands::bench::BenchArgs {
                categories,
                per_category,
                k,
                requests,
                overlap,
                seed,
            },
        ),
        Cmd::Top { dump, category, k } => commands::top::run(settings, &dump, &category, k),
        Cmd::Recommend {
            dump,
            categories,
            k,
            strategy,
            budget_ms,
        } => commands::recommend::run(settings, &dump, categories, k, strategy, budget_ms),
    }
}
