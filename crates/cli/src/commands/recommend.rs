use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::Result;

use toprank_core::{EngineSettings, StrategyKind};
use toprank_engine::{RecommendRequest, RecommendationService};

use crate::ui;

pub fn run(
    settings: EngineSettings,
    dump: &Path,
    categories: Vec<String>,
    k: Option<usize>,
    strategy: Option<StrategyKind>,
    budget_ms: Option<u64>,
) -> Result<()> {
    let k = k.unwrap_or(settings.default_k);
    let engine = super::load_engine(settings, dump)?;

    let mut request = RecommendRequest::new(categories, k);
    request.strategy = strategy;
    request.budget = budget_ms.map(Duration::from_millis);

    let started = Instant::now();
    let rec = RecommendationService::new(&engine).recommend_detailed(&request)?;
    let elapsed = started.elapsed();

    ui::print_skipped(&rec.skipped);
    ui::print_heading(&format!(
        "Top {k} across {}",
        request.categories.join(", ")
    ));
    ui::print_entities(&rec.entities);
    ui::print_strategy(rec.strategy, elapsed);
    println!();

    Ok(())
}
