use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use colored::Colorize;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::info;

use toprank_core::{EngineSettings, EntityId, ScoredEntity, StrategyKind};
use toprank_engine::{MutationEvent, RankingEngine, RecommendRequest, RecommendationService};

use crate::ui;

const STRATEGIES: [StrategyKind; 3] = [StrategyKind::Merge, StrategyKind::Unified, StrategyKind::Auto];

pub struct BenchArgs {
    pub categories: usize,
    pub per_category: usize,
    pub k: Option<usize>,
    pub requests: usize,
    pub overlap: f64,
    pub seed: u64,
}

#[derive(Default)]
struct Timing {
    runs: usize,
    total: Duration,
}

pub fn run(settings: EngineSettings, args: BenchArgs) -> Result<()> {
    if args.categories == 0 {
        bail!("--categories must be at least 1");
    }
    if !(0.0..=1.0).contains(&args.overlap) {
        bail!("--overlap must be between 0 and 1, got {}", args.overlap);
    }

    let k = args.k.unwrap_or(settings.default_k);
    let mut rng = StdRng::seed_from_u64(args.seed);
    let mut engine = synthesize(settings, &args, &mut rng)?;
    let names: Vec<String> = engine.categories().into_iter().map(String::from).collect();

    let mut timings: [Timing; 3] = Default::default();
    let mut auto_picks = [0usize; 2];

    for _ in 0..args.requests {
        // One visit per request keeps some snapshots cold.
        if args.per_category > 0 {
            let c = rng.random_range(0..args.categories);
            engine.apply(MutationEvent::Visited {
                category: category_name(c),
                id: (c * args.per_category + rng.random_range(0..args.per_category)) as EntityId,
            })?;
        }

        let mut picked = names.clone();
        picked.shuffle(&mut rng);
        picked.truncate(rng.random_range(1..=names.len()));

        let service = RecommendationService::new(&engine);
        let mut answers = Vec::with_capacity(STRATEGIES.len());

        for (slot, strategy) in STRATEGIES.into_iter().enumerate() {
            let request = RecommendRequest::new(picked.iter().cloned(), k).with_strategy(strategy);

            let started = Instant::now();
            let rec = service.recommend_detailed(&request)?;
            timings[slot].total += started.elapsed();
            timings[slot].runs += 1;

            if strategy == StrategyKind::Auto {
                let pick = usize::from(rec.strategy == StrategyKind::Unified);
                auto_picks[pick] += 1;
            }

            answers.push(keys(&rec.entities));
        }

        if answers.windows(2).any(|w| w[0] != w[1]) {
            bail!("strategies disagree for categories {picked:?} at k={k}");
        }
    }

    ui::print_heading(&format!(
        "{} categories x {} entities, k={k}, overlap={}, {} requests",
        args.categories, args.per_category, args.overlap, args.requests
    ));
    for (strategy, timing) in STRATEGIES.iter().zip(&timings) {
        ui::print_timing_row(strategy.as_str(), timing.runs, timing.total);
    }
    println!(
        "{}",
        format!(
            "  auto resolved to merge {} times, unified {} times",
            auto_picks[0], auto_picks[1]
        )
        .dimmed()
    );
    println!("{}", "  all strategies agreed".green());
    println!();

    Ok(())
}

fn category_name(index: usize) -> String {
    format!("category-{index:03}")
}

/// Ids may legitimately differ between strategies on tied keys.
fn keys(entities: &[ScoredEntity]) -> Vec<(f64, u64)> {
    entities.iter().map(ScoredEntity::key).collect()
}

/// Each category owns a contiguous id range. With probability `overlap` an
/// entity is also listed, with the same scores, in one other category.
fn synthesize(settings: EngineSettings, args: &BenchArgs, rng: &mut StdRng) -> Result<RankingEngine> {
    let mut members: Vec<Vec<ScoredEntity>> = vec![Vec::new(); args.categories];

    for c in 0..args.categories {
        for i in 0..args.per_category {
            let id = (c * args.per_category + i) as EntityId;
            let rating = (rng.random_range(0.0..5.0_f64) * 10.0).round() / 10.0;
            let entity = ScoredEntity::new(id, rating, rng.random_range(0..10_000));
            members[c].push(entity);

            if args.categories > 1 && rng.random_bool(args.overlap) {
                let other = (c + rng.random_range(1..args.categories)) % args.categories;
                members[other].push(entity);
            }
        }
    }

    let mut engine = RankingEngine::with_settings(settings);
    for (c, entities) in members.into_iter().enumerate() {
        let name = category_name(c);
        engine
            .register_category(name.clone(), entities)
            .with_context(|| format!("Failed to build {name}"))?;
    }

    info!(
        categories = args.categories,
        per_category = args.per_category,
        "synthetic engine ready"
    );

    Ok(engine)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(categories: usize, per_category: usize, overlap: f64) -> BenchArgs {
        BenchArgs {
            categories,
            per_category,
            k: Some(5),
            requests: 10,
            overlap,
            seed: 3,
        }
    }

    #[test]
    fn synthesize_without_overlap_partitions_ids() {
        let mut rng = StdRng::seed_from_u64(1);
        let engine = synthesize(EngineSettings::default(), &args(3, 20, 0.0), &mut rng).unwrap();

        assert_eq!(engine.categories(), vec!["category-000", "category-001", "category-002"]);
        for name in engine.categories() {
            assert_eq!(engine.category_len(name).unwrap(), 20);
        }
    }

    #[test]
    fn synthesize_with_full_overlap_doubles_membership() {
        let mut rng = StdRng::seed_from_u64(1);
        let engine = synthesize(EngineSettings::default(), &args(4, 10, 1.0), &mut rng).unwrap();

        let total: usize = engine
            .categories()
            .iter()
            .map(|n| engine.category_len(n).unwrap())
            .sum();
        assert_eq!(total, 80);
    }

    #[test]
    fn single_category_never_overlaps() {
        let mut rng = StdRng::seed_from_u64(1);
        let engine = synthesize(EngineSettings::default(), &args(1, 10, 1.0), &mut rng).unwrap();

        assert_eq!(engine.category_len("category-000").unwrap(), 10);
    }

    #[test]
    fn bench_runs_and_strategies_agree() {
        run(EngineSettings::default(), args(4, 50, 0.3)).unwrap();
    }

    #[test]
    fn bench_rejects_bad_overlap() {
        assert!(run(EngineSettings::default(), args(2, 5, 1.5)).is_err());
        assert!(run(EngineSettings::default(), args(0, 5, 0.1)).is_err());
    }
}
