//! Multi-category recommendation: resolve names, pick a strategy, dedup,
//! truncate.

use std::collections::HashSet;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use toprank_core::{Result, ScoredEntity, StrategyKind};
use toprank_utils::Budget;

use crate::category::Category;
use crate::engine::RankingEngine;
use crate::strategy::{self, MergeStrategy, RecommendationStrategy, TopDistinct, UnifiedStrategy};

// ---------------------------------------------------------------------------
// Request / response
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct RecommendRequest {
    pub categories: Vec<String>,
    pub k: usize,
    /// `None` uses the engine's configured strategy.
    pub strategy: Option<StrategyKind>,
    /// `None` uses the engine's configured budget, if any.
    pub budget: Option<Duration>,
}

impl RecommendRequest {
    pub fn new<I, S>(categories: I, k: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            categories: categories.into_iter().map(Into::into).collect(),
            k,
            strategy: None,
            budget: None,
        }
    }

    pub fn with_strategy(mut self, strategy: StrategyKind) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = Some(budget);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    /// Distinct ids, best first, at most `k`.
    pub entities: Vec<ScoredEntity>,
    /// The strategy that actually ran (`auto` already resolved).
    pub strategy: StrategyKind,
    /// Requested names that are not registered.
    pub skipped: Vec<String>,
}

// ---------------------------------------------------------------------------
// RecommendationService
// ---------------------------------------------------------------------------

/// Read-only view over an engine that answers multi-category requests.
///
/// Holds `&RankingEngine`, so any number of services can run in parallel
/// while no mutation is in flight.
pub struct RecommendationService<'e> {
    engine: &'e RankingEngine,
}

impl<'e> RecommendationService<'e> {
    pub fn new(engine: &'e RankingEngine) -> Self {
        Self { engine }
    }

    pub fn recommend(
        &self,
        categories: &[&str],
        k: usize,
        strategy: Option<StrategyKind>,
    ) -> Result<Vec<ScoredEntity>> {
        let mut request = RecommendRequest::new(categories.iter().copied(), k);
        request.strategy = strategy;

        Ok(self.recommend_detailed(&request)?.entities)
    }

    pub fn recommend_detailed(&self, request: &RecommendRequest) -> Result<Recommendation> {
        let settings = self.engine.settings();
        let (sources, skipped) = self.resolve(&request.categories);
        let k = request.k;

        let requested = request.strategy.unwrap_or(settings.strategy);
        let resolved = match requested {
            StrategyKind::Auto => strategy::choose(&sources, k, settings),
            other => other,
        };

        if k == 0 || sources.is_empty() {
            return Ok(Recommendation {
                entities: Vec::new(),
                strategy: resolved,
                skipped,
            });
        }

        let budget = request
            .budget
            .or(settings.budget_ms.map(Duration::from_millis))
            .map(Budget::new);

        let merge = MergeStrategy {
            k,
            use_cache: settings.snapshot_cache,
            linear_max_inputs: settings.linear_merge_max_inputs,
        };
        let unified = UnifiedStrategy { k };
        let runner: &dyn RecommendationStrategy = match resolved {
            StrategyKind::Unified => &unified,
            _ => &merge,
        };

        let mut sink = TopDistinct::new(k);
        runner.aggregate(&sources, &mut sink, budget.as_ref())?;

        debug!(
            strategy = %runner.kind(),
            categories = sources.len(),
            k,
            returned = sink.len(),
            "recommendation served"
        );

        Ok(Recommendation {
            entities: sink.into_vec(),
            strategy: runner.kind(),
            skipped,
        })
    }

    /// Look up each distinct requested name. Unknown names are logged and
    /// returned separately; they are not an error.
    fn resolve(&self, names: &[String]) -> (Vec<&'e Category>, Vec<String>) {
        let mut seen = HashSet::with_capacity(names.len());
        let mut sources = Vec::with_capacity(names.len());
        let mut skipped = Vec::new();

        for name in names {
            if !seen.insert(name.as_str()) {
                continue;
            }

            match self.engine.lookup(name) {
                Some(category) => sources.push(category),
                None => {
                    warn!(category = %name, "unknown category in recommendation request, skipping");
                    skipped.push(name.clone());
                }
            }
        }

        (sources, skipped)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use toprank_core::{EngineSettings, EntityId, RankError, composite_cmp, is_sorted_desc};

    const STRATEGIES: [StrategyKind; 3] =
        [StrategyKind::Merge, StrategyKind::Unified, StrategyKind::Auto];

    fn ids(v: &[ScoredEntity]) -> Vec<EntityId> {
        v.iter().map(|e| e.id).collect()
    }

    fn assert_distinct(v: &[ScoredEntity]) {
        let unique: HashSet<EntityId> = v.iter().map(|e| e.id).collect();
        assert_eq!(unique.len(), v.len(), "duplicate ids in {:?}", ids(v));
    }

    /// typeX holds 3 entities, typeY holds 4, and ids 2 and 3 sit in both.
    fn overlapping_engine() -> RankingEngine {
        let mut engine = RankingEngine::new();
        engine
            .register_category(
                "typeX",
                [
                    ScoredEntity::new(1, 4.8, 10),
                    ScoredEntity::new(2, 4.5, 30),
                    ScoredEntity::new(3, 4.1, 5),
                ],
            )
            .unwrap();
        engine
            .register_category(
                "typeY",
                [
                    ScoredEntity::new(2, 4.5, 30),
                    ScoredEntity::new(3, 4.1, 5),
                    ScoredEntity::new(4, 4.9, 1),
                    ScoredEntity::new(5, 3.0, 99),
                ],
            )
            .unwrap();
        engine
    }

    /// Random categories where roughly `overlap` of the ids also appear in
    /// a second category with identical scores. Keys are unique per id so
    /// the expected order is fully determined.
    fn random_engine(seed: u64, categories: usize, overlap: f64) -> RankingEngine {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut engine = RankingEngine::new();
        let mut members: Vec<Vec<ScoredEntity>> = vec![Vec::new(); categories];
        let mut next_id: EntityId = 0;

        for c in 0..categories {
            let n = rng.random_range(0..60);
            for _ in 0..n {
                let e = ScoredEntity::new(next_id, rng.random_range(0..50) as f64 / 10.0, next_id);
                next_id += 1;
                members[c].push(e);

                if categories > 1 && rng.random_bool(overlap) {
                    let other = (c + rng.random_range(1..categories)) % categories;
                    members[other].push(e);
                }
            }
        }

        for (c, entities) in members.into_iter().enumerate() {
            engine.register_category(format!("c{c}"), entities).unwrap();
        }

        engine
    }

    fn reference(engine: &RankingEngine, names: &[&str], k: usize) -> Vec<ScoredEntity> {
        let mut seen = HashSet::new();
        let mut all: Vec<ScoredEntity> = names
            .iter()
            .filter_map(|n| engine.dump_category(n).ok())
            .flat_map(|d| d.entities)
            .filter(|e| seen.insert(e.id))
            .collect();
        all.sort_by(|a, b| composite_cmp(b, a));
        all.truncate(k);
        all
    }

    // -----------------------------------------------------------------------
    // Concrete scenario
    // -----------------------------------------------------------------------

    #[test]
    fn overlapping_categories_yield_distinct_sorted_results() {
        let engine = overlapping_engine();

        for strategy in STRATEGIES {
            let got = engine
                .recommend(&["typeX", "typeY"], 5, Some(strategy))
                .unwrap();

            assert!(got.len() <= 5);
            assert_distinct(&got);
            assert!(is_sorted_desc(&got), "{strategy}");
            assert_eq!(ids(&got), vec![4, 1, 2, 3, 5], "{strategy}");
        }
    }

    // -----------------------------------------------------------------------
    // Degenerate inputs
    // -----------------------------------------------------------------------

    #[test]
    fn no_categories_is_empty() {
        let engine = overlapping_engine();
        assert!(engine.recommend(&[], 5, None).unwrap().is_empty());
    }

    #[test]
    fn zero_k_is_empty() {
        let engine = overlapping_engine();
        for strategy in STRATEGIES {
            assert!(engine.recommend(&["typeX"], 0, Some(strategy)).unwrap().is_empty());
        }
    }

    #[test]
    fn unknown_categories_are_skipped_and_reported() {
        let engine = overlapping_engine();
        let service = RecommendationService::new(&engine);

        let rec = service
            .recommend_detailed(&RecommendRequest::new(["nowhere", "typeX", "gone"], 2))
            .unwrap();

        assert_eq!(ids(&rec.entities), vec![1, 2]);
        assert_eq!(rec.skipped, vec!["nowhere", "gone"]);
    }

    #[test]
    fn only_unknown_categories_is_empty() {
        let engine = overlapping_engine();
        let rec = RecommendationService::new(&engine)
            .recommend_detailed(&RecommendRequest::new(["nowhere"], 3))
            .unwrap();

        assert!(rec.entities.is_empty());
        assert_eq!(rec.skipped, vec!["nowhere"]);
    }

    #[test]
    fn repeated_category_names_count_once() {
        let engine = overlapping_engine();

        assert_eq!(
            engine.recommend(&["typeX", "typeX"], 10, Some(StrategyKind::Unified)).unwrap(),
            engine.recommend(&["typeX"], 10, Some(StrategyKind::Unified)).unwrap()
        );
    }

    #[test]
    fn k_larger_than_union_returns_everything() {
        let engine = overlapping_engine();
        for strategy in STRATEGIES {
            let got = engine.recommend(&["typeX", "typeY"], 100, Some(strategy)).unwrap();
            assert_eq!(got.len(), 5);
        }
    }

    // -----------------------------------------------------------------------
    // Strategy resolution and budget
    // -----------------------------------------------------------------------

    #[test]
    fn explicit_strategy_is_reported() {
        let engine = overlapping_engine();
        let service = RecommendationService::new(&engine);

        for strategy in [StrategyKind::Merge, StrategyKind::Unified] {
            let rec = service
                .recommend_detailed(&RecommendRequest::new(["typeX"], 2).with_strategy(strategy))
                .unwrap();
            assert_eq!(rec.strategy, strategy);
        }
    }

    #[test]
    fn auto_is_resolved() {
        let engine = overlapping_engine();
        let rec = RecommendationService::new(&engine)
            .recommend_detailed(&RecommendRequest::new(["typeX", "typeY"], 3))
            .unwrap();

        assert_ne!(rec.strategy, StrategyKind::Auto);
    }

    #[test]
    fn configured_default_strategy_applies() {
        let settings = EngineSettings {
            strategy: StrategyKind::Unified,
            ..Default::default()
        };
        let mut engine = RankingEngine::with_settings(settings);
        engine
            .register_category("a", [ScoredEntity::new(1, 1.0, 0)])
            .unwrap();

        let rec = RecommendationService::new(&engine)
            .recommend_detailed(&RecommendRequest::new(["a"], 1))
            .unwrap();
        assert_eq!(rec.strategy, StrategyKind::Unified);
    }

    #[test]
    fn zero_budget_surfaces_budget_exceeded() {
        let engine = overlapping_engine();
        let service = RecommendationService::new(&engine);

        for strategy in [StrategyKind::Merge, StrategyKind::Unified] {
            let err = service
                .recommend_detailed(
                    &RecommendRequest::new(["typeX", "typeY"], 3)
                        .with_strategy(strategy)
                        .with_budget(Duration::ZERO),
                )
                .unwrap_err();
            assert!(matches!(err, RankError::BudgetExceeded { .. }), "{strategy}");
        }
    }

    // -----------------------------------------------------------------------
    // Shared property suite: every strategy returns the reference answer
    // -----------------------------------------------------------------------

    #[test]
    fn strategies_match_reference_on_random_engines() {
        for seed in 0..40 {
            let engine = random_engine(seed, 1 + (seed as usize % 7), 0.2);
            let names = engine.categories();
            let mut rng = StdRng::seed_from_u64(seed ^ 0xabcd);

            for _ in 0..5 {
                let picked: Vec<&str> = names
                    .iter()
                    .copied()
                    .filter(|_| rng.random_bool(0.7))
                    .collect();
                let k = rng.random_range(0..40);
                let expected = reference(&engine, &picked, k);

                for strategy in STRATEGIES {
                    let got = engine.recommend(&picked, k, Some(strategy)).unwrap();

                    assert_distinct(&got);
                    assert!(is_sorted_desc(&got));
                    assert_eq!(
                        got.iter().map(ScoredEntity::key).collect::<Vec<_>>(),
                        expected.iter().map(ScoredEntity::key).collect::<Vec<_>>(),
                        "seed {seed}, {strategy}, k {k}, categories {picked:?}"
                    );
                    assert_eq!(
                        ids(&got).into_iter().collect::<HashSet<_>>(),
                        ids(&expected).into_iter().collect::<HashSet<_>>(),
                        "seed {seed}, {strategy}, k {k}"
                    );
                }
            }
        }
    }

    #[test]
    fn recommend_is_repeatable_without_mutation() {
        let engine = random_engine(99, 5, 0.3);
        let names = engine.categories();

        for strategy in STRATEGIES {
            let first = engine.recommend(&names, 12, Some(strategy)).unwrap();
            for _ in 0..3 {
                assert_eq!(engine.recommend(&names, 12, Some(strategy)).unwrap(), first);
            }
        }
    }

    #[test]
    fn recommend_sees_mutations() {
        let mut engine = overlapping_engine();
        let before = engine.recommend(&["typeX", "typeY"], 1, Some(StrategyKind::Merge)).unwrap();
        assert_eq!(ids(&before), vec![4]);

        engine.update_primary("typeX", 3, 5.0).unwrap();

        for strategy in STRATEGIES {
            let after = engine.recommend(&["typeX", "typeY"], 1, Some(strategy)).unwrap();
            assert_eq!(ids(&after), vec![3], "{strategy}");
        }
    }

    #[test]
    fn concurrent_readers_agree() {
        let engine = random_engine(7, 6, 0.25);
        let names = engine.categories();
        let expected = engine.recommend(&names, 20, Some(StrategyKind::Unified)).unwrap();

        std::thread::scope(|s| {
            let handles: Vec<_> = STRATEGIES
                .iter()
                .cycle()
                .take(8)
                .map(|&strategy| {
                    let engine = &engine;
                    let names = &names;
                    s.spawn(move || engine.recommend(names, 20, Some(strategy)).unwrap())
                })
                .collect();

            for handle in handles {
                let got = handle.join().unwrap();
                assert_eq!(
                    got.iter().map(ScoredEntity::key).collect::<Vec<_>>(),
                    expected.iter().map(ScoredEntity::key).collect::<Vec<_>>()
                );
            }
        });
    }
}
