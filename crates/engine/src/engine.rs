use std::collections::{BTreeMap, HashMap};

use tracing::{debug, info};

use toprank_core::{
    EngineSettings, EntityId, IndexedMaxHeap, RankError, Result, ScoredEntity, StrategyKind,
};

use crate::category::Category;
use crate::dump::CategoryDump;
use crate::event::MutationEvent;
use crate::recommend::RecommendationService;

// ---------------------------------------------------------------------------
// RankingEngine
// ---------------------------------------------------------------------------

/// Owns every category's heap.
///
/// Mutations take `&mut self` and reads take `&self`, so the borrow checker
/// enforces one writer at a time while concurrent readers share the engine.
#[derive(Debug, Default)]
pub struct RankingEngine {
    categories: HashMap<String, Category>,
    settings: EngineSettings,
}

impl RankingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: EngineSettings) -> Self {
        Self {
            categories: HashMap::new(),
            settings,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    // -----------------------------------------------------------------------
    // Category lifecycle
    // -----------------------------------------------------------------------

    pub fn create_category(&mut self, name: impl Into<String>) -> Result<()> {
        self.register_category(name, [])
    }

    /// Register a category together with its initial entity set.
    ///
    /// Nothing is registered if the set holds a duplicate id.
    pub fn register_category<I>(&mut self, name: impl Into<String>, entities: I) -> Result<()>
    where
        I: IntoIterator<Item = ScoredEntity>,
    {
        let name = name.into();

        if name.trim().is_empty() {
            return Err(RankError::InvalidArgument(
                "category name must not be empty".into(),
            ));
        }

        if self.categories.contains_key(&name) {
            return Err(RankError::DuplicateCategory(name));
        }

        let heap = IndexedMaxHeap::from_entities(entities)?;
        info!(category = %name, entities = heap.len(), "category registered");
        self.categories.insert(name, Category::new(heap));

        Ok(())
    }

    /// Drop a category and its heap. Returns how many entities it held.
    pub fn retire_category(&mut self, name: &str) -> Result<usize> {
        let category = self
            .categories
            .remove(name)
            .ok_or_else(|| RankError::UnknownCategory(name.to_string()))?;

        info!(category = %name, entities = category.len(), "category retired");
        Ok(category.len())
    }

    pub fn has_category(&self, name: &str) -> bool {
        self.categories.contains_key(name)
    }

    /// Registered category names, sorted.
    pub fn categories(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.categories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn category_len(&self, name: &str) -> Result<usize> {
        Ok(self.category(name)?.len())
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    pub fn insert(&mut self, category: &str, id: EntityId, primary: f64, secondary: u64) -> Result<()> {
        self.category_mut(category)?
            .mutate(|heap| heap.insert(id, primary, secondary))
    }

    pub fn update_primary(&mut self, category: &str, id: EntityId, value: f64) -> Result<()> {
        self.category_mut(category)?
            .mutate(|heap| heap.update_primary(id, value))
    }

    pub fn update_secondary(&mut self, category: &str, id: EntityId, value: u64) -> Result<()> {
        self.category_mut(category)?
            .mutate(|heap| heap.update_secondary(id, value))
    }

    /// Record `by` visits. Returns the new counter.
    pub fn increment_secondary(&mut self, category: &str, id: EntityId, by: u64) -> Result<u64> {
        self.category_mut(category)?
            .mutate(|heap| heap.increment_secondary(id, by))
    }

    /// Remove an entity (and its payload). Returns the removed entity.
    pub fn delete(&mut self, category: &str, id: EntityId) -> Result<ScoredEntity> {
        self.category_mut(category)?.remove(id)
    }

    /// Apply one event pushed by the entity source.
    pub fn apply(&mut self, event: MutationEvent) -> Result<()> {
        debug!(?event, "applying mutation event");

        match event {
            MutationEvent::Inserted { category, entity } => self
                .category_mut(&category)?
                .mutate(|heap| heap.insert_entity(entity)),
            MutationEvent::PrimaryChanged { category, id, value } => {
                self.update_primary(&category, id, value)
            }
            MutationEvent::SecondaryChanged { category, id, value } => {
                self.update_secondary(&category, id, value)
            }
            MutationEvent::Visited { category, id } => {
                self.increment_secondary(&category, id, 1).map(|_| ())
            }
            MutationEvent::Deleted { category, id } => self.delete(&category, id).map(|_| ()),
        }
    }

    // -----------------------------------------------------------------------
    // Payload side table
    // -----------------------------------------------------------------------

    /// Attach extra fields to a live entity. Returns the previous payload.
    pub fn set_payload(
        &mut self,
        category: &str,
        id: EntityId,
        value: serde_json::Value,
    ) -> Result<Option<serde_json::Value>> {
        let category = self.category_mut(category)?;

        if !category.heap().contains(id) {
            return Err(RankError::NotFound { id });
        }

        Ok(category.set_payload(id, value))
    }

    pub fn payload(&self, category: &str, id: EntityId) -> Option<&serde_json::Value> {
        self.categories.get(category)?.payload(id)
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub fn get(&self, category: &str, id: EntityId) -> Result<Option<ScoredEntity>> {
        Ok(self.category(category)?.heap().get(id).copied())
    }

    /// The category's best `k` entities, best first.
    pub fn top_k(&self, category: &str, k: usize) -> Result<Vec<ScoredEntity>> {
        let category = self.category(category)?;
        let snapshot = category.snapshot(k, self.settings.snapshot_cache);

        Ok(snapshot[..k.min(snapshot.len())].to_vec())
    }

    /// Top-K of every category, keyed by name.
    pub fn top_k_per_category(&self, k: usize) -> BTreeMap<String, Vec<ScoredEntity>> {
        self.categories
            .iter()
            .map(|(name, category)| {
                let snapshot = category.snapshot(k, self.settings.snapshot_cache);
                (name.clone(), snapshot[..k.min(snapshot.len())].to_vec())
            })
            .collect()
    }

    /// Rank the union of `categories`, deduplicated by id.
    ///
    /// Unknown names are skipped. `strategy` falls back to the configured
    /// default.
    pub fn recommend(
        &self,
        categories: &[&str],
        k: usize,
        strategy: Option<StrategyKind>,
    ) -> Result<Vec<ScoredEntity>> {
        RecommendationService::new(self).recommend(categories, k, strategy)
    }

    // -----------------------------------------------------------------------
    // Persistence contract
    // -----------------------------------------------------------------------

    pub fn dump_category(&self, name: &str) -> Result<CategoryDump> {
        let heap = self.category(name)?.heap();
        Ok(CategoryDump::new(name, heap.top_k(heap.len())))
    }

    /// Every category, sorted by name.
    pub fn dump_all(&self) -> Vec<CategoryDump> {
        let mut dumps: Vec<CategoryDump> = self
            .categories
            .iter()
            .map(|(name, c)| CategoryDump::new(name.clone(), c.heap().top_k(c.len())))
            .collect();
        dumps.sort_by(|a, b| a.name.cmp(&b.name));
        dumps
    }

    /// Replay dumps as freshly registered categories.
    ///
    /// Stops at the first dump that fails; categories restored before it stay.
    pub fn restore<I>(&mut self, dumps: I) -> Result<()>
    where
        I: IntoIterator<Item = CategoryDump>,
    {
        for dump in dumps {
            self.register_category(dump.name, dump.entities)?;
        }

        Ok(())
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    pub(crate) fn category(&self, name: &str) -> Result<&Category> {
        self.categories
            .get(name)
            .ok_or_else(|| RankError::UnknownCategory(name.to_string()))
    }

    pub(crate) fn lookup(&self, name: &str) -> Option<&Category> {
        self.categories.get(name)
    }

    fn category_mut(&mut self, name: &str) -> Result<&mut Category> {
        self.categories
            .get_mut(name)
            .ok_or_else(|| RankError::UnknownCategory(name.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
