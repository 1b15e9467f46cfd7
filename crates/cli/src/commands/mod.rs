pub mod bench;
pub mod recommend;
pub mod top;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use toprank_core::EngineSettings;
use toprank_engine::{CategoryDump, RankingEngine};

/// Build an engine from a JSON array of category dumps.
pub fn load_engine(settings: EngineSettings, path: &Path) -> Result<RankingEngine> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let dumps: Vec<CategoryDump> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    let mut engine = RankingEngine::with_settings(settings);
    engine
        .restore(dumps)
        .with_context(|| format!("Failed to restore {}", path.display()))?;

    info!(
        categories = engine.categories().len(),
        path = %path.display(),
        "engine restored"
    );

    Ok(engine)
}
