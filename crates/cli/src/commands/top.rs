use std::path::Path;

use anyhow::{Context, Result};

use toprank_core::EngineSettings;

use crate::ui;

pub fn run(settings: EngineSettings, dump: &Path, category: &str, k: Option<usize>) -> Result<()> {
    let k = k.unwrap_or(settings.default_k);
    let engine = super::load_engine(settings, dump)?;

    let top = engine
        .top_k(category, k)
        .with_context(|| format!("Cannot rank category '{category}'"))?;

    ui::print_heading(&format!("Top {k} in {category}"));
    ui::print_entities(&top);
    println!();

    Ok(())
}
