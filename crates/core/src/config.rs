use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::RankError;
use crate::merge::DEFAULT_LINEAR_MAX_INPUTS;

// ---------------------------------------------------------------------------
// Strategy selection
// ---------------------------------------------------------------------------

/// How a multi-category recommendation is aggregated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Merge each category's Top-K snapshot.
    Merge,
    /// Pool every candidate into one throwaway heap.
    Unified,
    /// Decide per request.
    #[default]
    Auto,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Merge => "merge",
            Self::Unified => "unified",
            Self::Auto => "auto",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = RankError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "merge" => Ok(Self::Merge),
            "unified" => Ok(Self::Unified),
            "auto" => Ok(Self::Auto),
            other => Err(RankError::InvalidArgument(format!(
                "unknown strategy '{other}' (expected merge, unified or auto)"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// EngineSettings
// ---------------------------------------------------------------------------

/// Resolved engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineSettings {
    /// `k` used when a caller does not pass one.
    pub default_k: usize,
    /// Strategy used when a request does not name one.
    pub strategy: StrategyKind,
    /// Keep each category's last Top-K snapshot until its next mutation.
    pub snapshot_cache: bool,
    /// `auto` goes unified once `M * k >= ratio * N_total`.
    pub unified_coverage_ratio: f64,
    /// Merges over at most this many inputs use the linear frontier scan.
    pub linear_merge_max_inputs: usize,
    /// Per-request elapsed-time allowance for merging, in milliseconds.
    pub budget_ms: Option<u64>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            default_k: 10,
            strategy: StrategyKind::Auto,
            snapshot_cache: true,
            unified_coverage_ratio: 0.5,
            linear_merge_max_inputs: DEFAULT_LINEAR_MAX_INPUTS,
            budget_ms: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Settings layers
// ---------------------------------------------------------------------------

/// Composable merge for layered configuration.
pub trait Mergeable {
    fn merge(self, other: Self) -> Self;
}

/// One settings file. Every field is optional; a later layer overrides an
/// earlier one field by field.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsLayer {
    pub default_k: Option<usize>,
    pub strategy: Option<StrategyKind>,
    pub snapshot_cache: Option<bool>,
    pub unified_coverage_ratio: Option<f64>,
    pub linear_merge_max_inputs: Option<usize>,
    pub budget_ms: Option<u64>,
}

impl Mergeable for SettingsLayer {
    fn merge(self, other: Self) -> Self {
        Self {
            default_k: other.default_k.or(self.default_k),
            strategy: other.strategy.or(self.strategy),
            snapshot_cache: other.snapshot_cache.or(self.snapshot_cache),
            unified_coverage_ratio: other.unified_coverage_ratio.or(self.unified_coverage_ratio),
            linear_merge_max_inputs: other
                .linear_merge_max_inputs
                .or(self.linear_merge_max_inputs),
            budget_ms: other.budget_ms.or(self.budget_ms),
        }
    }
}

impl SettingsLayer {
    /// Fill unset fields from the defaults.
    pub fn resolve(self) -> EngineSettings {
        let defaults = EngineSettings::default();

        let unified_coverage_ratio = match self.unified_coverage_ratio {
            Some(r) if r.is_finite() && r >= 0.0 => r,
            Some(r) => {
                warn!(ratio = r, "ignoring invalid unifiedCoverageRatio");
                defaults.unified_coverage_ratio
            }
            None => defaults.unified_coverage_ratio,
        };

        EngineSettings {
            default_k: self.default_k.unwrap_or(defaults.default_k),
            strategy: self.strategy.unwrap_or(defaults.strategy),
            snapshot_cache: self.snapshot_cache.unwrap_or(defaults.snapshot_cache),
            unified_coverage_ratio,
            linear_merge_max_inputs: self
                .linear_merge_max_inputs
                .unwrap_or(defaults.linear_merge_max_inputs),
            budget_ms: self.budget_ms.or(defaults.budget_ms),
        }
    }
}

/// Load settings by merging three layers (later wins, field by field):
///
/// 1. `<config_dir>/toprank/settings.json`: global user settings
/// 2. `{project_dir}/.toprank/settings.json`: project settings (committed)
/// 3. `{project_dir}/.toprank/settings.local.json`: local overrides (gitignored)
pub fn load_settings(project_dir: &Path) -> EngineSettings {
    let project = project_dir.join(".toprank");

    let paths: Vec<PathBuf> = vec![
        dirs::config_dir().map(|c| c.join("toprank").join("settings.json")),
        Some(project.join("settings.json")),
        Some(project.join("settings.local.json")),
    ]
    .into_iter()
    .flatten()
    .collect();

    load_settings_from_paths(&paths)
}

/// Load and merge settings from an explicit list of file paths (in order).
/// Missing files are skipped; malformed ones are skipped with a warning.
pub fn load_settings_from_paths(paths: &[PathBuf]) -> EngineSettings {
    paths
        .iter()
        .filter_map(|p| load_layer(p))
        .reduce(Mergeable::merge)
        .unwrap_or_default()
        .resolve()
}

fn load_layer(path: &Path) -> Option<SettingsLayer> {
    if !path.exists() {
        return None;
    }

    match read_layer(path) {
        Ok(layer) => Some(layer),
        Err(e) => {
            warn!(path = %path.display(), error = %format!("{e:#}"), "skipping settings file");
            None
        }
    }
}

fn read_layer(path: &Path) -> Result<SettingsLayer> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("failed to parse {}", path.display()))
}
