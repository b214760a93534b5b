use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::diff::{ThresholdTable, Thresholds};
use crate::leaderboard::SourceId;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    /// Keyed by source slug; unset fields fall back to the source default.
    #[serde(default)]
    pub thresholds: BTreeMap<String, ThresholdOverride>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default = "default_sources_enabled")]
    pub enabled: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ThresholdOverride {
    #[serde(default)]
    pub rank_threshold: Option<i64>,
    #[serde(default)]
    pub score_ratio_threshold: Option<f64>,
    #[serde(default)]
    pub top_band: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("unknown source in config: {0}")]
    UnknownSource(String),
    #[error("{slug}: rank_threshold must be a positive integer, got {value}")]
    RankThreshold { slug: String, value: i64 },
    #[error("{slug}: score_ratio_threshold must be a positive number, got {value}")]
    ScoreRatioThreshold { slug: String, value: f64 },
    #[error("{slug}: top_band must be a positive integer, got {value}")]
    TopBand { slug: String, value: i64 },
    #[error("history.lookback_days must be at least 1")]
    LookbackDays,
    #[error("sources.enabled is empty")]
    NoSources,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub db_path: Option<String>,
    pub enabled_sources: Option<Vec<String>>,
}

impl Config {
    pub fn default_path() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".config/leaderboard-watch/config.toml")
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(|p| p.to_path_buf())
            .unwrap_or_else(Self::default_path);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(&path)
            .with_context(|| format!("failed reading config: {}", path.display()))?;
        let parsed: Self = toml::from_str(&data)
            .with_context(|| format!("failed parsing TOML config: {}", path.display()))?;
        Ok(parsed)
    }

    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(db_path) = overrides.db_path {
            self.storage.db_path = db_path;
        }
        if let Some(sources) = overrides.enabled_sources {
            self.sources.enabled = sources;
        }
    }

    /// Resolves the per-source threshold table, rejecting any value that is
    /// not a valid positive number.
    pub fn threshold_table(&self) -> Result<ThresholdTable, ConfigError> {
        let mut resolved = BTreeMap::new();
        for (key, raw) in &self.thresholds {
            let source =
                SourceId::from_str(key).map_err(|_| ConfigError::UnknownSource(key.clone()))?;
            resolved.insert(source, raw.resolve(source, key)?);
        }
        Ok(ThresholdTable::with_overrides(resolved))
    }

    pub fn enabled_sources(&self) -> Result<Vec<SourceId>, ConfigError> {
        let mut out = Vec::new();
        for raw in &self.sources.enabled {
            let source =
                SourceId::from_str(raw).map_err(|_| ConfigError::UnknownSource(raw.clone()))?;
            out.push(source);
        }
        if out.is_empty() {
            return Err(ConfigError::NoSources);
        }
        out.sort();
        out.dedup();
        Ok(out)
    }

    /// Everything that must hold before a run may touch any data.
    pub fn validate(&self) -> Result<ValidatedConfig, ConfigError> {
        if self.history.lookback_days == 0 {
            return Err(ConfigError::LookbackDays);
        }
        Ok(ValidatedConfig {
            thresholds: self.threshold_table()?,
            sources: self.enabled_sources()?,
            db_path: self.resolved_db_path(),
            lookback_days: self.history.lookback_days,
        })
    }

    pub fn write_template(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed creating config directory: {}", parent.display())
            })?;
        }
        fs::write(path, Self::default_template())
            .with_context(|| format!("failed writing config template: {}", path.display()))
    }

    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }

    pub fn default_template() -> String {
        let template = r#"[storage]
db_path = "~/.local/share/leaderboard-watch/state.db"

[history]
lookback_days = 60

[sources]
enabled = ["arena_text", "arena_vision", "arena_code", "vellum", "artificial_analysis", "llmstats", "openrouter"]

# Per-source overrides. Unset keys keep the built-in default.
[thresholds.arena_text]
rank_threshold = 2
score_ratio_threshold = 0.015

[thresholds.openrouter]
rank_threshold = 2
score_ratio_threshold = 0.10
# top_band = 10
"#;
        template.to_string()
    }
}

impl ThresholdOverride {
    fn resolve(&self, source: SourceId, key: &str) -> Result<Thresholds, ConfigError> {
        let mut thresholds = Thresholds::default_for(source);
        if let Some(value) = self.rank_threshold {
            thresholds.rank_threshold = positive_u32(value).ok_or(ConfigError::RankThreshold {
                slug: key.to_string(),
                value,
            })?;
        }
        if let Some(value) = self.score_ratio_threshold {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::ScoreRatioThreshold {
                    slug: key.to_string(),
                    value,
                });
            }
            thresholds.score_ratio_threshold = value;
        }
        if let Some(value) = self.top_band {
            thresholds.top_band = Some(positive_u32(value).ok_or(ConfigError::TopBand {
                slug: key.to_string(),
                value,
            })?);
        }
        Ok(thresholds)
    }
}

/// Config after validation, in the shape the run needs.
#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    pub thresholds: ThresholdTable,
    pub sources: Vec<SourceId>,
    pub db_path: PathBuf,
    pub lookback_days: u32,
}

fn positive_u32(value: i64) -> Option<u32> {
    u32::try_from(value).ok().filter(|v| *v >= 1)
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            lookback_days: default_lookback_days(),
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            enabled: default_sources_enabled(),
        }
    }
}

fn default_db_path() -> String {
    "~/.local/share/leaderboard-watch/state.db".to_string()
}

fn default_lookback_days() -> u32 {
    60
}

fn default_sources_enabled() -> Vec<String> {
    SourceId::ALL
        .iter()
        .map(|s| s.as_slug().to_string())
        .collect()
}
