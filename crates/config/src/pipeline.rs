use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use sitemaster_core::normalize::CleaningRules;
use sitemaster_core::Field;

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_name")]
    pub name: String,
    pub input: InputConfig,
    #[serde(default)]
    pub batching: BatchingConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub scorer: ScorerConfig,
    #[serde(default)]
    pub paths: PathsConfig,
}

fn default_name() -> String {
    "site-master".into()
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct InputConfig {
    pub file: String,
    /// Country assigned to rows when the input has no `COUNTRY` column.
    #[serde(default)]
    pub country: Option<String>,
    /// Column carrying the numeric record id. Row position (1-based) when unset.
    #[serde(default)]
    pub id_column: Option<String>,
    /// Raw header → standardized column name.
    #[serde(default)]
    pub rename: BTreeMap<String, String>,
    #[serde(default = "default_clean_columns")]
    pub clean_columns: Vec<String>,
    #[serde(default = "default_address_lines")]
    pub address_lines: Vec<String>,
}

fn default_clean_columns() -> Vec<String> {
    CleaningRules::default().clean_columns
}

fn default_address_lines() -> Vec<String> {
    CleaningRules::default().address_lines
}

impl InputConfig {
    pub fn cleaning_rules(&self) -> CleaningRules {
        CleaningRules {
            clean_columns: self.clean_columns.clone(),
            address_lines: self.address_lines.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Batching
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct BatchingConfig {
    #[serde(default = "default_max_size")]
    pub max_size: usize,
}

fn default_max_size() -> usize {
    2000
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self {
            max_size: default_max_size(),
        }
    }
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

/// Thresholds handed to the scorer with every comparison.
///
/// `thresholds` is keyed by standardized column name (`SITE_NAME`, ...).
/// Fields missing from the table fall back to [`ScoringConfig::default_threshold`].
#[derive(Debug, Clone, Deserialize)]
pub struct ScoringConfig {
    #[serde(default)]
    pub thresholds: BTreeMap<String, f64>,
    #[serde(default = "default_scaling_factor")]
    pub scaling_factor: f64,
    #[serde(default = "default_total_threshold")]
    pub total_threshold: f64,
}

fn default_scaling_factor() -> f64 {
    3.0
}

fn default_total_threshold() -> f64 {
    4.0
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            thresholds: BTreeMap::new(),
            scaling_factor: default_scaling_factor(),
            total_threshold: default_total_threshold(),
        }
    }
}

impl ScoringConfig {
    pub fn default_threshold(field: Field) -> f64 {
        match field {
            Field::ConcatAddress => 0.60,
            _ => 0.75,
        }
    }

    pub fn threshold(&self, field: Field) -> f64 {
        self.thresholds
            .get(field.column())
            .copied()
            .unwrap_or_else(|| Self::default_threshold(field))
    }

    /// Highest total a pair can reach (a record against itself).
    pub fn max_total(&self) -> f64 {
        4.0 + self.scaling_factor
    }
}

// ---------------------------------------------------------------------------
// Scorer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScorerKind {
    /// In-process normalized Levenshtein scorer.
    #[default]
    Builtin,
    /// External program invoked once per comparison.
    Command,
}

impl std::fmt::Display for ScorerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Builtin => write!(f, "builtin"),
            Self::Command => write!(f, "command"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScorerConfig {
    #[serde(default)]
    pub kind: ScorerKind,
    #[serde(default)]
    pub command: Option<String>,
    /// Leading arguments (e.g. the script path) placed before the generated ones.
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    600
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            kind: ScorerKind::Builtin,
            command: None,
            args: Vec::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ScorerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_raw_scores")]
    pub raw_scores: PathBuf,
    #[serde(default = "default_cleaned_scores")]
    pub cleaned_scores: PathBuf,
    #[serde(default = "default_master_data")]
    pub master_data: PathBuf,
    #[serde(default = "default_staging")]
    pub staging: PathBuf,
}

fn default_raw_scores() -> PathBuf {
    PathBuf::from("Raw_Scores")
}

fn default_cleaned_scores() -> PathBuf {
    PathBuf::from("Cleaned_Scores")
}

fn default_master_data() -> PathBuf {
    PathBuf::from("Master_Data")
}

fn default_staging() -> PathBuf {
    Path::new("Master_Data").join("Recursive_Staging_Area")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw_scores: default_raw_scores(),
            cleaned_scores: default_cleaned_scores(),
            master_data: default_master_data(),
            staging: default_staging(),
        }
    }
}

impl PathsConfig {
    /// Resolve relative directories against `base` (normally the config file's directory).
    pub fn resolve_against(&self, base: &Path) -> PathsConfig {
        let join = |p: &PathBuf| if p.is_absolute() { p.clone() } else { base.join(p) };
        PathsConfig {
            raw_scores: join(&self.raw_scores),
            cleaned_scores: join(&self.cleaned_scores),
            master_data: join(&self.master_data),
            staging: join(&self.staging),
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl PipelineConfig {
    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig =
            toml::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.input.file.trim().is_empty() {
            return Err(ConfigError::Validation("input.file must not be empty".into()));
        }

        if self.batching.max_size == 0 {
            return Err(ConfigError::Validation(
                "batching.max_size must be at least 1".into(),
            ));
        }

        for (column, value) in &self.scoring.thresholds {
            if Field::from_column(column).is_none() {
                return Err(ConfigError::Validation(format!(
                    "scoring.thresholds: unknown field '{column}'"
                )));
            }
            if !(0.0..=1.0).contains(value) {
                return Err(ConfigError::Validation(format!(
                    "scoring.thresholds.{column} must be within [0, 1], got {value}"
                )));
            }
        }

        if !(self.scoring.scaling_factor.is_finite() && self.scoring.scaling_factor > 0.0) {
            return Err(ConfigError::Validation(format!(
                "scoring.scaling_factor must be a positive number, got {}",
                self.scoring.scaling_factor
            )));
        }

        // NaN falls outside every range
        if !(0.0..=self.scoring.max_total()).contains(&self.scoring.total_threshold) {
            return Err(ConfigError::Validation(format!(
                "scoring.total_threshold must be within [0, {}], got {}",
                self.scoring.max_total(),
                self.scoring.total_threshold
            )));
        }

        if self.scorer.kind == ScorerKind::Command
            && self.scorer.command.as_deref().map_or(true, |c| c.trim().is_empty())
        {
            return Err(ConfigError::Validation(
                "scorer.command is required when scorer.kind = \"command\"".into(),
            ));
        }

        if self.scorer.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "scorer.timeout_secs must be at least 1".into(),
            ));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
