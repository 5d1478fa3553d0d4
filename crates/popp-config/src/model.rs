//! Model configuration types.
//!
//! These types match config.json:
//!
//! ```json
//! {
//!   "schema_version": "1.0.0",
//!   "increment": 60,
//!   "periodic_cycle": 86400,
//!   "model": "spectral",
//!   "technique": "aam",
//!   "db_root": "/var/lib/popp/db",
//!   "db_name": "poisson_process",
//!   "regions": ["1", "2"]
//! }
//! ```

use popp_common::RegionId;
use popp_math::spectral::Technique;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::validate::{ValidationError, ValidationResult};

/// Default bucket width in seconds.
pub const DEFAULT_INCREMENT: i64 = 60;

/// Default cycle length in seconds (one day).
pub const DEFAULT_PERIODIC_CYCLE: i64 = 86_400;

/// Default database name used in store directory names.
pub const DEFAULT_DB_NAME: &str = "poisson_process";

/// Application name for XDG directories.
pub(crate) const APP_NAME: &str = "popp";

/// Which rate model each region runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// Folded bucket store with raw Gamma posteriors.
    #[default]
    Periodic,
    /// Periodic store plus a Fourier-smoothed rate surface.
    Spectral,
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelKind::Periodic => write!(f, "periodic"),
            ModelKind::Spectral => write!(f, "spectral"),
        }
    }
}

impl std::str::FromStr for ModelKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "periodic" => Ok(ModelKind::Periodic),
            "spectral" => Ok(ModelKind::Spectral),
            other => Err(ValidationError::InvalidValue {
                field: "model".to_string(),
                message: format!("expected 'periodic' or 'spectral', got '{}'", other),
            }),
        }
    }
}

/// Complete model configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,

    /// Bucket width in seconds.
    #[serde(default = "default_increment")]
    pub increment: i64,

    /// Length of the repeating cycle in seconds.
    #[serde(default = "default_periodic_cycle")]
    pub periodic_cycle: i64,

    #[serde(default)]
    pub model: ModelKind,

    /// Frequency selection used by spectral models.
    #[serde(default)]
    pub technique: Technique,

    /// Root directory of the record stores. Falls back to the XDG data dir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_root: Option<PathBuf>,

    #[serde(default = "default_db_name")]
    pub db_name: String,

    #[serde(default)]
    pub regions: Vec<String>,
}

fn default_schema_version() -> String {
    crate::CONFIG_SCHEMA_VERSION.to_string()
}

fn default_increment() -> i64 {
    DEFAULT_INCREMENT
}

fn default_periodic_cycle() -> i64 {
    DEFAULT_PERIODIC_CYCLE
}

fn default_db_name() -> String {
    DEFAULT_DB_NAME.to_string()
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            schema_version: default_schema_version(),
            increment: DEFAULT_INCREMENT,
            periodic_cycle: DEFAULT_PERIODIC_CYCLE,
            model: ModelKind::default(),
            technique: Technique::default(),
            db_root: None,
            db_name: default_db_name(),
            regions: Vec::new(),
        }
    }
}

impl ModelConfig {
    /// Load a configuration from a JSON file.
    pub fn from_file(path: &Path) -> ValidationResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ValidationError::IoError(format!("Failed to read {}: {}", path.display(), e))
        })?;

        Self::from_json(&content)
    }

    /// Parse a configuration from a JSON string.
    pub fn from_json(content: &str) -> ValidationResult<Self> {
        serde_json::from_str(content).map_err(|e| ValidationError::ParseError(e.to_string()))
    }

    /// Number of whole buckets in one cycle.
    pub fn buckets_per_cycle(&self) -> i64 {
        if self.increment <= 0 {
            return 0;
        }
        self.periodic_cycle / self.increment
    }

    /// Database root, falling back to `$XDG_DATA_HOME/popp/db`.
    pub fn resolved_db_root(&self) -> PathBuf {
        match &self.db_root {
            Some(root) => root.clone(),
            None => default_db_root(),
        }
    }

    /// Directory holding one region's records:
    /// `<db_root>/<region>/<db_name>_<cycle>/<increment>`.
    pub fn store_location(&self, region: &RegionId) -> PathBuf {
        self.resolved_db_root()
            .join(region.as_str())
            .join(format!("{}_{}", self.db_name, self.periodic_cycle))
            .join(self.increment.to_string())
    }

    /// Parse the configured region list into validated ids.
    pub fn region_ids(&self) -> ValidationResult<Vec<RegionId>> {
        self.regions
            .iter()
            .enumerate()
            .map(|(idx, raw)| {
                RegionId::new(raw.clone()).map_err(|e| ValidationError::InvalidValue {
                    field: format!("regions[{}]", idx),
                    message: e.to_string(),
                })
            })
            .collect()
    }
}

/// Default database root under the user's data directory.
pub fn default_db_root() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
        .join("db")
}
