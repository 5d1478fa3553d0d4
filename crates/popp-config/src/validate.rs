//! Configuration validation errors and semantic validation.

use std::collections::HashSet;

use popp_math::spectral::SAMPLES_PER_COMPONENT;
use thiserror::Error;

use crate::model::{ModelConfig, ModelKind};

/// Validation result type.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Minimum buckets per cycle for a spectral model.
pub const MIN_SPECTRAL_BUCKETS: i64 = SAMPLES_PER_COMPONENT as i64;

/// Configuration validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Semantic validation failed: {0}")]
    SemanticError(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },
}

impl ValidationError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            ValidationError::IoError(_) => 60,
            ValidationError::ParseError(_) => 61,
            ValidationError::SemanticError(_) => 63,
            ValidationError::InvalidValue { .. } => 65,
            ValidationError::VersionMismatch { .. } => 66,
        }
    }
}

/// Validate a model configuration semantically.
pub fn validate_config(config: &ModelConfig) -> ValidationResult<()> {
    if config.schema_version != crate::CONFIG_SCHEMA_VERSION {
        return Err(ValidationError::VersionMismatch {
            expected: crate::CONFIG_SCHEMA_VERSION.to_string(),
            actual: config.schema_version.clone(),
        });
    }

    if config.increment <= 0 {
        return Err(ValidationError::InvalidValue {
            field: "increment".to_string(),
            message: format!("Must be positive, got {}", config.increment),
        });
    }

    if config.periodic_cycle <= 0 {
        return Err(ValidationError::InvalidValue {
            field: "periodic_cycle".to_string(),
            message: format!("Must be positive, got {}", config.periodic_cycle),
        });
    }

    if config.model == ModelKind::Spectral && config.buckets_per_cycle() < MIN_SPECTRAL_BUCKETS {
        return Err(ValidationError::SemanticError(format!(
            "spectral model needs at least {} buckets per cycle, got {} (periodic_cycle={}, increment={})",
            MIN_SPECTRAL_BUCKETS,
            config.buckets_per_cycle(),
            config.periodic_cycle,
            config.increment,
        )));
    }

    if config.db_name.trim().is_empty() || config.db_name.contains(|c| c == '/' || c == '\\') {
        return Err(ValidationError::InvalidValue {
            field: "db_name".to_string(),
            message: format!("Must be a non-empty file name, got '{}'", config.db_name),
        });
    }

    validate_regions(config)
}

/// Region ids must be non-empty, path-safe and unique.
fn validate_regions(config: &ModelConfig) -> ValidationResult<()> {
    if config.regions.is_empty() {
        return Err(ValidationError::SemanticError(
            "regions must list at least one region".to_string(),
        ));
    }

    let ids = config.region_ids()?;
    let mut seen = HashSet::with_capacity(ids.len());
    for id in &ids {
        if !seen.insert(id.as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "regions".to_string(),
                message: format!("duplicate region '{}'", id),
            });
        }
    }

    Ok(())
}
