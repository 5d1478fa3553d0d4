//! Configuration loading for popp.
//!
//! Resolves the config file (CLI > env > XDG > defaults), parses it and
//! validates it semantically before any model is built.

pub use popp_config::{ConfigSource, ModelConfig, ValidationError};

use std::path::{Path, PathBuf};
use thiserror::Error;

use popp_config::{resolve_config, validate_config};

/// Errors that can occur during config loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Invalid config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: ValidationError,
    },

    #[error("Semantic validation failed: {0}")]
    Validation(#[from] ValidationError),
}

impl ConfigError {
    /// Numeric error code, shared with [`ValidationError::code`].
    pub fn code(&self) -> u32 {
        match self {
            ConfigError::NotFound { .. } => 10,
            ConfigError::ParseError { source, .. } => source.code(),
            ConfigError::Validation(source) => source.code(),
        }
    }
}

/// Resolved configuration with provenance information.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: ModelConfig,
    /// Path to the config file (None if using defaults).
    pub path: Option<PathBuf>,
    pub source: ConfigSource,
}

/// Load and validate the configuration.
///
/// An explicit CLI path that does not exist is an error. Without any file
/// the built-in defaults are validated like a loaded file would be.
pub fn load_config(cli_path: Option<&Path>) -> Result<ResolvedConfig, ConfigError> {
    let resolved = resolve_config(cli_path);

    let config = match &resolved.path {
        Some(path) => {
            if !path.exists() {
                return Err(ConfigError::NotFound { path: path.clone() });
            }
            ModelConfig::from_file(path).map_err(|source| ConfigError::ParseError {
                path: path.clone(),
                source,
            })?
        }
        None => ModelConfig::default(),
    };

    validate_config(&config)?;

    Ok(ResolvedConfig {
        config,
        path: resolved.path,
        source: resolved.source,
    })
}
