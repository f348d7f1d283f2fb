//! Configuration Loader
//!
//! Layers built-in defaults, an optional configuration file, and environment
//! overrides (`REFINE__BATCH__MAX_CONCURRENCY=8`) into an [`EngineConfig`].

use super::EngineConfig;
use crate::error::ConfigurationError;
use config::{Config, Environment, File};
use std::env;
use std::path::PathBuf;
use tracing::{debug, info};

const ENV_PREFIX: &str = "REFINE";
const ENV_SEPARATOR: &str = "__";

/// Builder for loading [`EngineConfig`]
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    file: Option<PathBuf>,
    use_environment: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            file: None,
            use_environment: true,
        }
    }

    /// Read overrides from a YAML, TOML, or JSON file (format from extension)
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Ignore `REFINE__*` environment variables
    pub fn without_environment(mut self) -> Self {
        self.use_environment = false;
        self
    }

    /// Load and validate the layered configuration
    pub fn load(&self) -> Result<EngineConfig, ConfigurationError> {
        let environment = detect_environment();
        debug!(
            environment = %environment,
            file = ?self.file,
            use_environment = self.use_environment,
            "Loading engine configuration"
        );

        let mut builder = Config::builder().add_source(Config::try_from(&EngineConfig::default())?);

        if let Some(path) = &self.file {
            builder = builder.add_source(File::from(path.as_path()).required(true));
        }

        if self.use_environment {
            builder = builder.add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            );
        }

        let config: EngineConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        info!(
            environment = %environment,
            max_concurrency = config.batch.max_concurrency,
            refinement_timeout_ms = config.refinement.timeout_ms,
            cache_enabled = config.refinement.cache.enabled,
            "Engine configuration loaded"
        );

        Ok(config)
    }
}

/// Current environment name from `REFINE_ENV` or `APP_ENV`
pub fn detect_environment() -> String {
    env::var("REFINE_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}
