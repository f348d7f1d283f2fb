//! # Engine Configuration
//!
//! Two layers of configuration:
//!
//! - **Per-instance configs** ([`RefinementConfig`], [`CacheSettings`]) are immutable
//!   builder-style values fixed when a refinement is constructed.
//! - **Process defaults** ([`EngineConfig`]) are loaded once from built-in defaults,
//!   an optional YAML/TOML/JSON file, and `REFINE__SECTION__KEY` environment
//!   overrides, then used to seed per-instance and per-run configs.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use refine_core::config::ConfigLoader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = ConfigLoader::new().load()?;
//! let refinement = engine.refinement_defaults("Email already registered");
//! let batch = engine.batch_defaults();
//! # let _ = (refinement, batch);
//! # Ok(())
//! # }
//! ```

pub mod loader;

pub use loader::ConfigLoader;

use crate::batch::BatchRunConfig;
use crate::constants;
use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Eviction strategy applied once the cache exceeds its size bound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStrategy {
    /// Evicts the entries with the oldest insertion timestamp.
    /// Re-storing a key refreshes its timestamp; reads do not.
    #[default]
    Lru,
    /// Evicts in first-insertion order
    Fifo,
}

/// Size and age bounds for an enabled result cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
    pub max_size: usize,
    pub ttl: Duration,
    pub strategy: CacheStrategy,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_size: constants::cache::DEFAULT_MAX_SIZE,
            ttl: Duration::from_millis(constants::cache::DEFAULT_TTL_MS),
            strategy: CacheStrategy::Lru,
        }
    }
}

impl CacheSettings {
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_strategy(mut self, strategy: CacheStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}

/// Configuration of one async refinement, fixed at construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefinementConfig {
    /// Message reported when the predicate rejects a value
    pub message: String,
    /// Quiet period before execution; zero disables debouncing
    pub debounce: Duration,
    /// Overrides the debounce key derived from the instance id and delay
    pub debounce_key: Option<String>,
    /// `None` disables caching
    pub cache: Option<CacheSettings>,
    /// Deadline for one predicate execution including retries
    pub timeout: Duration,
    pub max_retries: u32,
    /// Share one in-flight execution among concurrent identical calls
    pub cancel_previous: bool,
}

impl Default for RefinementConfig {
    fn default() -> Self {
        Self {
            message: constants::refinement::DEFAULT_MESSAGE.to_string(),
            debounce: Duration::ZERO,
            debounce_key: None,
            cache: None,
            timeout: Duration::from_millis(constants::refinement::DEFAULT_TIMEOUT_MS),
            max_retries: constants::refinement::DEFAULT_MAX_RETRIES,
            cancel_previous: false,
        }
    }
}

impl RefinementConfig {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn with_debounce(mut self, delay: Duration) -> Self {
        self.debounce = delay;
        self
    }

    pub fn with_debounce_key(mut self, key: impl Into<String>) -> Self {
        self.debounce_key = Some(key.into());
        self
    }

    pub fn with_cache(mut self, settings: CacheSettings) -> Self {
        self.cache = Some(settings);
        self
    }

    pub fn with_default_cache(self) -> Self {
        self.with_cache(CacheSettings::default())
    }

    pub fn without_cache(mut self) -> Self {
        self.cache = None;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_cancel_previous(mut self, cancel_previous: bool) -> Self {
        self.cancel_previous = cancel_previous;
        self
    }

    pub fn debounce_enabled(&self) -> bool {
        !self.debounce.is_zero()
    }

    /// De-duplication only applies when debouncing is off
    pub fn dedup_enabled(&self) -> bool {
        self.cancel_previous && !self.debounce_enabled()
    }
}

/// Root process configuration
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    pub refinement: RefinementDefaults,
    pub batch: BatchDefaults,
    pub events: EventsConfig,
}

/// Default refinement knobs
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RefinementDefaults {
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub cache: CacheDefaults,
}

impl Default for RefinementDefaults {
    fn default() -> Self {
        Self {
            timeout_ms: constants::refinement::DEFAULT_TIMEOUT_MS,
            max_retries: constants::refinement::DEFAULT_MAX_RETRIES,
            cache: CacheDefaults::default(),
        }
    }
}

/// Default cache knobs; `enabled` decides whether new refinements cache
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheDefaults {
    pub enabled: bool,
    pub max_size: usize,
    pub ttl_ms: u64,
    pub strategy: CacheStrategy,
}

impl Default for CacheDefaults {
    fn default() -> Self {
        Self {
            enabled: false,
            max_size: constants::cache::DEFAULT_MAX_SIZE,
            ttl_ms: constants::cache::DEFAULT_TTL_MS,
            strategy: CacheStrategy::Lru,
        }
    }
}

impl CacheDefaults {
    pub fn settings(&self) -> CacheSettings {
        CacheSettings {
            max_size: self.max_size,
            ttl: Duration::from_millis(self.ttl_ms),
            strategy: self.strategy,
        }
    }
}

/// Default batch run knobs
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BatchDefaults {
    pub max_concurrency: usize,
    pub timeout_ms: u64,
    pub stop_on_first_error: bool,
}

impl Default for BatchDefaults {
    fn default() -> Self {
        Self {
            max_concurrency: constants::batch::DEFAULT_MAX_CONCURRENCY,
            timeout_ms: constants::batch::DEFAULT_TIMEOUT_MS,
            stop_on_first_error: false,
        }
    }
}

/// Event bus settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EventsConfig {
    pub buffer_size: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            buffer_size: constants::DEFAULT_EVENT_BUFFER_SIZE,
        }
    }
}

impl EngineConfig {
    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.batch.max_concurrency == 0 {
            return Err(ConfigurationError::InvalidValue {
                field: "batch.max_concurrency".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.refinement.cache.max_size == 0 {
            return Err(ConfigurationError::InvalidValue {
                field: "refinement.cache.max_size".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.events.buffer_size == 0 {
            return Err(ConfigurationError::InvalidValue {
                field: "events.buffer_size".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Seed a refinement config from the process defaults
    pub fn refinement_defaults(&self, message: impl Into<String>) -> RefinementConfig {
        let defaults = &self.refinement;
        let config = RefinementConfig::new(message)
            .with_timeout(Duration::from_millis(defaults.timeout_ms))
            .with_max_retries(defaults.max_retries);

        if defaults.cache.enabled {
            config.with_cache(defaults.cache.settings())
        } else {
            config
        }
    }

    /// Seed a batch run config from the process defaults
    pub fn batch_defaults(&self) -> BatchRunConfig {
        BatchRunConfig::default()
            .with_max_concurrency(self.batch.max_concurrency)
            .with_timeout(Duration::from_millis(self.batch.timeout_ms))
            .with_stop_on_first_error(self.batch.stop_on_first_error)
    }
}
