//! # Validation Capability
//!
//! The one contract the engine consumes from structural validators and exposes
//! from refinements: a synchronous `validate` and an asynchronous
//! `validate_async`. Batch runs depend only on this trait.

use crate::error::ValidationErrors;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Per-call options for asynchronous validation
#[derive(Debug, Clone, Default)]
pub struct ValidateOptions {
    /// Caller-owned cancellation, linked into any execution token
    pub cancellation: Option<CancellationToken>,
    /// Overrides the refinement's configured predicate timeout
    pub timeout: Option<Duration>,
    /// Overrides the refinement's configured retry budget
    pub max_retries: Option<u32>,
    /// Prefix applied to the path of every reported issue
    pub path: Vec<String>,
}

impl ValidateOptions {
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn with_path(mut self, path: Vec<String>) -> Self {
        self.path = path;
        self
    }
}

/// Validation capability implemented by structural schemas and refinements
#[async_trait]
pub trait Validate: Send + Sync {
    /// Short type name reported in lifecycle events
    fn schema_type(&self) -> &str {
        "custom"
    }

    /// Validate synchronously, returning the (possibly transformed) value
    fn validate(&self, value: &Value) -> Result<Value, ValidationErrors>;

    /// Validate asynchronously; defaults to the synchronous path
    async fn validate_async(
        &self,
        value: &Value,
        options: &ValidateOptions,
    ) -> Result<Value, ValidationErrors> {
        self.validate(value)
            .map_err(|errors| errors.with_path(&options.path))
    }
}

/// Shared handle to any validation capability
pub type SharedValidator = Arc<dyn Validate>;

type ValidateFn = dyn Fn(&Value) -> Result<Value, ValidationErrors> + Send + Sync;

/// Adapts a synchronous closure into a [`Validate`] capability
#[derive(Clone)]
pub struct ValidatorFn {
    schema_type: String,
    func: Arc<ValidateFn>,
}

impl ValidatorFn {
    pub fn new<F>(schema_type: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, ValidationErrors> + Send + Sync + 'static,
    {
        Self {
            schema_type: schema_type.into(),
            func: Arc::new(func),
        }
    }

    /// Accepts every value unchanged
    pub fn passthrough() -> Self {
        Self::new("any", |value| Ok(value.clone()))
    }
}

impl fmt::Debug for ValidatorFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorFn")
            .field("schema_type", &self.schema_type)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Validate for ValidatorFn {
    fn schema_type(&self) -> &str {
        &self.schema_type
    }

    fn validate(&self, value: &Value) -> Result<Value, ValidationErrors> {
        (self.func)(value)
    }
}
