//! Batch run inputs, per-item results, and run summaries.

use crate::constants::batch::{DEFAULT_MAX_CONCURRENCY, DEFAULT_TIMEOUT_MS};
use crate::error::ValidationErrors;
use crate::validation::SharedValidator;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// One independent unit of batch work
#[derive(Clone)]
pub struct BatchItem {
    /// Ordinal reported in progress events
    pub index: usize,
    pub validator: SharedValidator,
    pub value: Value,
    /// Caller-supplied correlation id
    pub id: Option<String>,
}

impl fmt::Debug for BatchItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchItem")
            .field("index", &self.index)
            .field("validator", &self.validator.schema_type())
            .field("value", &self.value)
            .field("id", &self.id)
            .finish()
    }
}

impl BatchItem {
    pub fn new(index: usize, validator: SharedValidator, value: Value) -> Self {
        Self {
            index,
            validator,
            value,
            id: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Items validating each value with the same validator, indexed in order
    pub fn sequence(validator: SharedValidator, values: impl IntoIterator<Item = Value>) -> Vec<Self> {
        values
            .into_iter()
            .enumerate()
            .map(|(index, value)| Self::new(index, validator.clone(), value))
            .collect()
    }
}

/// Outcome of one batch item, aligned with its input position
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ValidationErrors>,
    pub id: Option<String>,
    #[serde(serialize_with = "serialize_millis")]
    pub duration: Duration,
}

fn serialize_millis<S: serde::Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}

impl BatchResult {
    pub fn from_outcome(
        outcome: Result<Value, ValidationErrors>,
        id: Option<String>,
        duration: Duration,
    ) -> Self {
        match outcome {
            Ok(value) => Self {
                success: true,
                value: Some(value),
                error: None,
                id,
                duration,
            },
            Err(errors) => Self {
                success: false,
                value: None,
                error: Some(errors),
                id,
                duration,
            },
        }
    }

    /// Convert back into the validation outcome
    pub fn into_result(self) -> Result<Value, ValidationErrors> {
        match (self.value, self.error) {
            (_, Some(errors)) => Err(errors),
            (Some(value), None) => Ok(value),
            (None, None) => Ok(Value::Null),
        }
    }
}

/// Per-invocation batch settings
#[derive(Debug, Clone)]
pub struct BatchRunConfig {
    pub max_concurrency: usize,
    pub stop_on_first_error: bool,
    pub timeout: Duration,
    /// Caller-owned token that aborts the whole run
    pub cancellation: Option<CancellationToken>,
}

impl Default for BatchRunConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            stop_on_first_error: false,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            cancellation: None,
        }
    }
}

impl BatchRunConfig {
    /// Zero is clamped to one worker
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn with_stop_on_first_error(mut self, stop_on_first_error: bool) -> Self {
        self.stop_on_first_error = stop_on_first_error;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Number of workers a run spawns
    pub fn worker_count(&self) -> usize {
        self.max_concurrency.max(1)
    }
}

/// Aggregate statistics over a finished batch
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    /// Wall-clock duration of the run in milliseconds
    pub duration: u64,
    /// Mean per-item validation time in milliseconds
    pub avg_item_duration: f64,
    /// Items completed per second of wall-clock time
    pub throughput: f64,
}

impl BatchSummary {
    pub fn from_results(results: &[BatchResult], elapsed: Duration) -> Self {
        let total = results.len();
        let successful = results.iter().filter(|result| result.success).count();
        let item_time: f64 = results
            .iter()
            .map(|result| result.duration.as_secs_f64() * 1_000.0)
            .sum();

        let avg_item_duration = if total == 0 {
            0.0
        } else {
            item_time / total as f64
        };
        let throughput = if elapsed.is_zero() {
            0.0
        } else {
            total as f64 / elapsed.as_secs_f64()
        };

        Self {
            total,
            successful,
            failed: total - successful,
            duration: elapsed.as_millis() as u64,
            avg_item_duration,
            throughput,
        }
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}
