//! Mock predicates, validators, and event sinks shared by integration tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use refine_core::error::{ErrorCode, ValidationErrors};
use refine_core::events::{EventSink, ValidationEvent};
use refine_core::refinement::AsyncPredicate;
use refine_core::validation::{Validate, ValidateOptions, ValidatorFn};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Predicate that rejects a fixed set of values after a delay
pub struct MockPredicate {
    pub calls: AtomicUsize,
    delay: Duration,
    rejected: Vec<Value>,
    /// Number of leading calls that fail with an error
    failures: usize,
}

impl MockPredicate {
    pub fn new(delay: Duration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay,
            rejected: Vec::new(),
            failures: 0,
        }
    }

    pub fn rejecting(mut self, value: Value) -> Self {
        self.rejected.push(value);
        self
    }

    pub fn failing_first(mut self, failures: usize) -> Self {
        self.failures = failures;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AsyncPredicate for MockPredicate {
    async fn check(&self, value: &Value, _token: CancellationToken) -> anyhow::Result<bool> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        if call < self.failures {
            anyhow::bail!("mock failure on call {call}");
        }
        Ok(!self.rejected.contains(value))
    }
}

/// Base validator accepting only strings
pub fn string_validator() -> ValidatorFn {
    ValidatorFn::new("string", |value| {
        if value.is_string() {
            Ok(value.clone())
        } else {
            Err(ValidationErrors::single(ErrorCode::InvalidType, "Expected string"))
        }
    })
}

/// Validator that sleeps for `value["delay"]` ms and tracks peak concurrency.
/// Fails with `value["fail"]` as the message when present.
#[derive(Default)]
pub struct TrackingValidator {
    active: AtomicUsize,
    peak: AtomicUsize,
    started: Mutex<Vec<u64>>,
}

impl TrackingValidator {
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// `value["seq"]` of each item in the order validation started
    pub fn start_order(&self) -> Vec<u64> {
        self.started.lock().clone()
    }
}

#[async_trait]
impl Validate for TrackingValidator {
    fn schema_type(&self) -> &str {
        "tracking"
    }

    fn validate(&self, value: &Value) -> Result<Value, ValidationErrors> {
        Ok(value.clone())
    }

    async fn validate_async(
        &self,
        value: &Value,
        _options: &ValidateOptions,
    ) -> Result<Value, ValidationErrors> {
        if let Some(seq) = value["seq"].as_u64() {
            self.started.lock().push(seq);
        }
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(active, Ordering::SeqCst);

        let delay = value["delay"].as_u64().unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(delay)).await;
        self.active.fetch_sub(1, Ordering::SeqCst);

        match value["fail"].as_str() {
            Some(message) => Err(ValidationErrors::single(ErrorCode::Custom, message)),
            None => Ok(value.clone()),
        }
    }
}

/// Event sink that records every event it receives
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ValidationEvent>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<ValidationEvent> {
        self.events.lock().clone()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(ValidationEvent::name).collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: ValidationEvent) {
        self.events.lock().push(event);
    }
}
