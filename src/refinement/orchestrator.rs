//! # Async Refinement Orchestrator
//!
//! ## Architecture: Base Validation Followed by a Cached, Guarded Predicate
//!
//! An [`AsyncRefinement`] wraps a base validator and an [`AsyncPredicate`]. Every
//! asynchronous validation walks one path through this state machine:
//!
//! ```text
//! BaseValidate ──fail──────────────────────────────────────────────▶ Result
//!      │
//!      ▼
//! CacheLookup ──hit──▶ HitPass | HitFail ───────────────────────────▶ Result
//!      │ miss
//!      ▼
//! Debounce | Dedup | DirectExecute ─▶ Executing ─▶ Success | Failure | Cancelled
//!                                                      │
//!                                                      ▼
//!                                         CacheStore (settled outcomes) ─▶ Result
//! ```
//!
//! Past base validation, exactly one `async:start` and one `async:complete` event
//! are emitted per call whichever path is taken. A call dropped before it settles
//! still closes with a cancelled `async:complete` and a `validation:error`.
//! The synchronous entry point
//! always fails with `async_required`.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use refine_core::config::RefinementConfig;
//! use refine_core::refinement::AsyncRefinement;
//! use refine_core::validation::{Validate, ValidateOptions, ValidatorFn};
//! use serde_json::{json, Value};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() {
//! let unique_email = AsyncRefinement::new(
//!     Arc::new(ValidatorFn::passthrough()),
//!     Arc::new(|value: Value, _token: CancellationToken| async move {
//!         anyhow::Ok(value != json!("taken@example.com"))
//!     }),
//!     RefinementConfig::new("Email already registered").with_default_cache(),
//! );
//!
//! let result = unique_email
//!     .validate_async(&json!("new@example.com"), &ValidateOptions::default())
//!     .await;
//! assert!(result.is_ok());
//! # }
//! ```

use super::cache::ResultCache;
use super::cancellation::{ArmedTimer, ExecutionToken};
use super::debounce::DebounceRegistry;
use super::dedup::RequestDeduplicator;
use super::executor::{ExecutionPlan, PredicateExecutor};
use super::predicate::SharedPredicate;
use crate::config::RefinementConfig;
use crate::constants::refinement::SCHEMA_TYPE;
use crate::error::{ErrorCode, RefinementError, ValidationErrors};
use crate::events::{
    noop_sink, AsyncCompleteEvent, AsyncStartEvent, BaseEventFields, CacheEvent, ErrorEvent,
    SharedEventSink, SuccessEvent, ValidationEvent,
};
use crate::validation::{SharedValidator, Validate, ValidateOptions};
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Derives the cache key for a base-validated value
pub type KeyFn = dyn Fn(&Value) -> String + Send + Sync;

/// Canonical serialization of a JSON value; object keys are emitted in sorted order
/// at every depth, independent of the map's iteration order
pub fn canonical_key(value: &Value) -> String {
    let mut key = String::new();
    write_canonical(value, &mut key);
    key
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_unstable_by(|(a, _), (b, _)| a.cmp(b));
            out.push('{');
            for (index, (name, field)) in entries.into_iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(name.clone()).to_string());
                out.push(':');
                write_canonical(field, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// States of one refinement call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefinementState {
    BaseValidate,
    CacheLookup,
    HitPass,
    HitFail,
    Miss,
    Debounce,
    Dedup,
    DirectExecute,
    Executing,
    Success,
    Failure,
    Cancelled,
    CacheStore,
    Result,
}

impl fmt::Display for RefinementState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RefinementState::BaseValidate => "base_validate",
            RefinementState::CacheLookup => "cache_lookup",
            RefinementState::HitPass => "hit_pass",
            RefinementState::HitFail => "hit_fail",
            RefinementState::Miss => "miss",
            RefinementState::Debounce => "debounce",
            RefinementState::Dedup => "dedup",
            RefinementState::DirectExecute => "direct_execute",
            RefinementState::Executing => "executing",
            RefinementState::Success => "success",
            RefinementState::Failure => "failure",
            RefinementState::Cancelled => "cancelled",
            RefinementState::CacheStore => "cache_store",
            RefinementState::Result => "result",
        };
        f.write_str(name)
    }
}

/// How a cache miss is executed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionBranch {
    Debounce,
    Dedup,
    Direct,
}

impl From<ExecutionBranch> for RefinementState {
    fn from(branch: ExecutionBranch) -> Self {
        match branch {
            ExecutionBranch::Debounce => RefinementState::Debounce,
            ExecutionBranch::Dedup => RefinementState::Dedup,
            ExecutionBranch::Direct => RefinementState::DirectExecute,
        }
    }
}

/// Emits a closing event if a call is dropped before it settles
struct Unsettled<'a> {
    events: &'a SharedEventSink,
    closing: Option<Box<dyn FnOnce() -> ValidationEvent + Send + 'a>>,
}

impl<'a> Unsettled<'a> {
    fn new<F>(events: &'a SharedEventSink, closing: F) -> Self
    where
        F: FnOnce() -> ValidationEvent + Send + 'a,
    {
        Self {
            events,
            closing: Some(Box::new(closing)),
        }
    }

    /// The call reached its normal exit and emits its own closing event
    fn settle(mut self) {
        self.closing = None;
    }
}

impl Drop for Unsettled<'_> {
    fn drop(&mut self) {
        if let Some(closing) = self.closing.take() {
            self.events.emit(closing());
        }
    }
}

/// Schema that applies an async predicate after base validation
pub struct AsyncRefinement {
    id: String,
    base: SharedValidator,
    executor: Arc<PredicateExecutor>,
    config: RefinementConfig,
    cache: Option<ResultCache>,
    dedup: RequestDeduplicator,
    debouncer: Arc<DebounceRegistry>,
    events: SharedEventSink,
    key_fn: Arc<KeyFn>,
}

impl fmt::Debug for AsyncRefinement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncRefinement")
            .field("id", &self.id)
            .field("base", &self.base.schema_type())
            .field("config", &self.config)
            .field("cache_len", &self.cache_len())
            .field("dedup", &self.dedup)
            .finish_non_exhaustive()
    }
}

impl AsyncRefinement {
    /// Create a refinement with a private debounce registry and no event sink
    pub fn new(base: SharedValidator, predicate: SharedPredicate, config: RefinementConfig) -> Self {
        let cache = config.cache.map(ResultCache::new);
        Self {
            id: Uuid::new_v4().to_string(),
            base,
            executor: Arc::new(PredicateExecutor::new(predicate)),
            config,
            cache,
            dedup: RequestDeduplicator::new(),
            debouncer: Arc::new(DebounceRegistry::new()),
            events: noop_sink(),
            key_fn: Arc::new(canonical_key),
        }
    }

    /// Share a debounce registry with other refinements
    pub fn with_debounce_registry(mut self, registry: Arc<DebounceRegistry>) -> Self {
        self.debouncer = registry;
        self
    }

    pub fn with_events(mut self, events: SharedEventSink) -> Self {
        self.events = events;
        self
    }

    /// Replace the canonical-serialization cache key
    pub fn with_key_fn<F>(mut self, key_fn: F) -> Self
    where
        F: Fn(&Value) -> String + Send + Sync + 'static,
    {
        self.key_fn = Arc::new(key_fn);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &RefinementConfig {
        &self.config
    }

    pub fn cache_len(&self) -> usize {
        self.cache.as_ref().map(ResultCache::len).unwrap_or(0)
    }

    /// Number of de-duplicated executions currently in flight
    pub fn active_requests(&self) -> usize {
        self.dedup.active_count()
    }

    /// Branch taken on a cache miss
    pub fn execution_branch(&self) -> ExecutionBranch {
        if self.config.debounce_enabled() {
            ExecutionBranch::Debounce
        } else if self.config.dedup_enabled() {
            ExecutionBranch::Dedup
        } else {
            ExecutionBranch::Direct
        }
    }

    /// Key of this instance's debounce slot
    pub fn debounce_key(&self) -> String {
        self.config
            .debounce_key
            .clone()
            .unwrap_or_else(|| format!("{}:{}", self.id, self.config.debounce.as_millis()))
    }

    /// Wipe the cache and active-request table and cancel any pending debounced call
    pub fn dispose(&self) {
        if let Some(cache) = &self.cache {
            cache.clear();
        }
        self.dedup.clear();
        let cancelled = self.config.debounce_enabled() && self.debouncer.cancel(&self.debounce_key());
        debug!(refinement = %self.id, cancelled_debounce = cancelled, "Refinement disposed");
    }

    fn base_fields(&self, value: &Value) -> BaseEventFields {
        BaseEventFields::new(SCHEMA_TYPE, value.clone(), self.id.clone())
    }

    fn transition(&self, refinement_id: &str, state: RefinementState) {
        debug!(refinement = %self.id, refinement_id = refinement_id, state = %state, "Refinement state");
    }

    /// Base validation, then the refinement proper
    async fn refine(&self, value: &Value, options: &ValidateOptions) -> Result<Value, ValidationErrors> {
        let base_options = ValidateOptions {
            path: Vec::new(),
            ..options.clone()
        };
        let validated = self.base.validate_async(value, &base_options).await?;

        let refinement_id = Uuid::new_v4().to_string();
        let started = Instant::now();
        self.events.emit(ValidationEvent::AsyncStart(AsyncStartEvent {
            base: self.base_fields(&validated),
            refinement_id: refinement_id.clone(),
            debounced: self.config.debounce_enabled(),
        }));
        let abandoned = Unsettled::new(&self.events, {
            let base = self.base_fields(&validated);
            let refinement_id = refinement_id.clone();
            move || {
                debug!(refinement_id = %refinement_id, "Refinement dropped before settling");
                ValidationEvent::AsyncComplete(AsyncCompleteEvent {
                    base,
                    refinement_id,
                    success: false,
                    duration: started.elapsed().as_millis() as u64,
                    cancelled: true,
                })
            }
        });

        let outcome = self.resolve(&validated, options, &refinement_id).await;
        abandoned.settle();

        let cancelled = matches!(
            outcome,
            Err(RefinementError::Superseded { .. })
                | Err(RefinementError::Cancelled { .. })
                | Err(RefinementError::Aborted { .. })
        );
        let state = match &outcome {
            Ok(true) => RefinementState::Success,
            _ if cancelled => RefinementState::Cancelled,
            _ => RefinementState::Failure,
        };
        self.transition(&refinement_id, state);
        self.transition(&refinement_id, RefinementState::Result);

        self.events.emit(ValidationEvent::AsyncComplete(AsyncCompleteEvent {
            base: self.base_fields(&validated),
            refinement_id,
            success: matches!(outcome, Ok(true)),
            duration: started.elapsed().as_millis() as u64,
            cancelled,
        }));

        match outcome {
            Ok(true) => Ok(validated),
            Ok(false) => Err(ValidationErrors::single(
                ErrorCode::Custom,
                self.config.message.clone(),
            )),
            Err(error) => {
                if error.is_superseded() {
                    debug!(refinement = %self.id, "Call superseded by newer debounced call");
                } else {
                    warn!(refinement = %self.id, error = %error, "Refinement did not complete");
                }
                Err(error.into())
            }
        }
    }

    /// Cache lookup, branch execution, and cache store
    async fn resolve(
        &self,
        validated: &Value,
        options: &ValidateOptions,
        refinement_id: &str,
    ) -> Result<bool, RefinementError> {
        self.transition(refinement_id, RefinementState::CacheLookup);
        let cache_key = (self.key_fn)(validated);

        if let Some(cache) = &self.cache {
            let hit = cache.lookup(&cache_key);
            self.events.emit(ValidationEvent::Cache(CacheEvent {
                base: self.base_fields(validated),
                cache_hit: hit.is_some(),
                cache_key: cache_key.clone(),
            }));
            if let Some(passed) = hit {
                let state = if passed {
                    RefinementState::HitPass
                } else {
                    RefinementState::HitFail
                };
                self.transition(refinement_id, state);
                return Ok(passed);
            }
        }
        self.transition(refinement_id, RefinementState::Miss);

        let plan = ExecutionPlan::new(
            options.timeout.unwrap_or(self.config.timeout),
            options.max_retries.unwrap_or(self.config.max_retries),
        )
        .with_parent(options.cancellation.clone());

        let branch = self.execution_branch();
        self.transition(refinement_id, branch.into());

        let outcome = match branch {
            ExecutionBranch::Debounce => {
                let plan = &plan;
                self.debouncer
                    .execute(&self.debounce_key(), self.config.debounce, move || async move {
                        self.transition(refinement_id, RefinementState::Executing);
                        self.executor.execute(validated, plan).await
                    })
                    .await
            }
            ExecutionBranch::Dedup => {
                // The shared execution runs on instance limits; per-call overrides
                // bound this caller's wait only.
                let shared_plan = ExecutionPlan::new(self.config.timeout, self.config.max_retries);
                let waiter = ExecutionToken::linked(options.cancellation.as_ref());
                let deadline = options
                    .timeout
                    .map(|timeout| ArmedTimer::arm(waiter.clone(), timeout));
                let executor = Arc::clone(&self.executor);
                let value = validated.clone();

                let outcome = self
                    .dedup
                    .run(cache_key.clone(), &waiter, move || async move {
                        executor.execute(&value, &shared_plan).await
                    })
                    .await;

                if let Some(timer) = deadline {
                    timer.disarm();
                }
                outcome
            }
            ExecutionBranch::Direct => {
                self.transition(refinement_id, RefinementState::Executing);
                self.executor.execute(validated, &plan).await
            }
        };

        if let (Some(cache), Ok(passed)) = (&self.cache, &outcome) {
            self.transition(refinement_id, RefinementState::CacheStore);
            cache.store(cache_key, *passed);
        }

        outcome
    }
}

#[async_trait]
impl Validate for AsyncRefinement {
    fn schema_type(&self) -> &str {
        SCHEMA_TYPE
    }

    fn validate(&self, _value: &Value) -> Result<Value, ValidationErrors> {
        Err(ValidationErrors::single(
            ErrorCode::AsyncRequired,
            "Async refinement must be validated with validate_async",
        ))
    }

    #[instrument(skip(self, value, options), fields(refinement = %self.id))]
    async fn validate_async(
        &self,
        value: &Value,
        options: &ValidateOptions,
    ) -> Result<Value, ValidationErrors> {
        let started = Instant::now();
        self.events
            .emit(ValidationEvent::Start(self.base_fields(value)));
        let abandoned = Unsettled::new(&self.events, {
            let base = self.base_fields(value);
            let path = options.path.clone();
            move || {
                ValidationEvent::Error(ErrorEvent {
                    base,
                    error: ValidationErrors::single(
                        ErrorCode::Aborted,
                        "Validation dropped before completion",
                    )
                    .with_path(&path),
                    duration: started.elapsed().as_millis() as u64,
                })
            }
        });

        let result = self
            .refine(value, options)
            .await
            .map_err(|errors| errors.with_path(&options.path));
        abandoned.settle();

        let duration = started.elapsed().as_millis() as u64;
        match &result {
            Ok(validated) => self.events.emit(ValidationEvent::Success(SuccessEvent {
                base: self.base_fields(value),
                result: validated.clone(),
                duration,
            })),
            Err(errors) => self.events.emit(ValidationEvent::Error(ErrorEvent {
                base: self.base_fields(value),
                error: errors.clone(),
                duration,
            })),
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheSettings;
    use crate::events::EventPublisher;
    use crate::validation::ValidatorFn;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn counting_predicate(calls: Arc<AtomicUsize>) -> SharedPredicate {
        Arc::new(move |value: Value, _token: CancellationToken| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                anyhow::Ok(value != json!("taken"))
            }
        })
    }

    fn refinement(config: RefinementConfig, calls: Arc<AtomicUsize>) -> AsyncRefinement {
        AsyncRefinement::new(
            Arc::new(ValidatorFn::passthrough()),
            counting_predicate(calls),
            config,
        )
    }

    fn drain(rx: &mut tokio::sync::broadcast::Receiver<crate::events::PublishedEvent>) -> Vec<&'static str> {
        let mut names = Vec::new();
        while let Ok(event) = rx.try_recv() {
            names.push(event.name);
        }
        names
    }

    #[test]
    fn test_canonical_key_sorts_nested_object_keys() {
        let value = json!({"b": 1, "a": {"d": "x\"y", "c": [{"z": null, "y": 2.5}]}});
        assert_eq!(
            canonical_key(&value),
            r#"{"a":{"c":[{"y":2.5,"z":null}],"d":"x\"y"},"b":1}"#
        );

        let mut forward = serde_json::Map::new();
        forward.insert("first".to_string(), json!(1));
        forward.insert("second".to_string(), json!(2));
        let mut reverse = serde_json::Map::new();
        reverse.insert("second".to_string(), json!(2));
        reverse.insert("first".to_string(), json!(1));
        assert_eq!(
            canonical_key(&Value::Object(forward)),
            canonical_key(&Value::Object(reverse))
        );
    }

    #[test]
    fn test_sync_entry_requires_async() {
        let calls = Arc::new(AtomicUsize::new(0));
        let schema = refinement(RefinementConfig::default(), calls);

        let errors = schema.validate(&json!("x")).unwrap_err();
        assert_eq!(errors.first().unwrap().code, ErrorCode::AsyncRequired);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejection_uses_configured_message() {
        let calls = Arc::new(AtomicUsize::new(0));
        let schema = refinement(RefinementConfig::new("Username taken"), calls);

        let errors = schema
            .validate_async(&json!("taken"), &ValidateOptions::default())
            .await
            .unwrap_err();

        let issue = errors.first().unwrap();
        assert_eq!(issue.code, ErrorCode::Custom);
        assert_eq!(issue.message, "Username taken");
    }

    #[tokio::test(start_paused = true)]
    async fn test_base_failure_skips_predicate() {
        let calls = Arc::new(AtomicUsize::new(0));
        let base = ValidatorFn::new("string", |value| {
            if value.is_string() {
                Ok(value.clone())
            } else {
                Err(ValidationErrors::single(ErrorCode::InvalidType, "Expected string"))
            }
        });
        let publisher = EventPublisher::new(64);
        let mut rx = publisher.subscribe();
        let schema = AsyncRefinement::new(
            Arc::new(base),
            counting_predicate(calls.clone()),
            RefinementConfig::default(),
        )
        .with_events(Arc::new(publisher));

        let errors = schema
            .validate_async(&json!(42), &ValidateOptions::default())
            .await
            .unwrap_err();

        assert_eq!(errors.first().unwrap().code, ErrorCode::InvalidType);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(drain(&mut rx), vec!["validation:start", "validation:error"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_hit_skips_predicate() {
        let calls = Arc::new(AtomicUsize::new(0));
        let schema = refinement(
            RefinementConfig::new("taken").with_default_cache(),
            calls.clone(),
        );
        let options = ValidateOptions::default();

        let first = schema.validate_async(&json!("free"), &options).await;
        let second = schema.validate_async(&json!("free"), &options).await;

        assert_eq!(first, second);
        assert_eq!(first.unwrap(), json!("free"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(schema.cache_len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cached_rejection_replays_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let schema = refinement(
            RefinementConfig::new("taken").with_default_cache(),
            calls.clone(),
        );
        let options = ValidateOptions::default();

        assert!(schema.validate_async(&json!("taken"), &options).await.is_err());
        let errors = schema
            .validate_async(&json!("taken"), &options)
            .await
            .unwrap_err();

        assert_eq!(errors.first().unwrap().code, ErrorCode::Custom);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_size_one_evicts_previous_value() {
        let calls = Arc::new(AtomicUsize::new(0));
        let schema = refinement(
            RefinementConfig::new("taken").with_cache(CacheSettings::default().with_max_size(1)),
            calls.clone(),
        );
        let options = ValidateOptions::default();

        schema.validate_async(&json!("x"), &options).await.unwrap();
        schema.validate_async(&json!("y"), &options).await.unwrap();
        schema.validate_async(&json!("x"), &options).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_previous_shares_in_flight_execution() {
        let calls = Arc::new(AtomicUsize::new(0));
        let schema = refinement(
            RefinementConfig::new("taken").with_cancel_previous(true),
            calls.clone(),
        );
        assert_eq!(schema.execution_branch(), ExecutionBranch::Dedup);
        let options = ValidateOptions::default();
        let value = json!("free");

        let (a, b) = tokio::join!(
            schema.validate_async(&value, &options),
            schema.validate_async(&value, &options),
        );

        assert_eq!(a, b);
        assert!(a.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(schema.active_requests(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_supersedes_earlier_calls() {
        let calls = Arc::new(AtomicUsize::new(0));
        let schema = refinement(
            RefinementConfig::new("taken").with_debounce(Duration::from_millis(100)),
            calls.clone(),
        );
        assert_eq!(schema.execution_branch(), ExecutionBranch::Debounce);
        let options = ValidateOptions::default();
        let (a, b, c) = (json!("a"), json!("b"), json!("c"));

        let (c1, c2, c3) = tokio::join!(
            schema.validate_async(&a, &options),
            schema.validate_async(&b, &options),
            schema.validate_async(&c, &options),
        );

        for superseded in [c1, c2] {
            let errors = superseded.unwrap_err();
            assert_eq!(errors.first().unwrap().code, ErrorCode::DebounceCancelled);
        }
        assert_eq!(c3.unwrap(), json!("c"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_call_still_emits_closing_events() {
        let calls = Arc::new(AtomicUsize::new(0));
        let publisher = EventPublisher::new(64);
        let mut rx = publisher.subscribe();
        let schema = refinement(RefinementConfig::new("taken"), calls.clone())
            .with_events(Arc::new(publisher));
        let value = json!("free");
        let options = ValidateOptions::default();

        let dropped = tokio::time::timeout(
            Duration::from_millis(5),
            schema.validate_async(&value, &options),
        )
        .await;

        assert!(dropped.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let mut names = drain(&mut rx);
        names.sort_unstable();
        assert_eq!(
            names,
            vec!["async:complete", "async:start", "validation:error", "validation:start"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_reports_aborted() {
        let schema = AsyncRefinement::new(
            Arc::new(ValidatorFn::passthrough()),
            Arc::new(|_value: Value, _token: CancellationToken| {
                futures::future::pending::<anyhow::Result<bool>>()
            }),
            RefinementConfig::new("never").with_timeout(Duration::from_millis(100)),
        );

        let errors = schema
            .validate_async(&json!(1), &ValidateOptions::default())
            .await
            .unwrap_err();

        let issue = errors.first().unwrap();
        assert_eq!(issue.code, ErrorCode::Aborted);
        assert!(issue.message.contains("timed out after 100ms"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_predicate_error_preserved_as_unknown() {
        let schema = AsyncRefinement::new(
            Arc::new(ValidatorFn::passthrough()),
            Arc::new(|_value: Value, _token: CancellationToken| async move {
                Err::<bool, _>(anyhow::anyhow!("lookup service unavailable"))
            }),
            RefinementConfig::new("unused"),
        );

        let errors = schema
            .validate_async(&json!(1), &ValidateOptions::default())
            .await
            .unwrap_err();

        let issue = errors.first().unwrap();
        assert_eq!(issue.code, ErrorCode::Unknown);
        assert_eq!(issue.message, "lookup service unavailable");
    }

    #[tokio::test(start_paused = true)]
    async fn test_lifecycle_events_on_cache_hit() {
        let calls = Arc::new(AtomicUsize::new(0));
        let publisher = EventPublisher::new(64);
        let mut rx = publisher.subscribe();
        let schema = refinement(RefinementConfig::new("taken").with_default_cache(), calls)
            .with_events(Arc::new(publisher));
        let options = ValidateOptions::default();

        schema.validate_async(&json!("v"), &options).await.unwrap();
        drain(&mut rx);
        schema.validate_async(&json!("v"), &options).await.unwrap();

        assert_eq!(
            drain(&mut rx),
            vec![
                "validation:start",
                "async:start",
                "cache",
                "async:complete",
                "validation:success"
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_path_prefix_applied_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let schema = refinement(RefinementConfig::new("taken"), calls);
        let options = ValidateOptions::default().with_path(vec!["user".to_string(), "name".to_string()]);

        let errors = schema.validate_async(&json!("taken"), &options).await.unwrap_err();
        assert_eq!(errors.first().unwrap().path, vec!["user", "name"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_clears_state() {
        let calls = Arc::new(AtomicUsize::new(0));
        let schema = refinement(
            RefinementConfig::new("taken").with_default_cache(),
            calls.clone(),
        );
        let options = ValidateOptions::default();

        schema.validate_async(&json!("v"), &options).await.unwrap();
        schema.dispose();
        assert_eq!(schema.cache_len(), 0);

        schema.validate_async(&json!("v"), &options).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
