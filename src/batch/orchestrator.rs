//! # Batch Orchestrator
//!
//! Runs an ordered list of independent validations under a fixed-size worker
//! pool and returns one [`BatchResult`] per item, aligned with the input order.
//!
//! ## Execution Model
//!
//! A run drives exactly `max_concurrency` logical workers inside the caller's
//! task. Each worker claims the next unclaimed position from a shared counter,
//! validates that item, and writes the result into a pre-sized output slot at
//! the item's position, so the output order never depends on completion order.
//!
//! The run owns an [`ExecutionToken`] linked to the caller's cancellation token
//! and armed to fire at the run timeout. When it fires, unclaimed and in-flight
//! work is dropped and the run fails as a whole; there is no partial result.
//!
//! With `stop_on_first_error`, the first failure observed in wall-clock order
//! fails the run. Which item that is depends on timing, not on its index.

use super::types::{BatchItem, BatchResult, BatchRunConfig, BatchSummary};
use crate::error::{AbortReason, BatchError};
use crate::events::{
    noop_sink, BatchCompleteEvent, BatchItemEvent, BatchStartEvent, SharedEventSink,
    ValidationEvent,
};
use crate::refinement::{ArmedTimer, ExecutionToken};
use crate::validation::ValidateOptions;
use futures::future::try_join_all;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Shared state of one batch run
struct BatchRun<'a> {
    batch_id: &'a str,
    items: &'a [BatchItem],
    next: AtomicUsize,
    results: Mutex<Vec<Option<BatchResult>>>,
    options: ValidateOptions,
    stop_on_first_error: bool,
}

/// Bounded-concurrency batch validator
#[derive(Clone)]
pub struct BatchValidator {
    events: SharedEventSink,
}

impl fmt::Debug for BatchValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchValidator").finish_non_exhaustive()
    }
}

impl Default for BatchValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchValidator {
    pub fn new() -> Self {
        Self {
            events: noop_sink(),
        }
    }

    pub fn with_events(mut self, events: SharedEventSink) -> Self {
        self.events = events;
        self
    }

    /// Validate every item, returning results in input order
    #[instrument(skip_all, fields(item_count = items.len(), max_concurrency = config.worker_count()))]
    pub async fn run(
        &self,
        items: Vec<BatchItem>,
        config: &BatchRunConfig,
    ) -> Result<Vec<BatchResult>, BatchError> {
        let batch_id = Uuid::new_v4().to_string();
        let workers = config.worker_count();
        let started = Instant::now();

        self.events.emit(ValidationEvent::BatchStart(BatchStartEvent {
            item_count: items.len(),
            max_concurrency: workers,
            batch_id: batch_id.clone(),
        }));
        debug!(batch_id = %batch_id, workers = workers, "Batch run started");

        let token = ExecutionToken::linked(config.cancellation.as_ref());
        let timer = ArmedTimer::arm(token.clone(), config.timeout);

        let run = BatchRun {
            batch_id: &batch_id,
            items: &items,
            next: AtomicUsize::new(0),
            results: Mutex::new(std::iter::repeat_with(|| None).take(items.len()).collect()),
            options: ValidateOptions::default().with_cancellation(token.observer()),
            stop_on_first_error: config.stop_on_first_error,
        };

        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => Err(match token.reason() {
                Some(AbortReason::Timeout(after)) => BatchError::TimedOut {
                    batch_id: batch_id.clone(),
                    after,
                },
                _ => BatchError::Cancelled {
                    batch_id: batch_id.clone(),
                },
            }),
            result = try_join_all((0..workers).map(|worker| self.worker(worker, &run))) => {
                result.map(|_| ())
            }
        };
        timer.disarm();

        if let Err(error) = outcome {
            warn!(batch_id = %batch_id, error = %error, "Batch run aborted");
            return Err(error);
        }

        let results: Vec<BatchResult> = run.results.into_inner().into_iter().flatten().collect();
        debug_assert_eq!(results.len(), items.len());

        let summary = BatchSummary::from_results(&results, started.elapsed());
        self.events.emit(ValidationEvent::BatchComplete(BatchCompleteEvent {
            batch_id: batch_id.clone(),
            successful: summary.successful,
            failed: summary.failed,
            duration: summary.duration,
            avg_item_duration: summary.avg_item_duration,
        }));
        info!(
            batch_id = %batch_id,
            successful = summary.successful,
            failed = summary.failed,
            duration_ms = summary.duration,
            throughput = summary.throughput,
            "Batch run completed"
        );

        Ok(results)
    }

    /// Validate and summarize in one call
    pub async fn run_with_summary(
        &self,
        items: Vec<BatchItem>,
        config: &BatchRunConfig,
    ) -> Result<(Vec<BatchResult>, BatchSummary), BatchError> {
        let started = Instant::now();
        let results = self.run(items, config).await?;
        let summary = BatchSummary::from_results(&results, started.elapsed());
        Ok((results, summary))
    }

    async fn worker(&self, worker: usize, run: &BatchRun<'_>) -> Result<(), BatchError> {
        loop {
            let position = run.next.fetch_add(1, Ordering::SeqCst);
            let Some(item) = run.items.get(position) else {
                debug!(batch_id = run.batch_id, worker = worker, "Worker found no unclaimed items");
                return Ok(());
            };

            let started = Instant::now();
            let outcome = item.validator.validate_async(&item.value, &run.options).await;
            let duration = started.elapsed();

            self.events.emit(ValidationEvent::BatchItem(BatchItemEvent {
                batch_id: run.batch_id.to_string(),
                item_index: item.index,
                item_id: item.id.clone(),
                success: outcome.is_ok(),
                duration: duration.as_millis() as u64,
            }));

            if let Err(errors) = &outcome {
                if run.stop_on_first_error {
                    return Err(BatchError::ItemFailed {
                        index: item.index,
                        id: item.id.clone(),
                        errors: errors.clone(),
                    });
                }
            }

            let result = BatchResult::from_outcome(outcome, item.id.clone(), duration);
            if let Some(slot) = run.results.lock().get_mut(position) {
                *slot = Some(result);
            }
        }
    }
}
