//! # Request De-duplicator
//!
//! Shares one in-flight execution among concurrent callers using the same cache
//! key. The key is derived from the value being checked, so every waiter
//! legitimately receives the same outcome.
//!
//! The shared execution carries no caller's cancellation. Each waiter races its
//! own token against it, so a waiter that gives up is aborted alone while the
//! others keep waiting.
//!
//! The table only holds a weak handle to each execution. An entry is removed
//! exactly once, by a guard owned by the execution itself, when that execution
//! completes or when every waiter has dropped it.

use super::cancellation::ExecutionToken;
use crate::error::{AbortReason, RefinementError};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared, WeakShared};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

type Outcome = Result<bool, RefinementError>;
type SharedExecution = Shared<BoxFuture<'static, Outcome>>;

struct ActiveRequest {
    generation: u64,
    execution: WeakShared<BoxFuture<'static, Outcome>>,
}

type ActiveRequestTable = DashMap<String, ActiveRequest>;

/// Cleanup step owned by the execution future
struct ActiveRequestGuard {
    table: Arc<ActiveRequestTable>,
    key: String,
    generation: u64,
}

impl Drop for ActiveRequestGuard {
    fn drop(&mut self) {
        let generation = self.generation;
        if self
            .table
            .remove_if(&self.key, |_, active| active.generation == generation)
            .is_some()
        {
            debug!(cache_key = %self.key, generation = generation, "Active request cleared");
        }
    }
}

/// Table of in-flight executions keyed by cache key
#[derive(Default)]
pub struct RequestDeduplicator {
    active: Arc<ActiveRequestTable>,
    generation: AtomicU64,
}

impl fmt::Debug for RequestDeduplicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestDeduplicator")
            .field("active", &self.active.len())
            .finish()
    }
}

impl RequestDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Await the in-flight execution for `key`, or start one with `start`.
    /// Cancelling `waiter` aborts this caller only.
    pub async fn run<F, Fut>(&self, key: String, waiter: &ExecutionToken, start: F) -> Outcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Outcome> + Send + 'static,
    {
        let execution = match self.active.entry(key.clone()) {
            Entry::Occupied(mut occupied) => match occupied.get().execution.upgrade() {
                Some(execution) => {
                    debug!(cache_key = %key, "Joining in-flight execution");
                    execution
                }
                None => {
                    let (generation, execution) = self.launch(key.clone(), start);
                    if let Some(weak) = execution.downgrade() {
                        occupied.insert(ActiveRequest {
                            generation,
                            execution: weak,
                        });
                    }
                    execution
                }
            },
            Entry::Vacant(vacant) => {
                let (generation, execution) = self.launch(key.clone(), start);
                if let Some(weak) = execution.downgrade() {
                    vacant.insert(ActiveRequest {
                        generation,
                        execution: weak,
                    });
                }
                execution
            }
        };

        tokio::select! {
            biased;
            _ = waiter.cancelled() => {
                debug!(cache_key = %key, "Waiter left the shared execution");
                Err(RefinementError::Aborted {
                    reason: waiter.reason().unwrap_or(AbortReason::External),
                })
            }
            outcome = execution => outcome,
        }
    }

    fn launch<F, Fut>(&self, key: String, start: F) -> (u64, SharedExecution)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Outcome> + Send + 'static,
    {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(cache_key = %key, generation = generation, "Starting de-duplicated execution");

        let guard = ActiveRequestGuard {
            table: Arc::clone(&self.active),
            key,
            generation,
        };
        let operation = start();
        let execution = async move {
            let _guard = guard;
            operation.await
        }
        .boxed()
        .shared();

        (generation, execution)
    }

    /// Number of executions currently in flight
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn is_active(&self, key: &str) -> bool {
        self.active.contains_key(key)
    }

    /// Forget every in-flight execution; running waiters still settle
    pub fn clear(&self) {
        self.active.clear();
    }
}
