//! # Debounce Coordinator
//!
//! Single-slot debounce keyed by an opaque string. Each key holds at most one
//! pending call. A new call for a key rejects the outstanding one with
//! [`RefinementError::Superseded`] and starts a fresh quiet period; only the
//! most recent call runs. [`DebounceRegistry::cancel`] rejects the outstanding
//! call with [`RefinementError::Cancelled`] instead.
//!
//! The registry is an explicit object rather than a process-wide singleton.
//! Refinements that should debounce together share one registry; callers sharing
//! a registry across unrelated refinements must namespace their keys.

use crate::error::RefinementError;
use dashmap::DashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::debug;

#[derive(Debug)]
struct DebounceSlot {
    generation: u64,
    reject: oneshot::Sender<RefinementError>,
}

/// Registry of pending debounced calls
#[derive(Debug, Default)]
pub struct DebounceRegistry {
    slots: DashMap<String, DebounceSlot>,
    generation: AtomicU64,
}

/// Removes a slot on settlement unless a newer call already replaced it
struct SlotGuard<'a> {
    registry: &'a DebounceRegistry,
    key: &'a str,
    generation: u64,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.registry
            .slots
            .remove_if(self.key, |_, slot| slot.generation == self.generation);
    }
}

impl DebounceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `operation` after `delay` unless a newer call for `key` arrives first.
    ///
    /// A superseded or cancelled call never starts `operation`; if it was already
    /// running, its result is discarded.
    pub async fn execute<F, Fut, T>(
        &self,
        key: &str,
        delay: Duration,
        operation: F,
    ) -> Result<T, RefinementError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, RefinementError>>,
    {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let (reject, mut rejected) = oneshot::channel();

        if let Some(previous) = self
            .slots
            .insert(key.to_string(), DebounceSlot { generation, reject })
        {
            debug!(
                debounce_key = key,
                superseded_generation = previous.generation,
                generation = generation,
                "Superseding pending debounced call"
            );
            let _ = previous.reject.send(RefinementError::Superseded {
                key: key.to_string(),
            });
        }

        let _guard = SlotGuard {
            registry: self,
            key,
            generation,
        };

        let run = async {
            tokio::time::sleep(delay).await;
            debug!(debounce_key = key, generation = generation, "Debounce delay elapsed");
            operation().await
        };

        tokio::select! {
            biased;
            rejection = &mut rejected => Err(rejection.unwrap_or(RefinementError::Cancelled {
                key: key.to_string(),
            })),
            result = run => result,
        }
    }

    /// Reject the pending call for `key`, if any. Returns whether one existed.
    pub fn cancel(&self, key: &str) -> bool {
        match self.slots.remove(key) {
            Some((key, slot)) => {
                debug!(debounce_key = %key, generation = slot.generation, "Cancelling debounced call");
                let _ = slot.reject.send(RefinementError::Cancelled { key });
                true
            }
            None => false,
        }
    }

    /// Reject every pending call
    pub fn cancel_all(&self) -> usize {
        let keys: Vec<String> = self.slots.iter().map(|slot| slot.key().clone()).collect();
        keys.iter().filter(|key| self.cancel(key)).count()
    }

    pub fn is_pending(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }

    /// Number of keys with a pending call
    pub fn pending(&self) -> usize {
        self.slots.len()
    }
}
