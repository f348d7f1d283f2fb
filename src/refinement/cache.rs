//! # Result Cache
//!
//! Bounded, TTL-based memo of predicate outcomes keyed by the canonical
//! serialization of the base-validated value.
//!
//! An entry is valid only while `now - inserted_at < ttl`. After every write the
//! cache drops expired entries and then, if still over `max_size`, evicts the
//! oldest `len - max_size` entries. Under [`CacheStrategy::Lru`] "oldest" means
//! the oldest insertion timestamp (a re-store refreshes it, a read does not);
//! under [`CacheStrategy::Fifo`] it means first-insertion order.

use crate::config::{CacheSettings, CacheStrategy};
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::time::Instant;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    outcome: bool,
    inserted_at: Instant,
    /// First-insertion order, kept across re-stores
    sequence: u64,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    next_sequence: u64,
}

/// Memo of predicate outcomes
#[derive(Debug)]
pub struct ResultCache {
    settings: CacheSettings,
    state: Mutex<CacheState>,
}

impl ResultCache {
    pub fn new(settings: CacheSettings) -> Self {
        Self {
            settings,
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    /// Cached outcome for `key`, if present and younger than the TTL
    pub fn lookup(&self, key: &str) -> Option<bool> {
        let mut state = self.state.lock();
        let entry = *state.entries.get(key)?;

        if entry.inserted_at.elapsed() < self.settings.ttl {
            trace!(cache_key = key, outcome = entry.outcome, "Cache hit");
            Some(entry.outcome)
        } else {
            trace!(cache_key = key, "Cache entry expired");
            state.entries.remove(key);
            None
        }
    }

    /// Upsert an outcome stamped with the current time, then enforce bounds
    pub fn store(&self, key: String, outcome: bool) {
        let mut state = self.state.lock();
        let now = Instant::now();

        let sequence = match state.entries.get(&key) {
            Some(existing) => existing.sequence,
            None => {
                let sequence = state.next_sequence;
                state.next_sequence += 1;
                sequence
            }
        };

        state.entries.insert(
            key,
            CacheEntry {
                outcome,
                inserted_at: now,
                sequence,
            },
        );

        self.cleanup(&mut state, now);
    }

    fn cleanup(&self, state: &mut CacheState, now: Instant) {
        let ttl = self.settings.ttl;
        let before = state.entries.len();
        state
            .entries
            .retain(|_, entry| now.duration_since(entry.inserted_at) < ttl);
        let expired = before - state.entries.len();

        let overflow = state.entries.len().saturating_sub(self.settings.max_size);
        if overflow > 0 {
            let mut candidates: Vec<(String, CacheEntry)> = state
                .entries
                .iter()
                .map(|(key, entry)| (key.clone(), *entry))
                .collect();

            match self.settings.strategy {
                CacheStrategy::Lru => candidates.sort_by(|(_, a), (_, b)| {
                    a.inserted_at
                        .cmp(&b.inserted_at)
                        .then(a.sequence.cmp(&b.sequence))
                }),
                CacheStrategy::Fifo => candidates.sort_by_key(|(_, entry)| entry.sequence),
            }

            for (key, _) in candidates.into_iter().take(overflow) {
                state.entries.remove(&key);
            }
        }

        if expired > 0 || overflow > 0 {
            debug!(
                expired = expired,
                evicted = overflow,
                remaining = state.entries.len(),
                strategy = ?self.settings.strategy,
                "Cache cleanup"
            );
        }
    }

    pub fn clear(&self) {
        self.state.lock().entries.clear();
    }

    /// Number of stored entries, including any not yet purged as expired
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
