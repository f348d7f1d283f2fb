mod common;

use common::strategies::*;
use common::TrackingValidator;
use proptest::prelude::*;
use refine_core::batch::{BatchItem, BatchRunConfig, BatchValidator};
use refine_core::config::{CacheSettings, CacheStrategy};
use refine_core::refinement::ResultCache;
use refine_core::validation::SharedValidator;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

fn paused_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .start_paused(true)
        .build()
        .expect("runtime")
}

proptest! {
    /// Property: result `i` always corresponds to input item `i`, whatever the completion order
    #[test]
    fn batch_results_align_with_input(delays in delays_strategy(), concurrency in concurrency_strategy()) {
        let tracking = Arc::new(TrackingValidator::default());
        let validator: SharedValidator = tracking.clone();
        let values = delays
            .iter()
            .enumerate()
            .map(|(seq, delay)| json!({"seq": seq, "delay": delay}))
            .collect::<Vec<_>>();

        let results = paused_runtime().block_on(async {
            BatchValidator::new()
                .run(
                    BatchItem::sequence(validator, values),
                    &BatchRunConfig::default().with_max_concurrency(concurrency),
                )
                .await
        }).expect("batch");

        prop_assert_eq!(results.len(), delays.len());
        for (index, result) in results.iter().enumerate() {
            prop_assert!(result.success);
            let value = result.value.as_ref().expect("value");
            prop_assert_eq!(value["seq"].as_u64(), Some(index as u64));
        }
    }

    /// Property: no more than `max_concurrency` items are ever under validation at once
    #[test]
    fn batch_never_exceeds_concurrency(delays in delays_strategy(), concurrency in concurrency_strategy()) {
        let tracking = Arc::new(TrackingValidator::default());
        let validator: SharedValidator = tracking.clone();
        let values = delays.iter().map(|delay| json!({"delay": delay})).collect::<Vec<_>>();

        paused_runtime().block_on(async {
            BatchValidator::new()
                .run(
                    BatchItem::sequence(validator, values),
                    &BatchRunConfig::default().with_max_concurrency(concurrency),
                )
                .await
        }).expect("batch");

        prop_assert!(tracking.peak() <= concurrency);
        prop_assert!(tracking.peak() >= 1);
    }

    /// Property: the cache never holds more than `max_size` entries after a store
    #[test]
    fn cache_size_is_bounded(keys in cache_keys_strategy(), max_size in 1usize..5, fifo in any::<bool>()) {
        let strategy = if fifo { CacheStrategy::Fifo } else { CacheStrategy::Lru };
        let cache = ResultCache::new(
            CacheSettings::default()
                .with_max_size(max_size)
                .with_ttl(Duration::from_secs(60))
                .with_strategy(strategy),
        );

        let (peak_len, last_hit) = paused_runtime().block_on(async {
            let mut peak_len = 0;
            for key in &keys {
                cache.store(key.clone(), true);
                peak_len = peak_len.max(cache.len());
                tokio::time::advance(Duration::from_millis(1)).await;
            }
            // The most recently stored key always survives
            let last = keys.last().expect("non-empty");
            (peak_len, cache.lookup(last))
        });

        prop_assert!(peak_len <= max_size);
        prop_assert_eq!(last_hit, Some(true));

        let distinct: HashSet<&String> = keys.iter().collect();
        prop_assert_eq!(cache.len(), distinct.len().min(max_size));
    }
}
