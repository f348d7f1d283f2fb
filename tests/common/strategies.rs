use proptest::prelude::*;

/// Per-item validation delays in milliseconds
pub fn delays_strategy() -> impl Strategy<Value = Vec<u64>> {
    prop::collection::vec(0u64..50, 1..24)
}

/// Concurrency caps worth exercising
pub fn concurrency_strategy() -> impl Strategy<Value = usize> {
    1usize..8
}

/// Sequence of cache keys drawn from a small alphabet so re-stores happen
pub fn cache_keys_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-f]", 1..64)
}
