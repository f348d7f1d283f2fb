//! # Engine Constants
//!
//! Default knobs and event names that define the operational boundaries of the
//! refinement and batch engines. Event names are part of the observable contract
//! consumed by external tooling and must not change.

/// Lifecycle event names published to the event bus
pub mod events {
    // Schema-level lifecycle
    pub const VALIDATION_START: &str = "validation:start";
    pub const VALIDATION_SUCCESS: &str = "validation:success";
    pub const VALIDATION_ERROR: &str = "validation:error";

    // Async refinement lifecycle
    pub const ASYNC_START: &str = "async:start";
    pub const ASYNC_COMPLETE: &str = "async:complete";
    pub const CACHE: &str = "cache";

    // Batch orchestration lifecycle
    pub const BATCH_START: &str = "batch:start";
    pub const BATCH_ITEM: &str = "batch:item";
    pub const BATCH_COMPLETE: &str = "batch:complete";
}

/// Defaults for async refinements
pub mod refinement {
    /// Predicate deadline when none is configured
    pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;
    pub const DEFAULT_MAX_RETRIES: u32 = 0;
    /// Backoff before retry `n` (0-based) is `BACKOFF_BASE_MS * 2^n`
    pub const BACKOFF_BASE_MS: u64 = 100;
    pub const DEFAULT_MESSAGE: &str = "Async refinement failed";
    pub const SCHEMA_TYPE: &str = "refinement";
}

/// Defaults for the result cache
pub mod cache {
    pub const DEFAULT_MAX_SIZE: usize = 1_000;
    pub const DEFAULT_TTL_MS: u64 = 300_000;
}

/// Defaults for batch runs
pub mod batch {
    pub const DEFAULT_MAX_CONCURRENCY: usize = 5;
    pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
}

/// Event bus channel capacity
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 1_000;
