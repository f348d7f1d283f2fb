//! # Async Refinement Engine
//!
//! Executes user-supplied asynchronous predicates after base validation, under
//! caching, debouncing, de-duplication, retry, timeout, and cancellation.
//!
//! ## Core Components
//!
//! - **AsyncRefinement**: The per-schema state machine tying the components together
//! - **PredicateExecutor**: Deadline-bounded execution with exponential-backoff retries
//! - **ResultCache**: TTL-bounded memo of predicate outcomes with lru/fifo eviction
//! - **DebounceRegistry**: Single-slot debounce keyed by an opaque string
//! - **RequestDeduplicator**: Shares one in-flight execution among identical calls
//! - **ExecutionToken / ArmedTimer**: Cancellation token with a reason, and the timer that fires it

pub mod cache;
pub mod cancellation;
pub mod debounce;
pub mod dedup;
pub mod executor;
pub mod orchestrator;
pub mod predicate;

pub use cache::ResultCache;
pub use cancellation::{ArmedTimer, ExecutionToken};
pub use debounce::DebounceRegistry;
pub use dedup::RequestDeduplicator;
pub use executor::{backoff_delay, ExecutionPlan, PredicateExecutor};
pub use orchestrator::{canonical_key, AsyncRefinement, ExecutionBranch, KeyFn, RefinementState};
pub use predicate::{AsyncPredicate, SharedPredicate};
