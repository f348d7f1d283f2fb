#![allow(clippy::doc_markdown)] // Allow technical terms like LRU, FIFO, TTL in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Refine Core Rust
//!
//! Asynchronous refinement and bounded-concurrency batch validation engine.
//!
//! ## Overview
//!
//! Structural validation (types, lengths, shapes) is a synchronous tree walk.
//! Checks such as "is this email already registered" are not: they call remote
//! services, take time, fail transiently, and arrive in bursts as users type.
//! This crate executes those asynchronous predicates safely, and runs many
//! independent validations under a concurrency cap.
//!
//! ## Key Features
//!
//! - **Result Cache**: TTL-bounded memo of predicate outcomes with lru/fifo eviction
//! - **Debounce**: Single-slot debounce per key; intermediate calls are superseded
//! - **De-duplication**: Concurrent identical checks share one in-flight execution
//! - **Timeout and Retry**: Deadline-bounded execution with exponential backoff
//! - **Cancellation**: Caller-supplied tokens propagate into predicates and batches
//! - **Batch Validation**: Fixed worker pool, input-order results, fail-fast, all-or-nothing timeout
//! - **Lifecycle Events**: Typed events with a stable camelCase payload contract
//!
//! ## Module Organization
//!
//! - [`validation`] - The `Validate` capability shared by schemas and refinements
//! - [`refinement`] - Async refinement state machine and its components
//! - [`batch`] - Bounded-concurrency batch orchestrator
//! - [`events`] - Event payloads, sink trait, and broadcast publisher
//! - [`config`] - Per-instance configs and layered process defaults
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging initialisation
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use refine_core::batch::{BatchItem, BatchRunConfig, BatchValidator};
//! use refine_core::config::RefinementConfig;
//! use refine_core::refinement::AsyncRefinement;
//! use refine_core::validation::{SharedValidator, ValidatorFn};
//! use serde_json::{json, Value};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let username: SharedValidator = Arc::new(AsyncRefinement::new(
//!     Arc::new(ValidatorFn::passthrough()),
//!     Arc::new(|value: Value, _token: CancellationToken| async move {
//!         anyhow::Ok(value != json!("admin"))
//!     }),
//!     RefinementConfig::new("Username is taken").with_default_cache(),
//! ));
//!
//! let items = BatchItem::sequence(username, vec![json!("alice"), json!("admin")]);
//! let results = BatchValidator::new()
//!     .run(items, &BatchRunConfig::default().with_max_concurrency(2))
//!     .await?;
//!
//! assert!(results[0].success);
//! assert!(!results[1].success);
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! Timer-driven behaviour is tested against tokio's paused clock:
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # Unit, integration, and property tests
//! ```

pub mod batch;
pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod logging;
pub mod refinement;
pub mod validation;

pub use batch::{BatchItem, BatchResult, BatchRunConfig, BatchSummary, BatchValidator};
pub use config::{CacheSettings, CacheStrategy, ConfigLoader, EngineConfig, RefinementConfig};
pub use error::{
    AbortReason, BatchError, ConfigurationError, ErrorCode, RefinementError, Result,
    ValidationErrors, ValidationIssue,
};
pub use events::{EventPublisher, EventSink, NoopEventSink, SharedEventSink, ValidationEvent};
pub use logging::init_structured_logging;
pub use refinement::{AsyncPredicate, AsyncRefinement, DebounceRegistry, SharedPredicate};
pub use validation::{SharedValidator, Validate, ValidateOptions, ValidatorFn};
