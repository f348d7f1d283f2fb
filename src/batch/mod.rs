//! # Batch Validation
//!
//! Bounded-concurrency validation of many independent items with input-order
//! results, optional fail-fast, and all-or-nothing timeout and cancellation.

pub mod orchestrator;
pub mod types;

pub use orchestrator::BatchValidator;
pub use types::{BatchItem, BatchResult, BatchRunConfig, BatchSummary};
