//! # Event System
//!
//! Lifecycle events emitted by refinements and batch runs, the [`EventSink`]
//! contract they are emitted through, and a broadcast-channel publisher that
//! implements it.

pub mod publisher;
pub mod types;

pub use publisher::{EventPublisher, PublishedEvent};
pub use types::{
    AsyncCompleteEvent, AsyncStartEvent, BaseEventFields, BatchCompleteEvent, BatchItemEvent,
    BatchStartEvent, CacheEvent, ErrorEvent, SuccessEvent, ValidationEvent,
};

use std::sync::Arc;

/// Observability sink consumed by the engine
pub trait EventSink: Send + Sync {
    fn emit(&self, event: ValidationEvent);
}

/// Sink that discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn emit(&self, _event: ValidationEvent) {}
}

/// Shared handle to an event sink
pub type SharedEventSink = Arc<dyn EventSink>;

/// Default sink used when none is injected
pub fn noop_sink() -> SharedEventSink {
    Arc::new(NoopEventSink)
}
