//! The user-supplied asynchronous check applied after base validation.

use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Asynchronous predicate over an already-validated value.
///
/// `Ok(true)` accepts the value, `Ok(false)` rejects it, and `Err` is a failure
/// of the check itself (eligible for retry). Implementations should observe
/// `token` if they can stop early; an execution whose token fires is abandoned.
#[async_trait]
pub trait AsyncPredicate: Send + Sync {
    async fn check(&self, value: &Value, token: CancellationToken) -> anyhow::Result<bool>;
}

#[async_trait]
impl<F, Fut> AsyncPredicate for F
where
    F: Fn(Value, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<bool>> + Send + 'static,
{
    async fn check(&self, value: &Value, token: CancellationToken) -> anyhow::Result<bool> {
        (self)(value.clone(), token).await
    }
}

/// Shared handle to a predicate
pub type SharedPredicate = Arc<dyn AsyncPredicate>;
