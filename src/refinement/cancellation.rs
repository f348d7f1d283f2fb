//! Cancellation primitives for predicate execution: a token that records why
//! it was cancelled, and a timer that cancels it at a deadline.

use crate::error::AbortReason;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Cancellation token carrying the reason it was cancelled
#[derive(Debug, Clone, Default)]
pub struct ExecutionToken {
    token: CancellationToken,
    reason: Arc<Mutex<Option<AbortReason>>>,
}

impl ExecutionToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token that is also cancelled when `parent` is cancelled
    pub fn linked(parent: Option<&CancellationToken>) -> Self {
        match parent {
            Some(parent) => Self {
                token: parent.child_token(),
                reason: Arc::new(Mutex::new(None)),
            },
            None => Self::new(),
        }
    }

    /// Cancel with a reason; the first recorded reason wins
    pub fn cancel(&self, reason: AbortReason) {
        {
            let mut slot = self.reason.lock();
            if slot.is_none() {
                *slot = Some(reason);
            }
        }
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Why the token was cancelled; a parent cancellation reports `External`
    pub fn reason(&self) -> Option<AbortReason> {
        if !self.is_cancelled() {
            return None;
        }
        Some(self.reason.lock().clone().unwrap_or(AbortReason::External))
    }

    /// Completes once the token is cancelled
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Token handed to predicates so they can observe cancellation cooperatively
    pub fn observer(&self) -> CancellationToken {
        self.token.child_token()
    }
}

/// Timer that cancels a token when it fires. Disarmed on drop.
#[derive(Debug)]
pub struct ArmedTimer {
    handle: Option<JoinHandle<()>>,
}

impl ArmedTimer {
    /// Arm a timer that cancels `token` with [`AbortReason::Timeout`] after `after`
    pub fn arm(token: ExecutionToken, after: Duration) -> Self {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            if !token.is_cancelled() {
                debug!(timeout_ms = after.as_millis() as u64, "Execution deadline reached");
                token.cancel(AbortReason::Timeout(after));
            }
        });
        Self {
            handle: Some(handle),
        }
    }

    pub fn is_armed(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    pub fn disarm(mut self) {
        self.abort();
    }

    fn abort(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for ArmedTimer {
    fn drop(&mut self) {
        self.abort();
    }
}
