//! Per-turn cooperative cancellation
//!
//! A shared Runnable/Cancelled flag both stages poll at their check points.
//! Cancellation never preempts an in-flight synthesis or playback call; it
//! only stops new work from starting.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

/// Cooperative cancellation token, cheaply cloneable
///
/// Scoped to one turn: the orchestrator resets it during interrupt
/// post-processing so no stale cancellation leaks into the next turn.
#[derive(Debug, Clone)]
pub struct CancelToken {
    // true = Runnable, false = Cancelled
    state: Arc<watch::Sender<bool>>,
}

impl CancelToken {
    /// New token in the Runnable state
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(true);
        Self { state: Arc::new(tx) }
    }

    /// Set Cancelled. Idempotent; returns whether this call made the
    /// transition (so concurrent cancels collapse to one).
    pub fn cancel(&self) -> bool {
        self.state.send_replace(false)
    }

    /// Set Runnable again, once cleanup for a cancelled turn is done
    pub fn reset(&self) {
        self.state.send_replace(true);
    }

    /// Non-blocking query
    pub fn is_runnable(&self) -> bool {
        *self.state.borrow()
    }

    /// Wait up to `timeout` for the token to be (or become) Runnable.
    ///
    /// Used only as the pre-turn guard; `false` means a previous
    /// cancellation's cleanup never reset the token in time.
    pub async fn await_runnable(&self, timeout: Duration) -> bool {
        let mut rx = self.state.subscribe();
        let became_runnable = matches!(
            tokio::time::timeout(timeout, rx.wait_for(|runnable| *runnable)).await,
            Ok(Ok(_))
        );
        became_runnable
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}
