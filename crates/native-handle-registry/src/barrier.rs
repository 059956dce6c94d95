//! One-shot initialization barrier.
//!
//! Registry calls may arrive before the slab exists. They park here until
//! initialization fulfills the barrier, without polling and without blocking
//! other tasks.

use tokio::sync::watch;

/// Single-fire broadcast signal with states {pending, fulfilled}.
#[derive(Debug)]
pub struct InitBarrier {
    ready_tx: watch::Sender<bool>,
}

impl InitBarrier {
    /// Create a pending barrier.
    pub fn new() -> Self {
        let (ready_tx, _) = watch::channel(false);
        Self { ready_tx }
    }

    /// Release every current and future waiter. Later calls have no effect.
    pub fn fulfill(&self) {
        self.ready_tx.send_if_modified(|ready| !std::mem::replace(ready, true));
    }

    pub fn is_fulfilled(&self) -> bool {
        *self.ready_tx.borrow()
    }

    /// Wait until the barrier is fulfilled. Returns immediately if it already is.
    pub async fn wait(&self) {
        let mut ready_rx = self.ready_tx.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = ready_rx.wait_for(|ready| *ready).await;
    }
}

impl Default for InitBarrier {
    fn default() -> Self {
        Self::new()
    }
}
