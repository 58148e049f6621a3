//! Chord expiry timer.
//!
//! At most one wait is scheduled at a time. Arming a new wait cancels the
//! previous one, and a cancelled wait never calls back.

use std::{future::Future, time::Instant};

use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// The scheduled wait.
struct Armed {
    /// Automaton generation the wait belongs to.
    generation: u64,
    /// Cancels the sleeping task.
    token: CancellationToken,
}

/// Single-slot expiry timer keyed by automaton generation.
#[derive(Default)]
pub struct ExpiryTimer {
    /// The scheduled wait, if any.
    current: Option<Armed>,
}

impl ExpiryTimer {
    /// Create an idle timer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Generation of the scheduled wait, if any.
    pub fn generation(&self) -> Option<u64> {
        self.current.as_ref().map(|a| a.generation)
    }

    /// Schedule `on_expire` at `deadline`, replacing any scheduled wait.
    ///
    /// Must be called from within a tokio runtime.
    pub fn arm<F, Fut>(&mut self, generation: u64, deadline: Instant, on_expire: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        self.cancel();
        let token = CancellationToken::new();
        let cancel = token.clone();
        let at = time::Instant::from_std(deadline);
        trace!(generation, "expiry_armed");
        tokio::spawn(async move {
            tokio::select! {
                _ = time::sleep_until(at) => {}
                _ = cancel.cancelled() => {
                    trace!(generation, "expiry_cancelled");
                    return;
                }
            }
            on_expire().await;
        });
        self.current = Some(Armed { generation, token });
    }

    /// Cancel the scheduled wait, if any.
    pub fn cancel(&mut self) {
        if let Some(a) = self.current.take() {
            a.token.cancel();
        }
    }
}

impl Drop for ExpiryTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
