//! Cross-thread stop request shared by every loop.
//!
//! Loops sleep on a condition variable instead of `thread::sleep`, so a stop
//! request wakes them immediately rather than after their current period.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Default)]
struct StopInner {
    stopped: Mutex<bool>,
    wake: Condvar,
}

/// Cloneable handle to a one-shot stop request.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    inner: Arc<StopInner>,
}

impl StopSignal {
    /// Create a signal in the running state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request every waiter to return (can be called from any thread).
    pub fn request_stop(&self) {
        let mut stopped = self
            .inner
            .stopped
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !*stopped {
            *stopped = true;
            debug!("Stop requested");
        }
        self.inner.wake.notify_all();
    }

    /// Check if a stop has been requested.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        *self
            .inner
            .stopped
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until `deadline` or a stop request, whichever comes first.
    ///
    /// Returns `true` if the stop was requested.
    pub fn wait_until(&self, deadline: Instant) -> bool {
        let mut stopped = self
            .inner
            .stopped
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        // Spurious wake-ups loop back until the deadline really passed
        while !*stopped {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            stopped = self
                .inner
                .wake
                .wait_timeout(stopped, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }

    /// Block for at most `timeout`. Returns `true` if the stop was requested.
    ///
    /// A timeout past the end of the `Instant` range waits for the stop alone.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.wait_until(deadline),
            None => {
                self.wait();
                true
            }
        }
    }

    /// Block until a stop is requested.
    pub fn wait(&self) {
        let mut stopped = self
            .inner
            .stopped
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        while !*stopped {
            stopped = self
                .inner
                .wake
                .wait(stopped)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}
