//! Repeating-callback dispatcher that hosts the watchdog tick.
//!
//! The core only depends on the [`TickDispatcher`] trait. [`ThreadDispatcher`]
//! is the provided host: each repeating source runs on its own named thread,
//! and [`ThreadDispatcher::run`] parks the calling thread until shutdown.

use crate::stop::StopSignal;
use rearm_common::config::MAX_PERIOD;
use rearm_common::error::{TimerError, TimerResult};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Callback run on every tick of a repeating source.
///
/// Returning `false` removes the source, `true` keeps it scheduled.
pub type TickCallback = Box<dyn FnMut() -> bool + Send + 'static>;

/// Identifier of a scheduled repeating source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DispatchHandle(u64);

impl DispatchHandle {
    /// Wrap a dispatcher-specific source id.
    #[must_use]
    pub fn from_raw(id: u64) -> Self {
        Self(id)
    }

    /// Dispatcher-specific source id.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for DispatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "source#{}", self.0)
    }
}

/// Host for periodic callbacks.
pub trait TickDispatcher {
    /// Run `callback` every `period` until it returns `false` or is stopped.
    ///
    /// # Errors
    ///
    /// Returns an error if the period is zero or above
    /// [`MAX_PERIOD`], or if the source cannot be started.
    fn schedule_repeating(
        &self,
        period: Duration,
        callback: TickCallback,
    ) -> TimerResult<DispatchHandle>;

    /// Stop a source and wait for its current callback to finish.
    ///
    /// Returns `false` if the handle is unknown or already stopped.
    fn stop(&self, handle: DispatchHandle) -> bool;
}

struct Source {
    stop: StopSignal,
    thread: JoinHandle<()>,
}

/// Dispatcher running each repeating source on a dedicated thread.
#[derive(Default)]
pub struct ThreadDispatcher {
    next_id: AtomicU64,
    sources: Mutex<HashMap<u64, Source>>,
}

impl fmt::Debug for ThreadDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadDispatcher")
            .field("sources", &self.source_count())
            .finish()
    }
}

impl ThreadDispatcher {
    /// Create a dispatcher with no sources.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn sources(&self) -> MutexGuard<'_, HashMap<u64, Source>> {
        self.sources.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of sources whose thread is still running.
    ///
    /// Sources that removed themselves are reaped here.
    #[must_use]
    pub fn source_count(&self) -> usize {
        let mut sources = self.sources();
        reap_finished(&mut sources);
        sources.len()
    }

    /// Block the calling thread until `stop` is raised, then stop every source.
    pub fn run(&self, stop: &StopSignal) {
        info!(sources = self.source_count(), "Dispatcher running");
        stop.wait();
        self.shutdown();
        info!("Dispatcher stopped");
    }

    /// Stop and join every source.
    pub fn shutdown(&self) {
        let drained: Vec<(u64, Source)> = self.sources().drain().collect();
        for (id, source) in drained {
            stop_source(DispatchHandle(id), source);
        }
    }
}

impl TickDispatcher for ThreadDispatcher {
    fn schedule_repeating(
        &self,
        period: Duration,
        mut callback: TickCallback,
    ) -> TimerResult<DispatchHandle> {
        if period.is_zero() {
            return Err(TimerError::Dispatch(
                "repeating source period must be greater than 0".into(),
            ));
        }
        if period > MAX_PERIOD {
            return Err(TimerError::Dispatch(format!(
                "repeating source period {period:?} exceeds {MAX_PERIOD:?}"
            )));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = DispatchHandle(id);
        let stop = StopSignal::new();
        let source_stop = stop.clone();
        let thread_name = format!("rearm-dispatch-{id}");

        let thread = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                debug!(%handle, period_ms = period.as_millis(), "Repeating source started");
                let mut next = Instant::now() + period;

                while !source_stop.wait_until(next) {
                    next += period;
                    let now = Instant::now();
                    if next <= now {
                        // Fell behind; resume cadence from now
                        next = now + period;
                    }

                    if !callback() {
                        debug!(%handle, "Repeating source removed by its callback");
                        break;
                    }
                }

                debug!(%handle, "Repeating source stopped");
            })
            .map_err(|e| TimerError::Spawn {
                thread: thread_name,
                reason: e.to_string(),
            })?;

        let mut sources = self.sources();
        reap_finished(&mut sources);
        sources.insert(id, Source { stop, thread });
        Ok(handle)
    }

    fn stop(&self, handle: DispatchHandle) -> bool {
        let source = self.sources().remove(&handle.0);
        match source {
            Some(source) => {
                stop_source(handle, source);
                true
            }
            None => false,
        }
    }
}

impl Drop for ThreadDispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn reap_finished(sources: &mut HashMap<u64, Source>) {
    let finished: Vec<u64> = sources
        .iter()
        .filter(|(_, source)| source.thread.is_finished())
        .map(|(id, _)| *id)
        .collect();

    for id in finished {
        if let Some(source) = sources.remove(&id) {
            stop_source(DispatchHandle(id), source);
        }
    }
}

fn stop_source(handle: DispatchHandle, source: Source) {
    source.stop.request_stop();

    // A callback stopping its own source cannot join itself
    if source.thread.thread().id() == thread::current().id() {
        return;
    }
    if let Err(e) = source.thread.join() {
        warn!(%handle, "Repeating source thread panicked: {:?}", e);
    }
}
