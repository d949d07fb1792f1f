//! Executor loop that fires the timer on its period.
//!
//! The executor wakes against absolute deadlines (`next = previous + period`)
//! so wake-up latency does not accumulate as drift. When the thread wakes
//! after several boundaries have passed, it fires at most once and skips
//! ahead to the first boundary still in the future.

use crate::stop::StopSignal;
use crate::timer_state::TimerState;
use rearm_common::error::{TimerError, TimerResult};
use rearm_common::metrics::TickMetrics;
use rearm_common::state::FireOutcome;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Name of the executor thread.
pub const EXECUTOR_THREAD_NAME: &str = "rearm-executor";

/// Result of a single executor tick.
#[derive(Debug, Clone)]
pub struct TickResult {
    /// Tick number, starting at 1.
    pub tick: u64,
    /// What the tick did to the timer.
    pub outcome: FireOutcome,
    /// How late the wake-up was relative to its deadline.
    pub lateness: Duration,
    /// Period boundaries skipped before this tick.
    pub coalesced: u64,
}

/// Single-threaded loop that fires a [`TimerState`] once per period.
#[derive(Debug)]
pub struct Executor {
    timer: Arc<TimerState>,
    stop: StopSignal,
    /// Next tick deadline (absolute time).
    next_deadline: Option<Instant>,
    tick_count: u64,
    metrics: TickMetrics,
}

impl Executor {
    /// Create an executor for `timer` that exits when `stop` is raised.
    #[must_use]
    pub fn new(timer: Arc<TimerState>, stop: StopSignal) -> Self {
        Self {
            timer,
            stop,
            next_deadline: None,
            tick_count: 0,
            metrics: TickMetrics::new(),
        }
    }

    /// The timer driven by this executor.
    #[must_use]
    pub fn timer(&self) -> &Arc<TimerState> {
        &self.timer
    }

    /// Ticks executed so far.
    #[must_use]
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Tick metrics collected so far.
    #[must_use]
    pub fn metrics(&self) -> &TickMetrics {
        &self.metrics
    }

    /// Wait for the next deadline and tick once.
    ///
    /// Returns `None` if the stop signal was raised while waiting.
    pub fn spin_once(&mut self) -> Option<TickResult> {
        let period = self.timer.period();
        let deadline = *self
            .next_deadline
            .get_or_insert_with(|| Instant::now() + period);

        if self.stop.wait_until(deadline) {
            return None;
        }

        let lateness = Instant::now().saturating_duration_since(deadline);
        let coalesced = u64::try_from(lateness.as_nanos() / period.as_nanos()).unwrap_or(u64::MAX);
        let advance = u32::try_from(coalesced.saturating_add(1)).unwrap_or(u32::MAX);
        self.next_deadline = Some(deadline + period.saturating_mul(advance));

        if coalesced > 0 {
            warn!(
                timer = %self.timer.name(),
                coalesced,
                lateness_us = lateness.as_micros(),
                "Executor woke late, coalescing missed ticks"
            );
        }

        let outcome = self.timer.try_fire_if_armed();
        self.tick_count += 1;

        match &outcome {
            FireOutcome::Fired => {
                debug!(timer = %self.timer.name(), tick = self.tick_count, "Timer fired");
            }
            FireOutcome::FiredWithError(e) => {
                warn!(
                    timer = %self.timer.name(),
                    tick = self.tick_count,
                    error = %e,
                    "Expiry action failed, timer stays disarmed"
                );
            }
            FireOutcome::NotFired => {}
        }

        self.metrics.record(lateness, outcome.fired(), coalesced);

        trace!(
            tick = self.tick_count,
            lateness_us = lateness.as_micros(),
            "Executor tick complete"
        );

        Some(TickResult {
            tick: self.tick_count,
            outcome,
            lateness,
            coalesced,
        })
    }

    /// Run the executor loop until the stop signal is raised.
    ///
    /// This blocks the current thread. Expiry failures never end the loop.
    pub fn spin(&mut self) {
        info!(
            timer = %self.timer.name(),
            period_ms = self.timer.period().as_millis(),
            "Executor spinning"
        );

        while self.spin_once().is_some() {}

        info!(
            timer = %self.timer.name(),
            ticks = self.tick_count,
            fired = self.metrics.fired_ticks(),
            coalesced = self.metrics.coalesced(),
            "Executor stopped"
        );
    }

    /// Move the executor onto its own thread and start spinning.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::Spawn`] if the thread cannot be created.
    pub fn spawn(mut self) -> TimerResult<ExecutorHandle> {
        let stop = self.stop.clone();

        let handle = thread::Builder::new()
            .name(EXECUTOR_THREAD_NAME.into())
            .spawn(move || {
                self.spin();
                self.metrics
            })
            .map_err(|e| TimerError::Spawn {
                thread: EXECUTOR_THREAD_NAME.into(),
                reason: e.to_string(),
            })?;

        Ok(ExecutorHandle { handle, stop })
    }
}

/// Handle to an executor running on its own thread.
#[derive(Debug)]
pub struct ExecutorHandle {
    handle: JoinHandle<TickMetrics>,
    stop: StopSignal,
}

impl ExecutorHandle {
    /// Raise the stop signal shared with the executor.
    pub fn stop(&self) {
        self.stop.request_stop();
    }

    /// Wait for the executor thread and return its final metrics.
    ///
    /// Does not raise the stop signal by itself.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::ThreadPanicked`] if the thread panicked.
    pub fn join(self) -> TimerResult<TickMetrics> {
        self.handle
            .join()
            .map_err(|_| TimerError::ThreadPanicked(EXECUTOR_THREAD_NAME.into()))
    }
}
