//! Watchdog that rearms a fired timer.
//!
//! The watchdog ticks on its own period, independent of the executor. Each
//! tick atomically checks the timer and rearms it if the executor has
//! disarmed it since the last tick. It never touches the timer's period or
//! expiry action.
//!
//! The loop can be owned by the caller ([`Watchdog::run`]) or hosted by any
//! [`TickDispatcher`] ([`Watchdog::attach`]).

use crate::dispatch::{DispatchHandle, TickDispatcher};
use crate::stop::StopSignal;
use crate::timer_state::TimerState;
use rearm_common::config::check_period;
use rearm_common::error::TimerResult;
use rearm_common::state::Observation;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Periodic observer that rearms a disarmed timer.
#[derive(Debug, Clone)]
pub struct Watchdog {
    timer: Arc<TimerState>,
    period: Duration,
}

impl Watchdog {
    /// Create a watchdog for `timer` ticking every `period`.
    ///
    /// # Errors
    ///
    /// Returns [`rearm_common::TimerError::Config`] if `period` is zero or longer than
    /// [`rearm_common::config::MAX_PERIOD`].
    pub fn new(timer: Arc<TimerState>, period: Duration) -> TimerResult<Self> {
        check_period("watchdog period", period)?;
        if period < timer.period() {
            warn!(
                timer = %timer.name(),
                watchdog_period_ms = period.as_millis(),
                timer_period_ms = timer.period().as_millis(),
                "Watchdog ticks faster than the timer it watches"
            );
        }

        Ok(Self { timer, period })
    }

    /// Watchdog tick period.
    #[must_use]
    pub fn period(&self) -> Duration {
        self.period
    }

    /// The watched timer.
    #[must_use]
    pub fn timer(&self) -> &Arc<TimerState> {
        &self.timer
    }

    /// Inspect the timer once, rearming it if it was disarmed.
    pub fn tick(&self) -> Observation {
        let observation = self.timer.peek_and_maybe_rearm();
        match observation {
            Observation::Rearmed => {
                info!(timer = %self.timer.name(), "Timer was cancelled and reset");
            }
            Observation::StillArmed => {
                // Steady state has the timer disarmed here; only a fast
                // watchdog or a lost race lands in this branch
                debug!(timer = %self.timer.name(), "Timer was not cancelled");
            }
        }
        observation
    }

    /// Run the watchdog loop on the calling thread until `stop` is raised.
    pub fn run(&self, stop: &StopSignal) {
        info!(
            timer = %self.timer.name(),
            period_ms = self.period.as_millis(),
            "Watchdog running"
        );

        let mut next = Instant::now() + self.period;
        let mut ticks = 0u64;
        while !stop.wait_until(next) {
            next += self.period;
            let now = Instant::now();
            if next <= now {
                next = now + self.period;
            }
            self.tick();
            ticks += 1;
        }

        info!(timer = %self.timer.name(), ticks, "Watchdog stopped");
    }

    /// Register the watchdog tick as a repeating source on `dispatcher`.
    ///
    /// # Errors
    ///
    /// Propagates the dispatcher's scheduling error.
    pub fn attach<D>(&self, dispatcher: &D) -> TimerResult<DispatchHandle>
    where
        D: TickDispatcher + ?Sized,
    {
        let watchdog = self.clone();
        let handle = dispatcher.schedule_repeating(
            self.period,
            Box::new(move || {
                watchdog.tick();
                true
            }),
        )?;

        info!(
            timer = %self.timer.name(),
            period_ms = self.period.as_millis(),
            %handle,
            "Watchdog attached to dispatcher"
        );
        Ok(handle)
    }
}
