//! Wiring of timer, executor and watchdog into one blocking run.
//!
//! The coordinator owns the shared [`TimerState`]. A run starts the executor
//! on its own thread, hosts the watchdog on a [`ThreadDispatcher`], parks the
//! calling thread until the stop signal is raised, then joins both loops.

use crate::dispatch::ThreadDispatcher;
use crate::executor::Executor;
use crate::stop::StopSignal;
use crate::timer_state::{ExpiryHandler, LogExpiry, TimerState};
use crate::watchdog::Watchdog;
use rearm_common::config::TimerConfig;
use rearm_common::error::TimerResult;
use rearm_common::metrics::TickSummary;
use rearm_common::state::TimerSnapshot;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};

/// Outcome of one coordinated run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Timer state and counters after both loops stopped.
    pub timer: TimerSnapshot,
    /// Executor tick statistics.
    pub executor: TickSummary,
    /// Wall time between start and shutdown.
    #[serde(serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

fn serialize_millis<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
}

/// Process-level owner of the timer and both loops.
#[derive(Debug)]
pub struct Coordinator {
    config: TimerConfig,
    timer: Arc<TimerState>,
}

impl Coordinator {
    /// Validate `config` and build an armed timer whose expiry only logs.
    ///
    /// # Errors
    ///
    /// Returns [`rearm_common::TimerError::Config`] for an invalid configuration.
    pub fn new(config: TimerConfig) -> TimerResult<Self> {
        Self::with_action(config, LogExpiry)
    }

    /// Validate `config` and build an armed timer running `action` on expiry.
    ///
    /// # Errors
    ///
    /// Returns [`rearm_common::TimerError::Config`] for an invalid configuration.
    pub fn with_action(
        config: TimerConfig,
        action: impl ExpiryHandler + 'static,
    ) -> TimerResult<Self> {
        config.validate()?;
        let timer = Arc::new(TimerState::new(
            config.name.clone(),
            config.executor_period,
            action,
        )?);
        Ok(Self { config, timer })
    }

    /// Configuration this coordinator was built from.
    #[must_use]
    pub fn config(&self) -> &TimerConfig {
        &self.config
    }

    /// The shared timer, for observation while a run is in progress.
    #[must_use]
    pub fn timer(&self) -> &Arc<TimerState> {
        &self.timer
    }

    /// Run executor and watchdog until `stop` is raised.
    ///
    /// Blocks the calling thread. If either loop fails to start, `stop` is
    /// raised so anything already running exits, and the error is returned.
    ///
    /// # Errors
    ///
    /// Returns a spawn or dispatch error if a loop cannot start, or
    /// [`rearm_common::TimerError::ThreadPanicked`] if the executor panicked.
    pub fn run(&self, stop: &StopSignal) -> TimerResult<RunSummary> {
        let started = Instant::now();
        info!(
            timer = %self.config.name,
            executor_period = ?self.config.executor_period,
            watchdog_period = ?self.config.watchdog_period,
            "Starting coordinator"
        );

        let watchdog = Watchdog::new(Arc::clone(&self.timer), self.config.watchdog_period)?;
        let dispatcher = ThreadDispatcher::new();

        let executor = Executor::new(Arc::clone(&self.timer), stop.clone()).spawn()?;

        if let Err(e) = watchdog.attach(&dispatcher) {
            error!(error = %e, "Watchdog failed to start, stopping executor");
            executor.stop();
            // The attach error is what the caller needs to see
            let _ = executor.join();
            return Err(e);
        }

        dispatcher.run(stop);

        info!("Shutting down executor");
        executor.stop();
        let metrics = executor.join()?;

        let summary = RunSummary {
            timer: self.timer.snapshot(),
            executor: metrics.summary(),
            elapsed: started.elapsed(),
        };

        info!(
            timer = %self.config.name,
            fires = summary.timer.fires,
            rearms = summary.timer.rearms,
            observed_armed = summary.timer.observed_armed,
            expiry_failures = summary.timer.expiry_failures,
            final_state = %summary.timer.state,
            "Coordinator shutdown complete"
        );

        Ok(summary)
    }
}
