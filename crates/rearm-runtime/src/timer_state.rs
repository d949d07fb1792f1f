//! Shared state of one self-cancelling periodic timer.
//!
//! The executor and the watchdog each hold an `Arc<TimerState>`. Every read
//! and write of the arm flag goes through one mutex, so the sequence of arm
//! states seen by any observer is a single total order.

use rearm_common::config::check_period;
use rearm_common::error::{TimerError, TimerResult};
use rearm_common::state::{Actor, ArmState, FireOutcome, Observation, TimerSnapshot};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{info, trace};

/// Action run by the executor when an armed timer expires.
///
/// The handler runs while the timer lock is held. It must not call back
/// into the [`TimerState`] that invoked it.
pub trait ExpiryHandler: Send + Sync {
    /// Handle one expiry of the timer named `timer`.
    fn on_expiry(&self, timer: &str) -> TimerResult<()>;
}

impl<F> ExpiryHandler for F
where
    F: Fn(&str) -> TimerResult<()> + Send + Sync,
{
    fn on_expiry(&self, timer: &str) -> TimerResult<()> {
        self(timer)
    }
}

/// Expiry handler that only emits a log line.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogExpiry;

impl ExpiryHandler for LogExpiry {
    fn on_expiry(&self, timer: &str) -> TimerResult<()> {
        info!(timer, "Timer fired, cancelling until rearmed");
        Ok(())
    }
}

/// Data guarded by the timer lock.
#[derive(Debug)]
struct ArmCell {
    armed: bool,
    fires: u64,
    rearms: u64,
    observed_armed: u64,
    expiry_failures: u64,
}

impl ArmCell {
    fn transition(&mut self, target: ArmState, actor: Actor) {
        debug_assert!(
            ArmState::from(self.armed).can_transition_to(target, actor),
            "{actor} may not move the timer from {} to {target}",
            ArmState::from(self.armed)
        );
        self.armed = target.is_armed();
    }

    fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            state: ArmState::from(self.armed),
            fires: self.fires,
            rearms: self.rearms,
            observed_armed: self.observed_armed,
            expiry_failures: self.expiry_failures,
        }
    }
}

/// One periodic timer: immutable period, lock-guarded arm flag, expiry action.
pub struct TimerState {
    name: String,
    period: Duration,
    cell: Mutex<ArmCell>,
    action: Box<dyn ExpiryHandler>,
}

impl fmt::Debug for TimerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerState")
            .field("name", &self.name)
            .field("period", &self.period)
            .field("state", &self.snapshot().state)
            .finish_non_exhaustive()
    }
}

impl TimerState {
    /// Create an armed timer.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::Config`] if `period` is zero or longer than
    /// [`rearm_common::config::MAX_PERIOD`].
    pub fn new(
        name: impl Into<String>,
        period: Duration,
        action: impl ExpiryHandler + 'static,
    ) -> TimerResult<Self> {
        let name = name.into();
        check_period(&format!("timer '{name}' period"), period)?;

        Ok(Self {
            name,
            period,
            cell: Mutex::new(ArmCell {
                armed: true,
                fires: 0,
                rearms: 0,
                observed_armed: 0,
                expiry_failures: 0,
            }),
            action: Box::new(action),
        })
    }

    /// Create an armed timer whose expiry only logs.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::Config`] for a period [`TimerState::new`] rejects.
    pub fn logging(name: impl Into<String>, period: Duration) -> TimerResult<Self> {
        Self::new(name, period, LogExpiry)
    }

    /// Timer label used in log events.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fixed firing period.
    #[must_use]
    pub fn period(&self) -> Duration {
        self.period
    }

    // The guarded data is always left consistent, so a poisoned lock is usable.
    fn lock(&self) -> MutexGuard<'_, ArmCell> {
        self.cell.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fire the timer if it is armed. Executor only.
    ///
    /// Disarms first, then runs the expiry action under the lock. An action
    /// error or panic is captured in the outcome; the disarm stands either way.
    pub fn try_fire_if_armed(&self) -> FireOutcome {
        let mut cell = self.lock();
        if !cell.armed {
            trace!(timer = %self.name, "Tick on disarmed timer");
            return FireOutcome::NotFired;
        }

        cell.transition(ArmState::Disarmed, Actor::Executor);
        cell.fires += 1;

        let result = panic::catch_unwind(AssertUnwindSafe(|| self.action.on_expiry(&self.name)));
        match result {
            Ok(Ok(())) => FireOutcome::Fired,
            Ok(Err(e)) => {
                cell.expiry_failures += 1;
                FireOutcome::FiredWithError(e)
            }
            Err(payload) => {
                cell.expiry_failures += 1;
                FireOutcome::FiredWithError(TimerError::Expiry(format!(
                    "expiry action panicked: {}",
                    panic_message(payload.as_ref())
                )))
            }
        }
    }

    /// Snapshot read of the arm flag.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.lock().armed
    }

    /// Current arm state.
    #[must_use]
    pub fn state(&self) -> ArmState {
        ArmState::from(self.is_armed())
    }

    /// Arm the timer regardless of its prior state. Watchdog only.
    ///
    /// Rearming an armed timer changes nothing.
    pub fn rearm(&self) {
        let mut cell = self.lock();
        if !cell.armed {
            cell.transition(ArmState::Armed, Actor::Watchdog);
            cell.rearms += 1;
            info!(timer = %self.name, "Timer rearmed");
        }
    }

    /// Read the arm flag and rearm if disarmed, as one critical section.
    ///
    /// No executor fire can land between the read and the write.
    pub fn peek_and_maybe_rearm(&self) -> Observation {
        let mut cell = self.lock();
        if cell.armed {
            cell.observed_armed += 1;
            Observation::StillArmed
        } else {
            cell.transition(ArmState::Armed, Actor::Watchdog);
            cell.rearms += 1;
            Observation::Rearmed
        }
    }

    /// Arm flag and counters read under one lock acquisition.
    #[must_use]
    pub fn snapshot(&self) -> TimerSnapshot {
        self.lock().snapshot()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
