//! Arm-state machine for a self-cancelling periodic timer.
//!
//! ARMED → DISARMED happens when the executor fires the timer;
//! DISARMED → ARMED happens when the watchdog rearms it.
//! There is no terminal state: the machine cycles until shutdown.

use crate::error::TimerError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Arm state of the shared timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArmState {
    /// Eligible to fire at the next executor tick.
    #[default]
    Armed,
    /// Already fired; waiting for the watchdog.
    Disarmed,
}

impl fmt::Display for ArmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Armed => write!(f, "ARMED"),
            Self::Disarmed => write!(f, "DISARMED"),
        }
    }
}

impl From<bool> for ArmState {
    fn from(armed: bool) -> Self {
        if armed {
            Self::Armed
        } else {
            Self::Disarmed
        }
    }
}

/// The loop that drives a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Actor {
    /// Fires the timer on its own period.
    Executor,
    /// Inspects and rearms the timer on an independent period.
    Watchdog,
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Executor => write!(f, "executor"),
            Self::Watchdog => write!(f, "watchdog"),
        }
    }
}

impl ArmState {
    /// Check whether `actor` may move the timer from this state to `target`.
    ///
    /// Self-loops are always allowed; they are the no-op ticks.
    #[must_use]
    pub fn can_transition_to(&self, target: ArmState, actor: Actor) -> bool {
        use ArmState::{Armed, Disarmed};

        matches!(
            (self, target, actor),
            (Armed, Disarmed, Actor::Executor)
                | (Disarmed, Armed, Actor::Watchdog)
                | (Armed, Armed, _)
                | (Disarmed, Disarmed, _)
        )
    }

    /// Returns true if the executor would fire on its next tick.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        matches!(self, Self::Armed)
    }
}

/// Result of one executor tick against the timer.
#[derive(Debug, Clone, PartialEq)]
pub enum FireOutcome {
    /// The timer was disarmed; nothing ran.
    NotFired,
    /// The timer was disarmed and the expiry action succeeded.
    Fired,
    /// The timer was disarmed but the expiry action failed.
    ///
    /// The disarm stands: a failed expiry still counts as fired.
    FiredWithError(TimerError),
}

impl FireOutcome {
    /// Whether this tick performed the ARMED → DISARMED transition.
    #[must_use]
    pub fn fired(&self) -> bool {
        !matches!(self, Self::NotFired)
    }
}

/// Result of one watchdog tick against the timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Observation {
    /// Timer was disarmed and has been rearmed.
    Rearmed,
    /// Timer was still armed and was left alone.
    StillArmed,
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rearmed => write!(f, "rearmed after being disarmed"),
            Self::StillArmed => write!(f, "observed still armed"),
        }
    }
}

/// Consistent view of the timer taken under its lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimerSnapshot {
    /// Arm state at the time of the snapshot.
    pub state: ArmState,
    /// Number of ARMED → DISARMED transitions.
    pub fires: u64,
    /// Number of DISARMED → ARMED transitions.
    pub rearms: u64,
    /// Watchdog ticks that found the timer still armed.
    pub observed_armed: u64,
    /// Fires whose expiry action failed.
    pub expiry_failures: u64,
}

impl TimerSnapshot {
    /// Fired at most once per rearm, plus the initial arm.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let expected_armed = self.fires == self.rearms;
        self.fires <= self.rearms + 1 && self.state.is_armed() == expected_armed
    }
}
