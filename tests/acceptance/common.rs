//! Common utilities for acceptance tests.
//!
//! Provides:
//! - A virtual-clock driver that replays executor and watchdog ticks in
//!   time order against a real `TimerState`
//! - Helpers for running a coordinator for a bounded time

#![allow(dead_code)] // Not every helper is used by every test file

use rearm_common::config::TimerConfig;
use rearm_common::state::{Actor, Observation, TimerSnapshot};
use rearm_runtime::coordinator::{Coordinator, RunSummary};
use rearm_runtime::stop::StopSignal;
use rearm_runtime::timer_state::TimerState;
use std::thread;
use std::time::Duration;

/// What one simulated tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimEvent {
    /// Executor disarmed the timer and ran the expiry action.
    Fired,
    /// Executor ticked on a disarmed timer.
    Skipped,
    /// Watchdog rearmed a disarmed timer.
    Rearmed,
    /// Watchdog found the timer still armed.
    StillArmed,
}

/// One entry of the simulated timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimRecord {
    /// Virtual time of the tick.
    pub at: u64,
    /// Loop that ticked.
    pub actor: Actor,
    /// Effect of the tick.
    pub event: SimEvent,
}

/// Which loop runs first when both tick at the same virtual instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TieBreak {
    /// Executor tick, then watchdog tick.
    ExecutorFirst,
    /// Watchdog tick, then executor tick.
    WatchdogFirst,
}

/// Replay both loops on a virtual clock up to and including `horizon`.
pub fn simulate(
    executor_period: u64,
    watchdog_period: u64,
    horizon: u64,
    tie: TieBreak,
) -> (Vec<SimRecord>, TimerSnapshot) {
    let timer = TimerState::logging("sim", Duration::from_millis(executor_period))
        .expect("valid period");

    let mut log = Vec::new();
    let mut next_exec = executor_period;
    let mut next_wd = watchdog_period;

    while next_exec.min(next_wd) <= horizon {
        let executor_turn = match next_exec.cmp(&next_wd) {
            std::cmp::Ordering::Less => true,
            std::cmp::Ordering::Greater => false,
            std::cmp::Ordering::Equal => tie == TieBreak::ExecutorFirst,
        };

        if executor_turn {
            let event = if timer.try_fire_if_armed().fired() {
                SimEvent::Fired
            } else {
                SimEvent::Skipped
            };
            log.push(SimRecord {
                at: next_exec,
                actor: Actor::Executor,
                event,
            });
            next_exec += executor_period;
        } else {
            let event = match timer.peek_and_maybe_rearm() {
                Observation::Rearmed => SimEvent::Rearmed,
                Observation::StillArmed => SimEvent::StillArmed,
            };
            log.push(SimRecord {
                at: next_wd,
                actor: Actor::Watchdog,
                event,
            });
            next_wd += watchdog_period;
        }

        assert!(timer.snapshot().is_consistent());
    }

    (log, timer.snapshot())
}

/// Virtual times at which `event` happened.
pub fn times_of(log: &[SimRecord], event: SimEvent) -> Vec<u64> {
    log.iter()
        .filter(|r| r.event == event)
        .map(|r| r.at)
        .collect()
}

/// Configuration with short periods for real-thread tests.
pub fn fast_config(executor_ms: u64, watchdog_ms: u64) -> TimerConfig {
    TimerConfig {
        name: "acceptance".into(),
        executor_period: Duration::from_millis(executor_ms),
        watchdog_period: Duration::from_millis(watchdog_ms),
    }
}

/// Run `coordinator` on the current thread and stop it after `run_for`.
pub fn run_for(coordinator: &Coordinator, run_for: Duration) -> RunSummary {
    let stop = StopSignal::new();
    let stopper = {
        let stop = stop.clone();
        thread::spawn(move || {
            thread::sleep(run_for);
            stop.request_stop();
        })
    };

    let summary = coordinator.run(&stop).expect("coordinator run");
    stopper.join().expect("stopper thread");
    summary
}
