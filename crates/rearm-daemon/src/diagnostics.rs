//! Diagnostics snapshots for status reports and the final summary.

use rearm_common::metrics::TickSummary;
use rearm_common::state::{ArmState, TimerSnapshot};
use rearm_runtime::coordinator::RunSummary;
use rearm_runtime::timer_state::TimerState;
use serde::Serialize;
use std::time::Duration;

/// Health of the timer protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Fire/rearm cycle running without incident.
    Healthy,
    /// Expiry failures or coalesced ticks were seen.
    Degraded,
    /// Both loops have stopped.
    Stopped,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
            HealthStatus::Stopped => write!(f, "stopped"),
        }
    }
}

/// Snapshot of daemon diagnostics at a point in time.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticsSnapshot {
    /// Timer label.
    pub timer: String,
    /// Health status.
    pub health: HealthStatus,
    /// Arm state at snapshot time.
    pub state: ArmState,
    /// ARMED → DISARMED transitions.
    pub fires: u64,
    /// DISARMED → ARMED transitions.
    pub rearms: u64,
    /// Watchdog ticks that left an armed timer alone.
    pub observed_armed: u64,
    /// Fires whose expiry action failed.
    pub expiry_failures: u64,
    /// Executor statistics, only known once the executor has stopped.
    pub executor: Option<TickSummary>,
    /// Seconds since the run started.
    pub uptime_secs: f64,
}

impl DiagnosticsSnapshot {
    /// Live snapshot of a running timer.
    pub fn live(timer: &TimerState, uptime: Duration) -> Self {
        let snapshot = timer.snapshot();
        let health = if snapshot.expiry_failures > 0 {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };
        Self::build(timer.name(), health, &snapshot, None, uptime)
    }

    /// Final snapshot after a completed run.
    pub fn finished(timer: &str, summary: &RunSummary) -> Self {
        let health = if summary.timer.expiry_failures > 0 || summary.executor.coalesced > 0 {
            HealthStatus::Degraded
        } else {
            HealthStatus::Stopped
        };
        Self::build(
            timer,
            health,
            &summary.timer,
            Some(summary.executor),
            summary.elapsed,
        )
    }

    fn build(
        timer: &str,
        health: HealthStatus,
        snapshot: &TimerSnapshot,
        executor: Option<TickSummary>,
        uptime: Duration,
    ) -> Self {
        Self {
            timer: timer.to_string(),
            health,
            state: snapshot.state,
            fires: snapshot.fires,
            rearms: snapshot.rearms,
            observed_armed: snapshot.observed_armed,
            expiry_failures: snapshot.expiry_failures,
            executor,
            uptime_secs: uptime.as_secs_f64(),
        }
    }

    /// Pretty JSON rendering.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
