//! Configuration and failure scenarios.
//!
//! Covers a watchdog faster than the executor, expiry actions that fail
//! or panic, and a timer configured from a file.

use super::common::{fast_config, run_for, simulate, times_of, SimEvent, TieBreak};
use rearm_common::config::{TimerConfig, MAX_PERIOD};
use rearm_common::error::{TimerError, TimerResult};
use rearm_runtime::coordinator::Coordinator;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[test]
fn test_fast_watchdog_mostly_observes_armed() {
    let (log, snapshot) = simulate(1000, 300, 3000, TieBreak::ExecutorFirst);

    assert_eq!(times_of(&log, SimEvent::Fired), vec![1000, 2000, 3000]);
    assert_eq!(snapshot.fires, 3);
    assert_eq!(snapshot.rearms, 3);
    assert_eq!(snapshot.observed_armed, 7);
}

#[test]
fn test_fast_watchdog_real_threads_do_not_stall() {
    let coordinator = Coordinator::new(fast_config(40, 5)).unwrap();
    let summary = run_for(&coordinator, Duration::from_millis(300));

    assert!(summary.timer.is_consistent());
    assert!(summary.timer.fires >= 2);
    assert!(summary.timer.observed_armed > summary.timer.rearms);
}

#[test]
fn test_failing_expiry_keeps_cycling() {
    let calls = Arc::new(AtomicU64::new(0));
    let action = {
        let calls = Arc::clone(&calls);
        move |_: &str| -> TimerResult<()> {
            calls.fetch_add(1, Ordering::Relaxed);
            Err(TimerError::Expiry("downstream unavailable".into()))
        }
    };

    let coordinator = Coordinator::with_action(fast_config(10, 20), action).unwrap();
    let summary = run_for(&coordinator, Duration::from_millis(250));

    assert!(summary.timer.fires >= 2);
    assert_eq!(summary.timer.expiry_failures, summary.timer.fires);
    assert_eq!(calls.load(Ordering::Relaxed), summary.timer.fires);
    assert!(summary.timer.is_consistent());
}

#[test]
fn test_panicking_expiry_keeps_cycling() {
    let action = |timer: &str| -> TimerResult<()> { panic!("expiry for {timer} blew up") };

    let coordinator = Coordinator::with_action(fast_config(10, 20), action).unwrap();
    let summary = run_for(&coordinator, Duration::from_millis(250));

    assert!(summary.timer.fires >= 2);
    assert!(summary.timer.rearms >= 1);
    assert_eq!(summary.timer.expiry_failures, summary.timer.fires);
}

#[test]
fn test_config_file_drives_coordinator() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "name = \"from_file\"\nexecutor_period = \"10ms\"\nwatchdog_period = \"25ms\""
    )
    .unwrap();

    let config = TimerConfig::from_file(file.path()).unwrap();
    assert_eq!(config.name, "from_file");

    let coordinator = Coordinator::new(config).unwrap();
    assert_eq!(coordinator.timer().name(), "from_file");
    assert_eq!(coordinator.timer().period(), Duration::from_millis(10));

    let summary = run_for(&coordinator, Duration::from_millis(200));
    assert!(summary.timer.fires >= 2);
    assert!(summary.timer.is_consistent());
}

#[test]
fn test_zero_period_rejected() {
    let mut config = fast_config(10, 20);
    config.watchdog_period = Duration::ZERO;

    let err = Coordinator::new(config).unwrap_err();
    assert!(matches!(err, TimerError::Config(_)));
}

#[test]
fn test_period_past_instant_range_rejected_before_start() {
    let config = TimerConfig::from_toml(
        "executor_period = \"300000000000years\"\nwatchdog_period = \"1s\"",
    )
    .unwrap();

    let err = Coordinator::new(config).unwrap_err();
    assert!(matches!(err, TimerError::Config(_)));

    let mut config = fast_config(10, 20);
    config.watchdog_period = MAX_PERIOD * 2;
    assert!(matches!(Coordinator::new(config), Err(TimerError::Config(_))));
}
