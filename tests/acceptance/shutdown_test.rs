//! Shutdown tests.
//!
//! Raising the stop signal must end a run promptly whether the loops are
//! waiting out a long period or the executor is inside a slow expiry.

use super::common::fast_config;
use rearm_common::error::TimerResult;
use rearm_runtime::coordinator::Coordinator;
use rearm_runtime::stop::StopSignal;
use std::thread;
use std::time::{Duration, Instant};

fn stop_after(stop: &StopSignal, delay: Duration) -> thread::JoinHandle<()> {
    let stop = stop.clone();
    thread::spawn(move || {
        thread::sleep(delay);
        stop.request_stop();
    })
}

#[test]
fn test_stop_during_long_periods_is_prompt() {
    let mut config = fast_config(10, 20);
    config.executor_period = Duration::from_secs(30);
    config.watchdog_period = Duration::from_secs(60);
    let coordinator = Coordinator::new(config).unwrap();

    let stop = StopSignal::new();
    let stopper = stop_after(&stop, Duration::from_millis(50));

    let started = Instant::now();
    let summary = coordinator.run(&stop).unwrap();
    stopper.join().unwrap();

    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(summary.timer.fires, 0);
    assert_eq!(summary.timer.rearms, 0);
}

#[test]
fn test_stop_during_slow_expiry_waits_for_action_only() {
    let action = |_: &str| -> TimerResult<()> {
        thread::sleep(Duration::from_millis(200));
        Ok(())
    };
    let coordinator = Coordinator::with_action(fast_config(10, 5000), action).unwrap();

    let stop = StopSignal::new();
    let stopper = stop_after(&stop, Duration::from_millis(60));

    let started = Instant::now();
    let summary = coordinator.run(&stop).unwrap();
    stopper.join().unwrap();

    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(summary.timer.fires, 1);
    assert_eq!(summary.timer.expiry_failures, 0);
}

#[test]
fn test_stop_before_run_returns_immediately() {
    let coordinator = Coordinator::new(fast_config(10, 20)).unwrap();
    let stop = StopSignal::new();
    stop.request_stop();

    let started = Instant::now();
    let summary = coordinator.run(&stop).unwrap();

    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(summary.timer.fires, 0);
    assert!(summary.timer.state.is_armed());
}

#[test]
fn test_timer_survives_run_and_can_run_again() {
    let coordinator = Coordinator::new(fast_config(10, 20)).unwrap();

    let stop = StopSignal::new();
    let stopper = stop_after(&stop, Duration::from_millis(100));
    let first = coordinator.run(&stop).unwrap();
    stopper.join().unwrap();

    let stop = StopSignal::new();
    let stopper = stop_after(&stop, Duration::from_millis(100));
    let second = coordinator.run(&stop).unwrap();
    stopper.join().unwrap();

    assert!(second.timer.fires >= first.timer.fires);
    assert!(second.timer.is_consistent());
}
