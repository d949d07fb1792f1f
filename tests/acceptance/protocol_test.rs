//! Fire/rearm protocol tests.
//!
//! Checks the cycle on a virtual clock for exact counts, then on real
//! threads for the single-disarm and liveness properties.

use super::common::{fast_config, run_for, simulate, times_of, SimEvent, TieBreak};
use rearm_common::state::{Actor, ArmState};
use rearm_runtime::coordinator::Coordinator;
use rearm_runtime::stop::StopSignal;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn test_default_periods_watchdog_first_on_ties() {
    let (log, snapshot) = simulate(500, 1000, 5000, TieBreak::WatchdogFirst);

    assert_eq!(
        times_of(&log, SimEvent::Fired),
        vec![500, 1000, 2000, 3000, 4000, 5000]
    );
    assert_eq!(snapshot.fires, 6);
    assert_eq!(snapshot.rearms, 5);
    assert_eq!(snapshot.state, ArmState::Disarmed);
}

#[test]
fn test_default_periods_executor_first_on_ties() {
    let (log, snapshot) = simulate(500, 1000, 5000, TieBreak::ExecutorFirst);

    assert_eq!(
        times_of(&log, SimEvent::Fired),
        vec![500, 1500, 2500, 3500, 4500]
    );
    assert_eq!(times_of(&log, SimEvent::Rearmed).len(), 5);
    assert_eq!(snapshot.fires, 5);
    assert_eq!(snapshot.rearms, 5);
    assert_eq!(snapshot.state, ArmState::Armed);
}

#[test]
fn test_every_fire_separated_by_one_rearm() {
    for tie in [TieBreak::ExecutorFirst, TieBreak::WatchdogFirst] {
        for (exec, wd) in [(500, 1000), (300, 700), (1000, 300), (250, 250)] {
            let (log, _) = simulate(exec, wd, 20_000, tie);

            let transitions: Vec<SimEvent> = log
                .iter()
                .map(|r| r.event)
                .filter(|e| matches!(e, SimEvent::Fired | SimEvent::Rearmed))
                .collect();

            for pair in transitions.windows(2) {
                assert_ne!(pair[0], pair[1], "exec={exec} wd={wd} tie={tie:?}");
            }
            assert_eq!(transitions.first(), Some(&SimEvent::Fired));
        }
    }
}

#[test]
fn test_only_watchdog_rearms_and_only_executor_fires() {
    let (log, _) = simulate(400, 900, 10_000, TieBreak::ExecutorFirst);

    for record in &log {
        match record.event {
            SimEvent::Fired | SimEvent::Skipped => assert_eq!(record.actor, Actor::Executor),
            SimEvent::Rearmed | SimEvent::StillArmed => assert_eq!(record.actor, Actor::Watchdog),
        }
    }
}

#[test]
fn test_next_fire_follows_each_rearm() {
    let exec = 500;
    let (log, _) = simulate(exec, 1000, 10_000, TieBreak::ExecutorFirst);

    let fires = times_of(&log, SimEvent::Fired);
    for rearm in times_of(&log, SimEvent::Rearmed) {
        if rearm + exec <= 10_000 {
            assert!(
                fires.iter().any(|&f| f > rearm && f <= rearm + exec),
                "no fire within one executor period of rearm at {rearm}"
            );
        }
    }
}

#[test]
fn test_real_threads_cycle_and_stay_consistent() {
    let coordinator = Coordinator::new(fast_config(20, 40)).unwrap();
    let timer = Arc::clone(coordinator.timer());
    let stop = StopSignal::new();

    let sampler = {
        let stop = stop.clone();
        thread::spawn(move || {
            let mut samples = 0u32;
            while !stop.wait_timeout(Duration::from_millis(1)) {
                let snapshot = timer.snapshot();
                assert!(snapshot.is_consistent(), "inconsistent: {snapshot:?}");
                samples += 1;
            }
            samples
        })
    };

    let stopper = {
        let stop = stop.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(400));
            stop.request_stop();
        })
    };

    let summary = coordinator.run(&stop).unwrap();
    stopper.join().unwrap();
    let samples = sampler.join().unwrap();

    assert!(samples > 0);
    assert!(summary.timer.is_consistent());
    assert!(summary.timer.fires >= 3, "fires: {}", summary.timer.fires);
    assert!(summary.timer.rearms >= 2, "rearms: {}", summary.timer.rearms);
    assert!(summary.executor.total_ticks >= summary.executor.fired_ticks);
    assert_eq!(summary.executor.fired_ticks, summary.timer.fires);
}

#[test]
fn test_equal_periods_keep_cycling() {
    let coordinator = Coordinator::new(fast_config(15, 15)).unwrap();
    let summary = run_for(&coordinator, Duration::from_millis(300));

    assert!(summary.timer.is_consistent());
    assert!(summary.timer.fires >= 2);
    assert!(summary.timer.rearms >= 1);
}
