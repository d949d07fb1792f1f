//! Tick metrics for the executor loop.
//!
//! Tracks how late each wake-up was relative to its absolute deadline and
//! how many period boundaries were coalesced away.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Wake-up lateness statistics.
#[derive(Debug, Clone)]
pub struct TickMetrics {
    /// Total ticks recorded.
    total_ticks: u64,
    /// Ticks that fired the timer.
    fired_ticks: u64,
    /// Period boundaries skipped because the thread woke late.
    coalesced: u64,
    /// Minimum observed lateness in nanoseconds.
    min_ns: u64,
    /// Maximum observed lateness in nanoseconds.
    max_ns: u64,
    /// Sum of all lateness samples for mean calculation.
    sum_ns: u64,
}

impl Default for TickMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl TickMetrics {
    /// Create an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self {
            total_ticks: 0,
            fired_ticks: 0,
            coalesced: 0,
            min_ns: u64::MAX,
            max_ns: 0,
            sum_ns: 0,
        }
    }

    /// Record one tick.
    pub fn record(&mut self, lateness: Duration, fired: bool, coalesced: u64) {
        let ns = u64::try_from(lateness.as_nanos()).unwrap_or(u64::MAX);

        self.total_ticks += 1;
        if fired {
            self.fired_ticks += 1;
        }
        self.coalesced += coalesced;
        self.min_ns = self.min_ns.min(ns);
        self.max_ns = self.max_ns.max(ns);
        self.sum_ns = self.sum_ns.saturating_add(ns);
    }

    /// Total ticks recorded.
    #[must_use]
    pub fn total_ticks(&self) -> u64 {
        self.total_ticks
    }

    /// Ticks that fired the timer.
    #[must_use]
    pub fn fired_ticks(&self) -> u64 {
        self.fired_ticks
    }

    /// Skipped period boundaries.
    #[must_use]
    pub fn coalesced(&self) -> u64 {
        self.coalesced
    }

    /// Minimum observed lateness.
    #[must_use]
    pub fn min(&self) -> Option<Duration> {
        (self.total_ticks > 0).then(|| Duration::from_nanos(self.min_ns))
    }

    /// Maximum observed lateness.
    #[must_use]
    pub fn max(&self) -> Option<Duration> {
        (self.total_ticks > 0).then(|| Duration::from_nanos(self.max_ns))
    }

    /// Mean lateness.
    #[must_use]
    pub fn mean(&self) -> Option<Duration> {
        (self.total_ticks > 0).then(|| Duration::from_nanos(self.sum_ns / self.total_ticks))
    }

    /// Serializable summary in microseconds.
    #[must_use]
    pub fn summary(&self) -> TickSummary {
        let us = |d: Option<Duration>| d.map(|d| u64::try_from(d.as_micros()).unwrap_or(u64::MAX));
        TickSummary {
            total_ticks: self.total_ticks,
            fired_ticks: self.fired_ticks,
            coalesced: self.coalesced,
            min_lateness_us: us(self.min()),
            mean_lateness_us: us(self.mean()),
            max_lateness_us: us(self.max()),
        }
    }
}

/// Point-in-time copy of [`TickMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TickSummary {
    /// Total ticks recorded.
    pub total_ticks: u64,
    /// Ticks that fired the timer.
    pub fired_ticks: u64,
    /// Skipped period boundaries.
    pub coalesced: u64,
    /// Minimum wake-up lateness.
    pub min_lateness_us: Option<u64>,
    /// Mean wake-up lateness.
    pub mean_lateness_us: Option<u64>,
    /// Maximum wake-up lateness.
    pub max_lateness_us: Option<u64>,
}
