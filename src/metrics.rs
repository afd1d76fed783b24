//! Optional engine instrumentation.
//!
//! A [`ViewMetrics`] is injected through the view's config; when absent,
//! nothing is counted. Counters are plain `Cell`s because everything runs
//! on one logical thread.

use serde::Serialize;
use std::cell::Cell;

#[derive(Debug, Default)]
pub struct ViewMetrics {
    diff_runs: Cell<u64>,
    ranges_applied: Cell<u64>,
    suspensions: Cell<u64>,
    queued_requests: Cell<u64>,
    dropped_continuations: Cell<u64>,
}

impl ViewMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_diff_run(&self) {
        self.diff_runs.set(self.diff_runs.get() + 1);
    }

    pub(crate) fn record_range_applied(&self) {
        self.ranges_applied.set(self.ranges_applied.get() + 1);
    }

    pub(crate) fn record_suspension(&self) {
        self.suspensions.set(self.suspensions.get() + 1);
    }

    pub(crate) fn record_queued_request(&self) {
        self.queued_requests.set(self.queued_requests.get() + 1);
    }

    pub(crate) fn record_dropped_continuation(&self) {
        self.dropped_continuations.set(self.dropped_continuations.get() + 1);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            diff_runs: self.diff_runs.get(),
            ranges_applied: self.ranges_applied.get(),
            suspensions: self.suspensions.get(),
            queued_requests: self.queued_requests.get(),
            dropped_continuations: self.dropped_continuations.get(),
        }
    }
}

#[derive(Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub diff_runs: u64,
    pub ranges_applied: u64,
    pub suspensions: u64,
    pub queued_requests: u64,
    pub dropped_continuations: u64,
}
