//! Derived counters and averages over the completed set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw monotonic counters, updated at each lifecycle transition. Averages
/// and throughput are derived from these plus the completed-job FIFO at
/// snapshot time, not stored redundantly.
#[derive(Debug, Default, Clone, Copy)]
pub struct StatsCounters {
    pub total_jobs_submitted: u64,
    pub total_jobs_completed: u64,
    pub total_jobs_failed: u64,
    pub total_jobs_killed: u64,
    pub sum_turnaround_ms: i64,
    pub sum_wait_ms: i64,
    pub completed_with_timing: u64,
}

/// A point-in-time snapshot returned by `get_system_stats()`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub total_jobs_submitted: u64,
    pub total_jobs_completed: u64,
    pub total_jobs_failed: u64,
    pub total_jobs_killed: u64,
    pub average_turnaround_time_ms: f64,
    pub average_wait_time_ms: f64,
    pub system_throughput: f64,
    pub current_memory_usage_mb: u64,
    pub start_time: DateTime<Utc>,
}

impl StatsCounters {
    pub fn record_submitted(&mut self) {
        self.total_jobs_submitted += 1;
    }

    pub fn record_completed(&mut self, turnaround_ms: i64, wait_ms: i64) {
        self.total_jobs_completed += 1;
        self.sum_turnaround_ms += turnaround_ms;
        self.sum_wait_ms += wait_ms;
        self.completed_with_timing += 1;
    }

    pub fn record_failed(&mut self) {
        self.total_jobs_failed += 1;
    }

    pub fn record_killed(&mut self) {
        self.total_jobs_killed += 1;
    }

    /// Build the derived snapshot. `current_memory_usage_mb` is summed by
    /// the caller over the live running set (not tracked here, since this
    /// type has no visibility into which jobs are currently running).
    pub fn snapshot(
        &self,
        current_memory_usage_mb: u64,
        start_time: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> StatsSnapshot {
        let (average_turnaround_time_ms, average_wait_time_ms) = if self.completed_with_timing > 0
        {
            (
                self.sum_turnaround_ms as f64 / self.completed_with_timing as f64,
                self.sum_wait_ms as f64 / self.completed_with_timing as f64,
            )
        } else {
            (0.0, 0.0)
        };

        let elapsed_minutes = now
            .signed_duration_since(start_time)
            .num_milliseconds()
            .max(0) as f64
            / 60_000.0;
        let system_throughput = if elapsed_minutes >= 1.0 {
            self.total_jobs_completed as f64 / elapsed_minutes
        } else {
            0.0
        };

        StatsSnapshot {
            total_jobs_submitted: self.total_jobs_submitted,
            total_jobs_completed: self.total_jobs_completed,
            total_jobs_failed: self.total_jobs_failed,
            total_jobs_killed: self.total_jobs_killed,
            average_turnaround_time_ms,
            average_wait_time_ms,
            system_throughput,
            current_memory_usage_mb,
            start_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn averages_are_zero_with_no_completions() {
        let counters = StatsCounters::default();
        let now = Utc::now();
        let snap = counters.snapshot(0, now, now);
        assert_eq!(snap.average_turnaround_time_ms, 0.0);
        assert_eq!(snap.average_wait_time_ms, 0.0);
    }

    #[test]
    fn averages_over_multiple_completions() {
        let mut counters = StatsCounters::default();
        counters.record_submitted();
        counters.record_submitted();
        counters.record_completed(1000, 100);
        counters.record_completed(2000, 300);
        let now = Utc::now();
        let snap = counters.snapshot(0, now, now);
        assert_eq!(snap.average_turnaround_time_ms, 1500.0);
        assert_eq!(snap.average_wait_time_ms, 200.0);
        assert_eq!(snap.total_jobs_completed, 2);
    }

    #[test]
    fn throughput_is_zero_under_one_minute_elapsed() {
        let mut counters = StatsCounters::default();
        counters.record_completed(1000, 100);
        let start = Utc::now();
        let now = start + Duration::seconds(30);
        let snap = counters.snapshot(0, start, now);
        assert_eq!(snap.system_throughput, 0.0);
    }

    #[test]
    fn throughput_after_one_minute() {
        let mut counters = StatsCounters::default();
        counters.record_completed(1000, 100);
        counters.record_completed(1000, 100);
        let start = Utc::now();
        let now = start + Duration::minutes(2);
        let snap = counters.snapshot(0, start, now);
        assert_eq!(snap.system_throughput, 1.0);
    }

    #[test]
    fn submitted_ge_completed_plus_failed_plus_killed_holds() {
        let mut counters = StatsCounters::default();
        counters.record_submitted();
        counters.record_submitted();
        counters.record_submitted();
        counters.record_completed(10, 1);
        counters.record_failed();
        let total_terminal =
            counters.total_jobs_completed + counters.total_jobs_failed + counters.total_jobs_killed;
        assert!(total_terminal <= counters.total_jobs_submitted);
    }
}
