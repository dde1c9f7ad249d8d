//! The ready set: jobs whose dependencies are satisfied and which are
//! waiting for a worker. Entries are kept in a flat `Vec` — the same
//! choice the worker pool this design is modeled on makes for its own
//! pending-work list — and the active [`SchedulingPolicy`] decides which
//! entry `pop_best` removes next. This trades the O(log n) of a binary
//! heap for a single comparator that can be swapped at runtime without
//! juggling four different heap orderings.

use crate::job::{JobId, JobStatus, JobType, Priority};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The four runtime-selectable dispatch policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulingPolicy {
    PriorityFirst,
    ShortestJobFirst,
    RoundRobin,
    FairShare,
}

impl Default for SchedulingPolicy {
    fn default() -> Self {
        SchedulingPolicy::PriorityFirst
    }
}

/// The static, job-identifying half of a ready-set entry. Recomputing the
/// score needs these plus the caller-supplied `now` and live `status`.
#[derive(Debug, Clone)]
pub struct ReadyEntry {
    pub job_id: JobId,
    pub sequence: u64,
    pub priority: Priority,
    pub job_type: JobType,
    pub estimated_runtime_seconds: u64,
    pub submit_time: DateTime<Utc>,
    /// For `FairShare`: the cumulative-CPU-time group this job belongs to
    /// (its `array_job_id`, or its own `job_id` when not part of an array).
    pub fair_share_group: JobId,
}

/// The priority score, recomputed fresh on every comparison so the aging
/// term always reflects the current wall clock.
pub fn priority_score(entry: &ReadyEntry, status: JobStatus, now: DateTime<Utc>) -> f64 {
    let wait_minutes = {
        let delta = now.signed_duration_since(entry.submit_time);
        (delta.num_milliseconds().max(0) as f64) / 60_000.0
    };

    let mut score = entry.priority.rank();
    score += 0.1 * (1.0 / (1.0 + entry.estimated_runtime_seconds as f64 / 60.0));
    score += 0.01 * wait_minutes;
    if entry.job_type == JobType::Interactive {
        score += 0.2;
    }
    if entry.priority == Priority::Critical {
        score += 2.0;
    }
    if status == JobStatus::WaitingDeps {
        score -= 1.0;
    }
    score
}

/// The ready set itself: jobs whose dependencies are satisfied, not yet
/// dispatched to a worker.
#[derive(Debug, Default)]
pub struct ReadyQueue {
    entries: Vec<ReadyEntry>,
}

impl ReadyQueue {
    pub fn new() -> Self {
        ReadyQueue { entries: Vec::new() }
    }

    pub fn push(&mut self, entry: ReadyEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReadyEntry> {
        self.entries.iter()
    }

    /// Remove and return the job the active policy prefers to dispatch
    /// next, or `None` if the ready set is empty.
    ///
    /// `group_cpu_ms` is only consulted by `FairShare`: cumulative CPU
    /// milliseconds already attributed to each `fair_share_group`.
    pub fn pop_best(
        &mut self,
        policy: SchedulingPolicy,
        now: DateTime<Utc>,
        group_cpu_ms: &HashMap<JobId, u64>,
    ) -> Option<JobId> {
        if self.entries.is_empty() {
            return None;
        }

        let best_idx = match policy {
            SchedulingPolicy::PriorityFirst => self.entries.iter().enumerate().max_by(
                |(_, a), (_, b)| {
                    let sa = priority_score(a, JobStatus::Pending, now);
                    let sb = priority_score(b, JobStatus::Pending, now);
                    sa.partial_cmp(&sb)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then_with(|| b.sequence.cmp(&a.sequence))
                },
            ),
            SchedulingPolicy::ShortestJobFirst => self.entries.iter().enumerate().min_by(
                |(_, a), (_, b)| {
                    a.estimated_runtime_seconds
                        .cmp(&b.estimated_runtime_seconds)
                        .then_with(|| a.sequence.cmp(&b.sequence))
                },
            ),
            SchedulingPolicy::RoundRobin => {
                let top_bucket = self.entries.iter().map(|e| e.priority).max()?;
                self.entries
                    .iter()
                    .enumerate()
                    .filter(|(_, e)| e.priority == top_bucket)
                    .min_by_key(|(_, e)| e.sequence)
            }
            SchedulingPolicy::FairShare => self.entries.iter().enumerate().min_by(
                |(_, a), (_, b)| {
                    let ca = group_cpu_ms.get(&a.fair_share_group).copied().unwrap_or(0);
                    let cb = group_cpu_ms.get(&b.fair_share_group).copied().unwrap_or(0);
                    ca.cmp(&cb).then_with(|| a.sequence.cmp(&b.sequence))
                },
            ),
        }
        .map(|(idx, _)| idx)?;

        Some(self.entries.remove(best_idx).job_id)
    }

    /// Update the stored priority of a still-pending ready-set entry
    /// (`change_priority` is only ever accepted for `PENDING` jobs, which
    /// are exactly the jobs that can still be sitting in this set).
    pub fn update_priority(&mut self, job_id: JobId, priority: Priority) -> bool {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.job_id == job_id) {
            entry.priority = priority;
            true
        } else {
            false
        }
    }

    /// Remove a specific job from the ready set without dispatching it
    /// (used when a `PENDING` job is killed or otherwise invalidated
    /// before a worker picks it up).
    pub fn remove(&mut self, job_id: JobId) -> bool {
        if let Some(idx) = self.entries.iter().position(|e| e.job_id == job_id) {
            self.entries.remove(idx);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobType;

    fn entry(job_id: JobId, seq: u64, priority: Priority, runtime: u64) -> ReadyEntry {
        ReadyEntry {
            job_id,
            sequence: seq,
            priority,
            job_type: JobType::Batch,
            estimated_runtime_seconds: runtime,
            submit_time: Utc::now(),
            fair_share_group: job_id,
        }
    }

    #[test]
    fn priority_first_prefers_critical_over_low() {
        let mut q = ReadyQueue::new();
        q.push(entry(1, 0, Priority::Low, 30));
        q.push(entry(2, 1, Priority::Critical, 30));
        let picked = q
            .pop_best(SchedulingPolicy::PriorityFirst, Utc::now(), &HashMap::new())
            .unwrap();
        assert_eq!(picked, 2);
    }

    #[test]
    fn shortest_job_first_prefers_smaller_estimate() {
        let mut q = ReadyQueue::new();
        q.push(entry(1, 0, Priority::Medium, 300));
        q.push(entry(2, 1, Priority::Medium, 5));
        let picked = q
            .pop_best(SchedulingPolicy::ShortestJobFirst, Utc::now(), &HashMap::new())
            .unwrap();
        assert_eq!(picked, 2);
    }

    #[test]
    fn round_robin_is_fifo_within_top_priority_bucket() {
        let mut q = ReadyQueue::new();
        q.push(entry(1, 0, Priority::High, 10));
        q.push(entry(2, 1, Priority::Low, 10));
        q.push(entry(3, 2, Priority::High, 10));
        let picked = q
            .pop_best(SchedulingPolicy::RoundRobin, Utc::now(), &HashMap::new())
            .unwrap();
        assert_eq!(picked, 1);
    }

    #[test]
    fn fair_share_prefers_least_consumed_group() {
        let mut q = ReadyQueue::new();
        q.push(entry(1, 0, Priority::Medium, 10));
        q.push(entry(2, 1, Priority::Medium, 10));
        let mut group_cpu_ms = HashMap::new();
        group_cpu_ms.insert(1, 10_000);
        group_cpu_ms.insert(2, 0);
        let picked = q
            .pop_best(SchedulingPolicy::FairShare, Utc::now(), &group_cpu_ms)
            .unwrap();
        assert_eq!(picked, 2);
    }

    #[test]
    fn remove_drops_a_pending_entry_without_dispatch() {
        let mut q = ReadyQueue::new();
        q.push(entry(1, 0, Priority::Medium, 10));
        assert!(q.remove(1));
        assert!(q.is_empty());
        assert!(!q.remove(1));
    }
}
