//! The mutable scheduler state guarded by a single lock.
//!
//! Every structure in here is reachable only through `Scheduler`'s mutex; no
//! method takes `&self` alone because there is no meaningful state outside
//! that lock. `SchedulerState` owns the one copy of each `JobRecord` and
//! every other index holds `job_id` handles into it.

use chrono::{DateTime, Utc};
use scheduler_core::{
    CoreTable, DependencyIndex, JobId, JobRecord, JobStatus, ReadyEntry, ReadyQueue,
    SchedulingPolicy, StatsCounters,
};
use std::collections::{HashMap, VecDeque};

/// All scheduler-owned state that isn't an atomic. One instance, one lock.
pub struct SchedulerState {
    pub all_jobs: HashMap<JobId, JobRecord>,
    pub ready: ReadyQueue,
    pub running_set: Vec<JobId>,
    pub completed_order: VecDeque<JobId>,
    pub completed_capacity: usize,
    pub dependency_index: DependencyIndex,
    pub core_table: CoreTable,
    pub counters: StatsCounters,
    pub policy: SchedulingPolicy,
    /// Cumulative CPU milliseconds per fair-share group (`array_job_id` or
    /// a standalone job's own id), consulted by `FairShare` dispatch.
    pub group_cpu_ms: HashMap<JobId, u64>,
}

impl SchedulerState {
    pub fn new(num_cores: usize, completed_capacity: usize) -> Self {
        SchedulerState {
            all_jobs: HashMap::new(),
            ready: ReadyQueue::new(),
            running_set: Vec::new(),
            completed_order: VecDeque::new(),
            completed_capacity,
            dependency_index: DependencyIndex::new(),
            core_table: CoreTable::new(num_cores),
            counters: StatsCounters::default(),
            policy: SchedulingPolicy::default(),
            group_cpu_ms: HashMap::new(),
        }
    }

    /// Push `job_id` onto the ready set, reading its scoring fields out of
    /// `all_jobs` (the job must already be present).
    pub fn push_ready(&mut self, job_id: JobId) {
        let job = &self.all_jobs[&job_id];
        self.ready.push(ReadyEntry {
            job_id,
            sequence: job.sequence,
            priority: job.priority,
            job_type: job.job_type,
            estimated_runtime_seconds: scheduler_core::estimate_runtime_seconds(&job.command),
            submit_time: job.submit_time,
            fair_share_group: job.array_job_id.unwrap_or(job_id),
        });
    }

    /// Re-check every registered dependent of `completed`; any whose
    /// dependencies are now all `COMPLETED` is promoted `WAITING_DEPS` ->
    /// `PENDING` and pushed into the ready set.
    pub fn promote_ready_dependents(&mut self, completed: JobId) {
        for candidate in self.dependency_index.candidates_for(completed) {
            let all_satisfied = match self.all_jobs.get(&candidate) {
                Some(job) => job
                    .dependencies
                    .iter()
                    .all(|dep| matches!(self.all_jobs.get(dep), Some(d) if d.status == JobStatus::Completed)),
                None => false,
            };
            if !all_satisfied {
                continue;
            }
            if let Some(job) = self.all_jobs.get_mut(&candidate) {
                if job.status != JobStatus::WaitingDeps {
                    continue;
                }
                job.status = JobStatus::Pending;
                let deps = job.dependencies.clone();
                self.dependency_index.forget(candidate, &deps);
            }
            self.push_ready(candidate);
        }
    }

    /// Record `job_id` as finished with `status`, evicting the oldest id
    /// out of `completed_order` once `completed_capacity` is exceeded.
    /// `all_jobs` is never pruned here: it is the permanent lookup table
    /// dependency checks and `dependents` queries key on, while
    /// `completed_order` only bounds what `get_completed_jobs()` returns.
    pub fn retire(&mut self, job_id: JobId, status: JobStatus, now: DateTime<Utc>) {
        if let Some(job) = self.all_jobs.get_mut(&job_id) {
            job.status = status;
            job.end_time = Some(now);
            if let Some(start) = job.start_time {
                job.actual_runtime_ms = Some(now.signed_duration_since(start).num_milliseconds());
            }
        }
        self.completed_order.push_back(job_id);
        while self.completed_order.len() > self.completed_capacity {
            self.completed_order.pop_front();
        }
    }

    pub fn current_memory_usage_mb(&self) -> u64 {
        self.running_set
            .iter()
            .filter_map(|id| self.all_jobs.get(id))
            .map(|j| j.memory_usage_mb as u64)
            .sum()
    }

    pub fn core_utilization(&self) -> Vec<u8> {
        let mut util = vec![0u8; self.core_table.num_cores()];
        for id in &self.running_set {
            if let Some(job) = self.all_jobs.get(id) {
                for &core in &job.assigned_cores {
                    if core >= 0 {
                        if let Some(slot) = util.get_mut(core as usize) {
                            *slot = job.cpu_utilization;
                        }
                    }
                }
            }
        }
        util
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scheduler_core::{JobType, Limits, Priority};
    use std::collections::HashSet;

    fn new_job(state: &mut SchedulerState, id: JobId, deps: HashSet<JobId>) {
        let mut job = JobRecord::new(
            id,
            id,
            "echo hi".to_string(),
            None,
            JobType::Batch,
            Priority::Medium,
            Limits::default(),
            deps.clone(),
            Utc::now(),
        );
        if !deps.is_empty() {
            job.status = JobStatus::WaitingDeps;
            state.dependency_index.register(id, &deps);
        }
        state.all_jobs.insert(id, job);
        if deps.is_empty() {
            state.push_ready(id);
        }
    }

    #[test]
    fn promote_ready_dependents_requires_all_deps_complete() {
        let mut state = SchedulerState::new(2, 100);
        new_job(&mut state, 1, HashSet::new());
        new_job(&mut state, 2, HashSet::new());
        let mut deps = HashSet::new();
        deps.insert(1);
        deps.insert(2);
        new_job(&mut state, 3, deps);

        state.all_jobs.get_mut(&1).unwrap().status = JobStatus::Completed;
        state.promote_ready_dependents(1);
        assert_eq!(state.all_jobs[&3].status, JobStatus::WaitingDeps);
        assert!(state.ready.iter().all(|e| e.job_id != 3));

        state.all_jobs.get_mut(&2).unwrap().status = JobStatus::Completed;
        state.promote_ready_dependents(2);
        assert_eq!(state.all_jobs[&3].status, JobStatus::Pending);
        assert!(state.ready.iter().any(|e| e.job_id == 3));
    }

    #[test]
    fn retire_evicts_oldest_once_capacity_exceeded() {
        let mut state = SchedulerState::new(1, 2);
        for id in 1..=3 {
            new_job(&mut state, id, HashSet::new());
            state.retire(id, JobStatus::Completed, Utc::now());
        }
        assert_eq!(state.completed_order.len(), 2);
        assert!(!state.completed_order.contains(&1));
        assert!(state.all_jobs.contains_key(&1), "all_jobs must outlive completed_order eviction");
        assert!(state.all_jobs.contains_key(&2));
        assert!(state.all_jobs.contains_key(&3));
    }
}
