//! The Control API: the one entry point front-ends call.
//!
//! `Inner` holds everything workers and the public `Scheduler` handle share;
//! `Scheduler` is the `Arc<Inner>`-wrapping handle callers actually hold, so
//! cloning it is cheap and `stop()` can join the worker threads from any
//! clone.

use crate::state::SchedulerState;
use crate::worker;
use chrono::Utc;
use nix::sys::signal::Signal;
use scheduler_core::{
    would_create_cycle, ControlError, EventKind, EventSink, JobEvent, JobId, JobRecord, JobStatus,
    JobType, Limits, Priority, ScriptError, SchedulingPolicy, StatsSnapshot,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

pub struct Inner {
    pub state: Mutex<SchedulerState>,
    pub cv: Condvar,
    pub running: AtomicBool,
    pub max_concurrent_jobs: AtomicUsize,
    pub cpu_affinity_enabled: AtomicBool,
    pub next_job_id: AtomicU64,
    pub num_cores: usize,
    pub sink: Arc<dyn EventSink>,
    pub start_time: chrono::DateTime<Utc>,
}

/// Handle to a running (or not-yet-started) scheduler. Cheap to clone.
pub struct Scheduler {
    inner: Arc<Inner>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(num_cores: usize, completed_capacity: usize, sink: Arc<dyn EventSink>) -> Self {
        let num_cores = num_cores.max(1);
        let inner = Inner {
            state: Mutex::new(SchedulerState::new(num_cores, completed_capacity)),
            cv: Condvar::new(),
            running: AtomicBool::new(false),
            max_concurrent_jobs: AtomicUsize::new(num_cores * 2),
            cpu_affinity_enabled: AtomicBool::new(false),
            next_job_id: AtomicU64::new(0),
            num_cores,
            sink,
            start_time: Utc::now(),
        };
        Scheduler { inner: Arc::new(inner), workers: Mutex::new(Vec::new()) }
    }

    /// Start the fixed worker pool (N = `num_cores`). Idempotent: calling
    /// `start()` on an already-running scheduler is a no-op.
    pub fn start(&self) {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut workers = self.workers.lock().unwrap_or_else(|e| e.into_inner());
        *workers = worker::spawn_pool(Arc::clone(&self.inner), self.inner.num_cores);
    }

    /// Stop accepting dispatch, wake every worker, join them, then best
    /// effort `SIGTERM` any process still recorded as running.
    pub fn stop(&self) {
        if !self.inner.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.inner.cv.notify_all();

        let handles = {
            let mut workers = self.workers.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *workers)
        };
        for handle in handles {
            let _ = handle.join();
        }

        let state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
        for &job_id in &state.running_set {
            if let Some(job) = state.all_jobs.get(&job_id) {
                if job.process_id > 0 {
                    worker::send_signal(job.process_id, Signal::SIGTERM);
                }
            }
        }
    }

    fn next_id(&self) -> JobId {
        self.inner.next_job_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Shared submission path for every public `submit*` method.
    fn insert_job(
        &self,
        command: String,
        job_name: Option<String>,
        job_type: JobType,
        priority: Priority,
        limits: Limits,
        dependencies: HashSet<JobId>,
        array_job_id: Option<JobId>,
        array_task_id: Option<u32>,
        job_id: JobId,
    ) -> JobRecord {
        let now = Utc::now();
        let mut state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());

        let all_satisfied = dependencies
            .iter()
            .all(|dep| matches!(state.all_jobs.get(dep), Some(d) if d.status == JobStatus::Completed));

        let mut job = JobRecord::new(
            job_id, job_id, command, job_name, job_type, priority, limits,
            dependencies.clone(), now,
        );
        job.array_job_id = array_job_id;
        job.array_task_id = array_task_id;
        if !dependencies.is_empty() && !all_satisfied {
            job.status = JobStatus::WaitingDeps;
            state.dependency_index.register(job_id, &dependencies);
        }
        for &dep in &dependencies {
            if let Some(dep_job) = state.all_jobs.get_mut(&dep) {
                dep_job.dependents.insert(job_id);
            }
        }

        state.counters.record_submitted();
        let snapshot = job.clone();
        let ready_now = job.status == JobStatus::Pending;
        state.all_jobs.insert(job_id, job);
        if ready_now {
            state.push_ready(job_id);
        }
        drop(state);

        self.inner.sink.record(&JobEvent {
            timestamp: now,
            job_id,
            job_name: snapshot.job_name.clone(),
            command: snapshot.command.clone(),
            priority,
            status: snapshot.status,
            thread_id: String::new(),
            core_id: -1,
            duration_ms: 0,
            event: EventKind::Submitted,
        });
        self.inner.cv.notify_all();
        snapshot
    }

    pub fn submit(&self, command: impl Into<String>, priority: Priority) -> JobRecord {
        let job_id = self.next_id();
        self.insert_job(
            command.into(), None, JobType::Batch, priority, Limits::default(),
            HashSet::new(), None, None, job_id,
        )
    }

    pub fn submit_with_deps(
        &self,
        command: impl Into<String>,
        deps: HashSet<JobId>,
        priority: Priority,
    ) -> Result<JobRecord, ControlError> {
        let job_id = self.next_id();
        {
            let state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
            let all_dependencies: std::collections::HashMap<JobId, HashSet<JobId>> = state
                .all_jobs
                .iter()
                .map(|(id, job)| (*id, job.dependencies.clone()))
                .collect();
            if would_create_cycle(job_id, &deps, &all_dependencies) {
                let through = deps
                    .iter()
                    .copied()
                    .find(|&dep| {
                        let mut single = HashSet::new();
                        single.insert(dep);
                        would_create_cycle(job_id, &single, &all_dependencies)
                    })
                    .unwrap_or(job_id);
                return Err(ControlError::DependencyCycle { through });
            }
        }
        Ok(self.insert_job(
            command.into(), None, JobType::Batch, priority, Limits::default(),
            deps, None, None, job_id,
        ))
    }

    pub fn submit_script(&self, path: &std::path::Path) -> Result<JobRecord, ScriptError> {
        let parsed = scheduler_core::submit_script_file(path)?;
        let job_id = self.next_id();
        Ok(self.insert_job(
            parsed.command,
            parsed.job_name,
            JobType::Batch,
            parsed.priority,
            parsed.limits,
            parsed.dependencies,
            None,
            None,
            job_id,
        ))
    }

    /// Expand `template` (containing the literal token `$ARRAY_ID`, replaced
    /// with the 0-based task index) into `size` array-task jobs sharing one
    /// `array_job_id`.
    pub fn submit_array(
        &self,
        template: impl Into<String>,
        size: u32,
        priority: Priority,
    ) -> Result<Vec<JobRecord>, ControlError> {
        if size == 0 {
            return Err(ControlError::EmptyArray);
        }
        let template = template.into();
        let first_id = self.inner.next_job_id.fetch_add(size as u64, Ordering::SeqCst) + 1;
        let array_job_id = first_id;

        let mut records = Vec::with_capacity(size as usize);
        for task in 0..size {
            let job_id = first_id + task as u64;
            let command = template.replace("$ARRAY_ID", &task.to_string());
            records.push(self.insert_job(
                command,
                None,
                JobType::ArrayJob,
                priority,
                Limits::default(),
                HashSet::new(),
                Some(array_job_id),
                Some(task),
                job_id,
            ));
        }
        Ok(records)
    }

    pub fn kill(&self, job_id: JobId) -> bool {
        let mut state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
        let Some(job) = state.all_jobs.get_mut(&job_id) else { return false };
        if !matches!(job.status, JobStatus::Running | JobStatus::Suspended) {
            return false;
        }
        job.status = JobStatus::Killed;
        let pid = job.process_id;
        drop(state);
        if pid > 0 {
            worker::send_signal(pid, Signal::SIGTERM);
        }
        self.inner.cv.notify_all();
        true
    }

    pub fn suspend(&self, job_id: JobId) -> bool {
        let mut state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
        let Some(job) = state.all_jobs.get_mut(&job_id) else { return false };
        if job.status != JobStatus::Running {
            return false;
        }
        job.status = JobStatus::Suspended;
        let pid = job.process_id;
        let event = self.transition_event(&state, job_id, JobStatus::Suspended, EventKind::Suspended);
        drop(state);
        self.inner.sink.record(&event);
        pid > 0 && worker::send_signal(pid, Signal::SIGSTOP)
    }

    pub fn resume(&self, job_id: JobId) -> bool {
        let mut state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
        let Some(job) = state.all_jobs.get_mut(&job_id) else { return false };
        if job.status != JobStatus::Suspended {
            return false;
        }
        job.status = JobStatus::Running;
        let pid = job.process_id;
        let event = self.transition_event(&state, job_id, JobStatus::Running, EventKind::Resumed);
        drop(state);
        self.inner.sink.record(&event);
        pid > 0 && worker::send_signal(pid, Signal::SIGCONT)
    }

    /// Build the audit-log record for a transition already applied to
    /// `job_id` in `state`, measuring duration since the job's start.
    fn transition_event(
        &self,
        state: &SchedulerState,
        job_id: JobId,
        status: JobStatus,
        event: EventKind,
    ) -> JobEvent {
        let now = Utc::now();
        let job = &state.all_jobs[&job_id];
        let duration_ms = job
            .start_time
            .map(|start| now.signed_duration_since(start).num_milliseconds())
            .unwrap_or(0);
        JobEvent {
            timestamp: now,
            job_id,
            job_name: job.job_name.clone(),
            command: job.command.clone(),
            priority: job.priority,
            status,
            thread_id: String::new(),
            core_id: job.assigned_core_id,
            duration_ms,
            event,
        }
    }

    pub fn change_priority(&self, job_id: JobId, priority: Priority) -> bool {
        let mut state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
        let Some(job) = state.all_jobs.get_mut(&job_id) else { return false };
        if job.status != JobStatus::Pending {
            return false;
        }
        job.priority = priority;
        state.ready.update_priority(job_id, priority)
    }

    pub fn get_jobs(&self) -> Vec<JobRecord> {
        let state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
        state.all_jobs.values().cloned().collect()
    }

    pub fn get_active_jobs(&self) -> Vec<JobRecord> {
        let state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
        state
            .running_set
            .iter()
            .filter_map(|id| state.all_jobs.get(id).cloned())
            .collect()
    }

    pub fn get_completed_jobs(&self) -> Vec<JobRecord> {
        let state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
        state
            .completed_order
            .iter()
            .filter_map(|id| state.all_jobs.get(id).cloned())
            .collect()
    }

    pub fn get_system_stats(&self) -> StatsSnapshot {
        let state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
        state
            .counters
            .snapshot(state.current_memory_usage_mb(), self.inner.start_time, Utc::now())
    }

    pub fn get_core_utilization(&self) -> Vec<u8> {
        let state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
        state.core_utilization()
    }

    pub fn get_queue_length(&self) -> usize {
        let state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
        state.ready.len()
    }

    pub fn set_scheduling_policy(&self, policy: SchedulingPolicy) {
        let mut state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
        state.policy = policy;
    }

    pub fn set_max_concurrent_jobs(&self, n: usize) {
        self.inner.max_concurrent_jobs.store(n.max(1), Ordering::SeqCst);
        self.inner.cv.notify_all();
    }

    pub fn enable_cpu_affinity(&self, enabled: bool) {
        self.inner.cpu_affinity_enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn num_cores(&self) -> usize {
        self.inner.num_cores
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scheduler_core::InMemoryEventSink;

    fn new_scheduler() -> (Scheduler, Arc<InMemoryEventSink>) {
        let sink = Arc::new(InMemoryEventSink::new());
        let scheduler = Scheduler::new(2, 100, sink.clone());
        (scheduler, sink)
    }

    #[test]
    fn submit_records_submitted_event() {
        let (scheduler, sink) = new_scheduler();
        let job = scheduler.submit("true", Priority::Medium);
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(sink.events_for(job.job_id), vec![EventKind::Submitted]);
    }

    #[test]
    fn submit_with_deps_rejects_a_forward_reference_cycle() {
        // A depends on the not-yet-submitted job that will get the next id
        // (2); submitting that job depending back on A closes the loop.
        let (scheduler, _sink) = new_scheduler();
        let mut forward = HashSet::new();
        forward.insert(2);
        let a = scheduler.submit_with_deps("true", forward, Priority::Medium).unwrap();
        assert_eq!(a.status, JobStatus::WaitingDeps);

        let mut back = HashSet::new();
        back.insert(a.job_id);
        let err = scheduler.submit_with_deps("true", back, Priority::Medium);
        assert!(matches!(err, Err(ControlError::DependencyCycle { through }) if through == a.job_id));
    }

    #[test]
    fn submit_with_unmet_dep_waits() {
        let (scheduler, _sink) = new_scheduler();
        let a = scheduler.submit("true", Priority::Medium);
        let mut deps = HashSet::new();
        deps.insert(a.job_id);
        let b = scheduler.submit_with_deps("true", deps, Priority::Medium).unwrap();
        assert_eq!(b.status, JobStatus::WaitingDeps);
    }

    #[test]
    fn submit_array_expands_template_with_shared_array_id() {
        let (scheduler, _sink) = new_scheduler();
        let jobs = scheduler.submit_array("echo $ARRAY_ID", 3, Priority::Low).unwrap();
        assert_eq!(jobs.len(), 3);
        assert_eq!(jobs[0].command, "echo 0");
        assert_eq!(jobs[2].command, "echo 2");
        assert!(jobs.iter().all(|j| j.array_job_id == Some(jobs[0].job_id)));
    }

    #[test]
    fn submit_array_of_zero_is_rejected() {
        let (scheduler, _sink) = new_scheduler();
        assert!(matches!(
            scheduler.submit_array("echo $ARRAY_ID", 0, Priority::Low),
            Err(ControlError::EmptyArray)
        ));
    }

    #[test]
    fn kill_of_pending_job_is_rejected() {
        let (scheduler, _sink) = new_scheduler();
        let job = scheduler.submit("sleep 30", Priority::Medium);
        assert!(!scheduler.kill(job.job_id));
    }

    #[test]
    fn change_priority_only_accepted_while_pending() {
        let (scheduler, _sink) = new_scheduler();
        let job = scheduler.submit("true", Priority::Low);
        assert!(scheduler.change_priority(job.job_id, Priority::Critical));
        let jobs = scheduler.get_jobs();
        assert_eq!(jobs[0].priority, Priority::Critical);
    }

    #[test]
    fn unknown_job_id_operations_return_false() {
        let (scheduler, _sink) = new_scheduler();
        assert!(!scheduler.kill(999));
        assert!(!scheduler.suspend(999));
        assert!(!scheduler.resume(999));
        assert!(!scheduler.change_priority(999, Priority::High));
    }
}
