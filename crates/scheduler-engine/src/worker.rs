//! Worker loop and Lifecycle Driver.
//!
//! Each worker is one OS thread running `run_worker`. It holds the
//! scheduler lock only while touching shared state; the child process spawn
//! and wait happen with the lock released, exactly like the teacher's
//! connection loop drops its lock before blocking on I/O.

use crate::scheduler::Inner;
use chrono::Utc;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use scheduler_core::{EventKind, JobEvent, JobStatus};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::thread;

pub fn run_worker(inner: Arc<Inner>, worker_id: usize) {
    let thread_id = format!("worker-{worker_id}");

    loop {
        let job_id = {
            let mut state = inner.state.lock().unwrap_or_else(|e| e.into_inner());
            loop {
                if !inner.running.load(std::sync::atomic::Ordering::SeqCst) {
                    return;
                }
                let max_concurrent = inner.max_concurrent_jobs.load(std::sync::atomic::Ordering::SeqCst);
                if !state.ready.is_empty() && state.running_set.len() < max_concurrent {
                    break;
                }
                state = inner
                    .cv
                    .wait(state)
                    .unwrap_or_else(|e| e.into_inner());
            }

            let policy = state.policy;
            let now = Utc::now();
            let group_cpu_ms = state.group_cpu_ms.clone();
            let Some(job_id) = state.ready.pop_best(policy, now, &group_cpu_ms) else {
                continue;
            };
            state.running_set.push(job_id);
            job_id
        };

        run_lifecycle(&inner, job_id, &thread_id);
    }
}

/// Drive one job from dispatch to a terminal state. Runs with the
/// scheduler lock released except for the bracketing state updates.
fn run_lifecycle(inner: &Arc<Inner>, job_id: scheduler_core::JobId, thread_id: &str) {
    let (command, job_name, priority) = {
        let mut state = inner.state.lock().unwrap_or_else(|e| e.into_inner());
        let now = Utc::now();

        let cores_needed = state
            .all_jobs
            .get(&job_id)
            .map(|j| j.limits.max_cpu_cores.max(1) as usize)
            .unwrap_or(1);
        let allocated = state
            .core_table
            .allocate_n(cores_needed, now)
            .or_else(|| state.core_table.allocate(now).map(|c| vec![c]));

        let job = state
            .all_jobs
            .get_mut(&job_id)
            .expect("dispatched job must still be in all_jobs");
        let (cpu, mem, ctx) = scheduler_core::simulate_metrics(&job.command);
        job.status = JobStatus::Running;
        job.start_time = Some(now);
        job.cpu_utilization = cpu;
        job.memory_usage_mb = mem;
        job.context_switches = ctx;
        job.assigned_cores = allocated.clone().unwrap_or_default();
        job.assigned_core_id = job.assigned_cores.first().copied().unwrap_or(-1);

        let command = job.command.clone();
        let job_name = job.job_name.clone();
        let priority = job.priority;

        inner.sink.record(&JobEvent {
            timestamp: now,
            job_id,
            job_name: job_name.clone(),
            command: command.clone(),
            priority,
            status: JobStatus::Running,
            thread_id: thread_id.to_string(),
            core_id: job.assigned_core_id,
            duration_ms: 0,
            event: EventKind::Started,
        });

        (command, job_name, priority)
    };

    let spawn_result = Command::new("/bin/sh")
        .arg("-c")
        .arg(&command)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn();

    let mut child = match spawn_result {
        Ok(child) => child,
        Err(err) => {
            tracing::error!(error = %err, job_id, "failed to spawn job command");
            finalize(inner, job_id, thread_id, &job_name, &command, priority, -1, JobStatus::Failed);
            return;
        }
    };

    let pid = child.id() as i64;
    {
        let mut state = inner.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(job) = state.all_jobs.get_mut(&job_id) {
            job.process_id = pid;
        }
    }

    let wait_result = child.wait();

    let already_killed = {
        let state = inner.state.lock().unwrap_or_else(|e| e.into_inner());
        state
            .all_jobs
            .get(&job_id)
            .map(|j| j.status == JobStatus::Killed)
            .unwrap_or(false)
    };
    if already_killed {
        finalize_killed(inner, job_id, thread_id, &job_name, &command, priority);
        return;
    }

    let (exit_code, status) = match wait_result {
        Ok(exit_status) => match exit_status.code() {
            Some(code) => (code, if code == 0 { JobStatus::Completed } else { JobStatus::Failed }),
            None => (-1, JobStatus::Failed),
        },
        Err(err) => {
            tracing::error!(error = %err, job_id, "failed to wait on job child process");
            (-1, JobStatus::Failed)
        }
    };

    finalize(inner, job_id, thread_id, &job_name, &command, priority, exit_code, status);
}

#[allow(clippy::too_many_arguments)]
fn finalize(
    inner: &Arc<Inner>,
    job_id: scheduler_core::JobId,
    thread_id: &str,
    job_name: &Option<String>,
    command: &str,
    priority: scheduler_core::Priority,
    exit_code: i32,
    status: JobStatus,
) {
    let now = Utc::now();
    let mut state = inner.state.lock().unwrap_or_else(|e| e.into_inner());

    // A concurrent kill() may have already flipped this to Killed and
    // released its core; never overwrite a terminal status observed late.
    let current_status = state.all_jobs.get(&job_id).map(|j| j.status);
    if current_status == Some(JobStatus::Killed) {
        drop(state);
        finalize_killed(inner, job_id, thread_id, job_name, command, priority);
        return;
    }

    let cores = state
        .all_jobs
        .get(&job_id)
        .map(|j| j.assigned_cores.clone())
        .unwrap_or_default();
    let core_id = state
        .all_jobs
        .get(&job_id)
        .map(|j| j.assigned_core_id)
        .unwrap_or(-1);
    state.core_table.release_all(&cores);

    if let Some(job) = state.all_jobs.get_mut(&job_id) {
        job.exit_code = Some(exit_code);
        let group = job.array_job_id.unwrap_or(job_id);
        if let Some(start) = job.start_time {
            let runtime_ms = now.signed_duration_since(start).num_milliseconds().max(0) as u64;
            *state.group_cpu_ms.entry(group).or_insert(0) += runtime_ms;
        }
    }

    let wait_ms = state
        .all_jobs
        .get(&job_id)
        .and_then(|j| Some(j.start_time?.signed_duration_since(j.submit_time).num_milliseconds()))
        .unwrap_or(0);
    let turnaround_ms = state
        .all_jobs
        .get(&job_id)
        .map(|j| now.signed_duration_since(j.submit_time).num_milliseconds())
        .unwrap_or(0);

    match status {
        JobStatus::Completed => state.counters.record_completed(turnaround_ms, wait_ms),
        JobStatus::Failed => state.counters.record_failed(),
        _ => {}
    }

    state.retire(job_id, status, now);
    state.running_set.retain(|id| *id != job_id);
    state.promote_ready_dependents(job_id);

    let duration_ms = state
        .all_jobs
        .get(&job_id)
        .and_then(|j| j.actual_runtime_ms)
        .unwrap_or(0);

    inner.sink.record(&JobEvent {
        timestamp: now,
        job_id,
        job_name: job_name.clone(),
        command: command.to_string(),
        priority,
        status,
        thread_id: thread_id.to_string(),
        core_id,
        duration_ms,
        event: if status == JobStatus::Completed { EventKind::Completed } else { EventKind::Failed },
    });

    inner.cv.notify_all();
}

fn finalize_killed(
    inner: &Arc<Inner>,
    job_id: scheduler_core::JobId,
    thread_id: &str,
    job_name: &Option<String>,
    command: &str,
    priority: scheduler_core::Priority,
) {
    let now = Utc::now();
    let mut state = inner.state.lock().unwrap_or_else(|e| e.into_inner());

    let cores = state
        .all_jobs
        .get(&job_id)
        .map(|j| j.assigned_cores.clone())
        .unwrap_or_default();
    let core_id = state
        .all_jobs
        .get(&job_id)
        .map(|j| j.assigned_core_id)
        .unwrap_or(-1);
    state.core_table.release_all(&cores);

    let duration_ms = state
        .all_jobs
        .get(&job_id)
        .and_then(|j| j.start_time)
        .map(|start| now.signed_duration_since(start).num_milliseconds())
        .unwrap_or(0);

    state.counters.record_killed();
    state.retire(job_id, JobStatus::Killed, now);
    state.running_set.retain(|id| *id != job_id);
    state.promote_ready_dependents(job_id);
    drop(state);

    inner.sink.record(&JobEvent {
        timestamp: now,
        job_id,
        job_name: job_name.clone(),
        command: command.to_string(),
        priority,
        status: JobStatus::Killed,
        thread_id: thread_id.to_string(),
        core_id,
        duration_ms,
        event: EventKind::Killed,
    });
    inner.cv.notify_all();
}

/// Best-effort signal delivery to a job's child process. Returns `false`
/// without error if the pid is no longer valid (process already reaped).
pub fn send_signal(pid: i64, signal: Signal) -> bool {
    if pid <= 0 {
        return false;
    }
    signal::kill(Pid::from_raw(pid as i32), signal).is_ok()
}

pub fn spawn_pool(inner: Arc<Inner>, count: usize) -> Vec<thread::JoinHandle<()>> {
    (0..count)
        .map(|id| {
            let inner = Arc::clone(&inner);
            thread::spawn(move || run_worker(inner, id))
        })
        .collect()
}
