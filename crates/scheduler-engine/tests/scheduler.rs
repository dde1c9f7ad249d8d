//! Full lifecycle integration tests against real short-lived child
//! processes.

use scheduler_core::{InMemoryEventSink, JobStatus, Priority};
use scheduler_engine::Scheduler;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn wait_until<F: Fn() -> bool>(condition: F, timeout: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    condition()
}

fn new_scheduler(cores: usize) -> (Scheduler, Arc<InMemoryEventSink>) {
    let sink = Arc::new(InMemoryEventSink::new());
    let scheduler = Scheduler::new(cores, 100, sink.clone());
    scheduler.start();
    (scheduler, sink)
}

#[test]
fn simple_job_completes_successfully() {
    let (scheduler, _sink) = new_scheduler(2);
    let job = scheduler.submit("true", Priority::Medium);

    let done = wait_until(
        || {
            scheduler
                .get_completed_jobs()
                .iter()
                .any(|j| j.job_id == job.job_id)
        },
        Duration::from_secs(5),
    );
    assert!(done, "job did not complete in time");

    let completed = scheduler.get_completed_jobs();
    let record = completed.iter().find(|j| j.job_id == job.job_id).unwrap();
    assert_eq!(record.status, JobStatus::Completed);
    assert_eq!(record.exit_code, Some(0));

    scheduler.stop();
}

#[test]
fn failing_command_is_marked_failed_with_its_exit_code() {
    let (scheduler, _sink) = new_scheduler(2);
    let job = scheduler.submit("sh -c 'exit 7'", Priority::Medium);

    wait_until(
        || {
            scheduler
                .get_completed_jobs()
                .iter()
                .any(|j| j.job_id == job.job_id)
        },
        Duration::from_secs(5),
    );

    let completed = scheduler.get_completed_jobs();
    let record = completed.iter().find(|j| j.job_id == job.job_id).unwrap();
    assert_eq!(record.status, JobStatus::Failed);
    assert_eq!(record.exit_code, Some(7));

    scheduler.stop();
}

#[test]
fn dependent_job_waits_until_its_dependency_completes() {
    let (scheduler, _sink) = new_scheduler(1);
    let first = scheduler.submit("sleep 1", Priority::Medium);
    let mut deps = std::collections::HashSet::new();
    deps.insert(first.job_id);
    let second = scheduler
        .submit_with_deps("true", deps, Priority::Medium)
        .unwrap();
    assert_eq!(second.status, JobStatus::WaitingDeps);

    let both_done = wait_until(
        || {
            let completed = scheduler.get_completed_jobs();
            completed.iter().any(|j| j.job_id == first.job_id)
                && completed.iter().any(|j| j.job_id == second.job_id)
        },
        Duration::from_secs(10),
    );
    assert!(both_done);

    let completed = scheduler.get_completed_jobs();
    let first_record = completed.iter().find(|j| j.job_id == first.job_id).unwrap();
    let second_record = completed.iter().find(|j| j.job_id == second.job_id).unwrap();
    assert!(second_record.start_time.unwrap() >= first_record.end_time.unwrap());

    scheduler.stop();
}

#[test]
fn array_submission_expands_into_independent_tasks() {
    let (scheduler, _sink) = new_scheduler(2);
    let jobs = scheduler
        .submit_array("echo $ARRAY_ID", 4, Priority::Medium)
        .unwrap();
    assert_eq!(jobs.len(), 4);
    assert_eq!(jobs[0].command, "echo 0");
    assert_eq!(jobs[1].command, "echo 1");
    assert_eq!(jobs[2].command, "echo 2");
    assert_eq!(jobs[3].command, "echo 3");

    let done = wait_until(
        || scheduler.get_completed_jobs().len() >= 4,
        Duration::from_secs(5),
    );
    assert!(done);

    let completed = scheduler.get_completed_jobs();
    for (task, job) in jobs.iter().enumerate() {
        let record = completed.iter().find(|j| j.job_id == job.job_id).unwrap();
        assert_eq!(record.command, format!("echo {task}"));
        assert_eq!(record.status, JobStatus::Completed);
    }

    scheduler.stop();
}

#[test]
fn killed_job_is_not_overwritten_by_a_late_completion() {
    let (scheduler, _sink) = new_scheduler(1);
    let job = scheduler.submit("sleep 5", Priority::Medium);

    let started = wait_until(
        || {
            scheduler
                .get_active_jobs()
                .iter()
                .any(|j| j.job_id == job.job_id)
        },
        Duration::from_secs(5),
    );
    assert!(started, "job never started running");

    assert!(scheduler.kill(job.job_id));

    let retired = wait_until(
        || {
            scheduler
                .get_completed_jobs()
                .iter()
                .any(|j| j.job_id == job.job_id)
        },
        Duration::from_secs(5),
    );
    assert!(retired);

    let completed = scheduler.get_completed_jobs();
    let record = completed.iter().find(|j| j.job_id == job.job_id).unwrap();
    assert_eq!(record.status, JobStatus::Killed);

    scheduler.stop();
}

#[test]
fn stop_joins_workers_and_is_idempotent() {
    let (scheduler, _sink) = new_scheduler(2);
    scheduler.submit("true", Priority::Medium);
    scheduler.stop();
    scheduler.stop();
}
