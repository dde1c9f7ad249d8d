//! Dispatch of one parsed [`Command`] against a [`Scheduler`], and the
//! plain-text / JSON rendering of its result. No ANSI styling, no line
//! editing: output is meant to be legible both at an interactive prompt and
//! piped into another tool.

use crate::cli::{Command, PolicyArg, PriorityArg};
use anyhow::{Context, Result};
use scheduler_core::{JobRecord, Priority, StatsSnapshot};
use scheduler_engine::Scheduler;
use std::path::Path;

pub fn run(scheduler: &Scheduler, command: Command, json: bool) -> Result<()> {
    match command {
        Command::Submit { command, priority } => {
            let job = scheduler.submit(command, priority.into());
            print_job(&job, json);
        }
        Command::SubmitDeps { command, deps, priority } => {
            let deps = deps.into_iter().collect();
            let job = scheduler
                .submit_with_deps(command, deps, priority.into())
                .context("submission rejected")?;
            print_job(&job, json);
        }
        Command::SubmitScript { path } => {
            let job = scheduler
                .submit_script(Path::new(&path))
                .with_context(|| format!("failed to submit job script {path}"))?;
            print_job(&job, json);
        }
        Command::SubmitArray { template, size, priority } => {
            let jobs = scheduler
                .submit_array(template, size, priority.into())
                .context("array submission rejected")?;
            for job in &jobs {
                print_job(job, json);
            }
        }
        Command::Kill { job_id } => print_bool("kill", job_id, scheduler.kill(job_id), json),
        Command::Suspend { job_id } => {
            print_bool("suspend", job_id, scheduler.suspend(job_id), json)
        }
        Command::Resume { job_id } => print_bool("resume", job_id, scheduler.resume(job_id), json),
        Command::Priority { job_id, priority } => print_bool(
            "priority",
            job_id,
            scheduler.change_priority(job_id, priority.into()),
            json,
        ),
        Command::Jobs => print_jobs(&scheduler.get_jobs(), json),
        Command::Active => print_jobs(&scheduler.get_active_jobs(), json),
        Command::Completed => print_jobs(&scheduler.get_completed_jobs(), json),
        Command::Stats => print_stats(&scheduler.get_system_stats(), json),
        Command::Cores => print_cores(&scheduler.get_core_utilization(), json),
        Command::QueueLen => {
            let len = scheduler.get_queue_length();
            if json {
                println!("{}", serde_json::json!({ "queue_length": len }));
            } else {
                println!("queue length: {len}");
            }
        }
        Command::Policy { policy } => {
            scheduler.set_scheduling_policy(policy.into());
            println!("policy set to {}", policy_name(policy));
        }
        Command::Shell => unreachable!("Shell is handled by the REPL loop, not dispatch"),
    }
    Ok(())
}

fn policy_name(policy: PolicyArg) -> &'static str {
    match policy {
        PolicyArg::PriorityFirst => "priority-first",
        PolicyArg::ShortestJobFirst => "shortest-job-first",
        PolicyArg::RoundRobin => "round-robin",
        PolicyArg::FairShare => "fair-share",
    }
}

fn priority_name(priority: Priority) -> &'static str {
    match priority {
        Priority::Low => "LOW",
        Priority::Medium => "MEDIUM",
        Priority::High => "HIGH",
        Priority::Critical => "CRITICAL",
    }
}

fn print_job(job: &JobRecord, json: bool) {
    if json {
        println!("{}", serde_json::to_string(job).unwrap_or_default());
    } else {
        println!(
            "job {:>5}  {:<9}  {:<8}  {}",
            job.job_id,
            priority_name(job.priority),
            format!("{:?}", job.status),
            job.command
        );
    }
}

fn print_jobs(jobs: &[JobRecord], json: bool) {
    if json {
        println!("{}", serde_json::to_string(jobs).unwrap_or_default());
        return;
    }
    if jobs.is_empty() {
        println!("(no jobs)");
        return;
    }
    for job in jobs {
        print_job(job, false);
    }
}

fn print_bool(action: &str, job_id: u64, ok: bool, json: bool) {
    if json {
        println!("{}", serde_json::json!({ "action": action, "job_id": job_id, "ok": ok }));
    } else {
        println!("{action} {job_id}: {}", if ok { "ok" } else { "rejected" });
    }
}

fn print_stats(stats: &StatsSnapshot, json: bool) {
    if json {
        println!("{}", serde_json::to_string(stats).unwrap_or_default());
        return;
    }
    println!("submitted:         {}", stats.total_jobs_submitted);
    println!("completed:         {}", stats.total_jobs_completed);
    println!("failed:            {}", stats.total_jobs_failed);
    println!("killed:            {}", stats.total_jobs_killed);
    println!("avg turnaround ms: {:.1}", stats.average_turnaround_time_ms);
    println!("avg wait ms:       {:.1}", stats.average_wait_time_ms);
    println!("throughput/min:    {:.2}", stats.system_throughput);
    println!("memory in use mb:  {}", stats.current_memory_usage_mb);
}

fn print_cores(util: &[u8], json: bool) {
    if json {
        println!("{}", serde_json::to_string(util).unwrap_or_default());
        return;
    }
    for (id, pct) in util.iter().enumerate() {
        println!("core {id}: {pct}%");
    }
}
