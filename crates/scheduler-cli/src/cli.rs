//! Argument and subcommand definitions. Flags fall back to `SCHED_*`
//! environment variables before the built-in default.

use clap::{Parser, Subcommand, ValueEnum};
use scheduler_core::{Priority, SchedulingPolicy};

fn default_num_cores() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PriorityArg {
    Low,
    Medium,
    High,
    Critical,
}

impl From<PriorityArg> for Priority {
    fn from(value: PriorityArg) -> Self {
        match value {
            PriorityArg::Low => Priority::Low,
            PriorityArg::Medium => Priority::Medium,
            PriorityArg::High => Priority::High,
            PriorityArg::Critical => Priority::Critical,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PolicyArg {
    PriorityFirst,
    ShortestJobFirst,
    RoundRobin,
    FairShare,
}

impl From<PolicyArg> for SchedulingPolicy {
    fn from(value: PolicyArg) -> Self {
        match value {
            PolicyArg::PriorityFirst => SchedulingPolicy::PriorityFirst,
            PolicyArg::ShortestJobFirst => SchedulingPolicy::ShortestJobFirst,
            PolicyArg::RoundRobin => SchedulingPolicy::RoundRobin,
            PolicyArg::FairShare => SchedulingPolicy::FairShare,
        }
    }
}

#[derive(Debug, Clone, Parser)]
#[command(name = "scheduler", version, about = "Interactive job-scheduling shell")]
pub struct Cli {
    /// Number of logical cores / worker threads to run.
    #[arg(long, env = "SCHED_NUM_CORES", default_value_t = default_num_cores())]
    pub num_cores: usize,

    /// Path to the CSV audit log.
    #[arg(long, env = "SCHED_LOG_PATH", default_value = "logs/job_log.csv")]
    pub log_path: String,

    /// Number of completed jobs retained for `completed`/query purposes.
    #[arg(long, env = "SCHED_COMPLETED_CAPACITY", default_value_t = 1000)]
    pub completed_capacity: usize,

    /// Initial scheduling policy.
    #[arg(long, env = "SCHED_POLICY", value_enum, default_value_t = PolicyArg::PriorityFirst)]
    pub policy: PolicyArg,

    /// Emit job records and stats as JSON instead of a plain text table.
    #[arg(long, env = "SCHED_JSON", default_value_t = false)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Submit a single command.
    Submit {
        command: String,
        #[arg(long, value_enum, default_value_t = PriorityArg::Medium)]
        priority: PriorityArg,
    },
    /// Submit a command that depends on other job ids.
    SubmitDeps {
        command: String,
        #[arg(long, value_delimiter = ',')]
        deps: Vec<u64>,
        #[arg(long, value_enum, default_value_t = PriorityArg::Medium)]
        priority: PriorityArg,
    },
    /// Submit a job-script file.
    SubmitScript { path: String },
    /// Submit an array job: `$ARRAY_ID` in `template` is replaced by the task index.
    SubmitArray {
        template: String,
        size: u32,
        #[arg(long, value_enum, default_value_t = PriorityArg::Medium)]
        priority: PriorityArg,
    },
    /// Send SIGTERM and mark a running/suspended job KILLED.
    Kill { job_id: u64 },
    /// Send SIGSTOP and mark a running job SUSPENDED.
    Suspend { job_id: u64 },
    /// Send SIGCONT and mark a suspended job RUNNING.
    Resume { job_id: u64 },
    /// Change the priority of a still-PENDING job.
    Priority {
        job_id: u64,
        #[arg(value_enum)]
        priority: PriorityArg,
    },
    /// List every known job.
    Jobs,
    /// List jobs currently RUNNING.
    Active,
    /// List retained completed jobs (COMPLETED/FAILED/KILLED).
    Completed,
    /// Print the stats snapshot.
    Stats,
    /// Print per-core utilization.
    Cores,
    /// Print the ready-set length.
    QueueLen,
    /// Change the active scheduling policy.
    Policy {
        #[arg(value_enum)]
        policy: PolicyArg,
    },
    /// Read commands from stdin until `exit` or EOF.
    Shell,
}
