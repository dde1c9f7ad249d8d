//! Job identity, runtime state, and the command-text heuristics used to
//! estimate runtime and simulate resource usage before a job ever runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Monotonically increasing job identifier, assigned once at submission.
pub type JobId = u64;

/// Relative scheduling priority. The numeric rank feeds directly into
/// [`crate::queue::priority_score`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum Priority {
    Low = 0,
    Medium = 1,
    High = 2,
    Critical = 3,
}

impl Priority {
    /// The `priority_rank` term of the scoring function.
    pub fn rank(self) -> f64 {
        self as u8 as f64
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

/// The broad category a job belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobType {
    Interactive,
    Batch,
    ArrayJob,
}

impl Default for JobType {
    fn default() -> Self {
        JobType::Batch
    }
}

/// Position of a job in the lifecycle state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    WaitingDeps,
    Running,
    Suspended,
    Completed,
    Failed,
    Killed,
}

impl JobStatus {
    /// Terminal states never transition further.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Killed)
    }
}

/// Advisory resource limits. None of these are enforced by the scheduler;
/// they are recorded for reporting and for a future enforcement layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    pub max_memory_mb: u32,
    pub max_runtime_seconds: u32,
    pub max_cpu_cores: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_memory_mb: 1024,
            max_runtime_seconds: 3600,
            max_cpu_cores: 1,
        }
    }
}

/// Identity plus mutable runtime state for one submitted job.
///
/// A `JobRecord` is owned by exactly one table (see the scheduler's
/// `all_jobs` map); every other structure (ready heap, waiting set, running
/// set, completed FIFO, dependency index) holds `job_id` handles and looks
/// the record up under the scheduler lock rather than aliasing it directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: JobId,
    pub job_name: Option<String>,
    pub command: String,
    pub job_type: JobType,
    pub priority: Priority,
    pub status: JobStatus,

    pub dependencies: HashSet<JobId>,
    pub dependents: HashSet<JobId>,

    pub limits: Limits,

    pub assigned_core_id: i64,
    pub assigned_cores: Vec<i64>,

    pub submit_time: DateTime<Utc>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub actual_runtime_ms: Option<i64>,

    pub cpu_utilization: u8,
    pub memory_usage_mb: u32,
    pub context_switches: u32,

    pub process_id: i64,
    pub exit_code: Option<i32>,

    pub array_job_id: Option<JobId>,
    pub array_task_id: Option<u32>,

    /// Insertion sequence number, used for stable tie-breaking in the ready
    /// set and for `RoundRobin` FIFO ordering. Assigned once at submission.
    pub sequence: u64,
}

impl JobRecord {
    /// Build a freshly submitted job record. `status` is left for the
    /// caller to set (`Pending` or `WaitingDeps`) once dependency
    /// satisfaction has been checked.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        job_id: JobId,
        sequence: u64,
        command: String,
        job_name: Option<String>,
        job_type: JobType,
        priority: Priority,
        limits: Limits,
        dependencies: HashSet<JobId>,
        submit_time: DateTime<Utc>,
    ) -> Self {
        JobRecord {
            job_id,
            job_name,
            command,
            job_type,
            priority,
            status: JobStatus::Pending,
            dependencies,
            dependents: HashSet::new(),
            limits,
            assigned_core_id: -1,
            assigned_cores: Vec::new(),
            submit_time,
            start_time: None,
            end_time: None,
            actual_runtime_ms: None,
            cpu_utilization: 0,
            memory_usage_mb: 0,
            context_switches: 0,
            process_id: -1,
            exit_code: None,
            array_job_id: None,
            array_task_id: None,
            sequence,
        }
    }

    /// Minutes elapsed since submission, as used by the aging term of
    /// [`crate::queue::priority_score`].
    pub fn wait_minutes_since_submit(&self, now: DateTime<Utc>) -> f64 {
        let delta = now.signed_duration_since(self.submit_time);
        (delta.num_milliseconds().max(0) as f64) / 60_000.0
    }
}

/// Estimate a command's runtime in seconds from its literal text.
///
/// `sleep <N>` is read directly; otherwise a 5s baseline is scaled by
/// keyword categories and a small constant per character of command length.
pub fn estimate_runtime_seconds(command: &str) -> u64 {
    let trimmed = command.trim();
    if let Some(rest) = trimmed.strip_prefix("sleep ") {
        if let Some(n) = rest.split_whitespace().next().and_then(|s| s.parse::<u64>().ok()) {
            return n;
        }
    }

    let mut seconds: f64 = 5.0;
    let lower = command.to_ascii_lowercase();
    let has_word = |w: &str| {
        lower
            .split(|c: char| !c.is_ascii_alphanumeric())
            .any(|tok| tok == w)
    };

    if has_word("for") || has_word("while") {
        seconds *= 3.0;
    }
    if ["find", "grep"].iter().any(|w| has_word(w)) {
        seconds *= 2.0;
    }
    if ["make", "compile"].iter().any(|w| has_word(w)) {
        seconds *= 5.0;
    }
    if ["wget", "curl", "download"].iter().any(|w| has_word(w)) {
        seconds *= 4.0;
    }

    seconds += command.len() as f64 / 20.0;
    seconds.round().max(0.0) as u64
}

/// Simulated `(cpu_utilization, memory_usage_mb, context_switches)` derived
/// deterministically from command text, standing in for metrics a real
/// process-accounting subsystem would sample from `/proc` or `rusage`.
pub fn simulate_metrics(command: &str) -> (u8, u32, u32) {
    // FNV-1a over the raw bytes; deterministic and dependency-free.
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in command.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }

    let cpu = (hash % 100) as u8;
    let memory_usage_mb = 32 + ((hash >> 8) % 2048) as u32;
    let context_switches = 10 + ((hash >> 20) % 5000) as u32;
    (cpu, memory_usage_mb, context_switches)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_runtime_reads_sleep_argument() {
        assert_eq!(estimate_runtime_seconds("sleep 42"), 42);
        assert_eq!(estimate_runtime_seconds("sleep 0"), 0);
    }

    #[test]
    fn estimate_runtime_scales_by_keyword_category() {
        let baseline = estimate_runtime_seconds("echo hi");
        let build = estimate_runtime_seconds("make all");
        assert!(build > baseline);
    }

    #[test]
    fn simulate_metrics_is_deterministic() {
        let a = simulate_metrics("echo hello world");
        let b = simulate_metrics("echo hello world");
        assert_eq!(a, b);
        assert!(a.0 < 100);
    }

    #[test]
    fn simulate_metrics_differs_across_distinct_commands() {
        let a = simulate_metrics("echo one");
        let b = simulate_metrics("echo two");
        assert_ne!(a, b);
    }

    #[test]
    fn job_status_terminal_classification() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Killed.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(!JobStatus::WaitingDeps.is_terminal());
    }
}
