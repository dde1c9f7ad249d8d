#![deny(unreachable_pub)]

//! Pure domain model and algorithms for the job scheduler: job records,
//! the ready-set scoring and selection policies, the core-allocation
//! table, the dependency index, the stats aggregator, the job-script
//! parser, and the event/error types the engine crate builds on.
//!
//! Nothing in this crate spawns a thread or a process; that belongs to
//! `scheduler-engine`, which wraps these types in its `Mutex`/`Condvar`
//! machinery.

pub mod core_table;
pub mod dependency;
pub mod error;
pub mod event;
pub mod job;
pub mod queue;
pub mod script;
pub mod stats;

pub use core_table::CoreTable;
pub use dependency::{would_create_cycle, DependencyIndex};
pub use error::{ControlError, ScriptError};
pub use event::{EventKind, EventSink, InMemoryEventSink, JobEvent};
pub use job::{estimate_runtime_seconds, simulate_metrics, JobId, JobRecord, JobStatus, JobType, Limits, Priority};
pub use queue::{priority_score, ReadyEntry, ReadyQueue, SchedulingPolicy};
pub use script::{parse_job_script, submit_script_file, ParsedScript};
pub use stats::{StatsCounters, StatsSnapshot};
