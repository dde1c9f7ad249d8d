//! The scheduler engine: worker pool, lifecycle driver, CSV event log, and
//! the `Scheduler` Control API built on top of `scheduler-core`'s pure
//! domain model.

pub mod api;
pub mod csv_log;
pub mod error;
pub mod scheduler;
pub mod state;
pub mod worker;

pub use api::EngineConfig;
pub use csv_log::{CsvEventSink, CsvLogError};
pub use error::EngineError;
pub use scheduler::Scheduler;

pub use scheduler_core::{
    estimate_runtime_seconds, simulate_metrics, would_create_cycle, ControlError, CoreTable,
    DependencyIndex, EventKind, EventSink, InMemoryEventSink, JobEvent, JobId, JobRecord,
    JobStatus, JobType, Limits, ParsedScript, Priority, ReadyEntry, ReadyQueue, ScriptError,
    SchedulingPolicy, StatsCounters, StatsSnapshot,
};
