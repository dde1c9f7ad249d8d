//! The durable record of a job state transition, and the `EventSink`
//! abstraction that decouples the scheduler from any one logging backend,
//! so tests can substitute an in-memory sink for the CSV file.

use crate::job::{JobId, JobStatus, Priority};
use chrono::{DateTime, Utc};
use std::sync::Mutex;

/// One of the lifecycle transitions a job can go through. `Suspended` and
/// `Resumed` get their own record just like every other transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Submitted,
    Started,
    Completed,
    Failed,
    Killed,
    Suspended,
    Resumed,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Submitted => "SUBMITTED",
            EventKind::Started => "STARTED",
            EventKind::Completed => "COMPLETED",
            EventKind::Failed => "FAILED",
            EventKind::Killed => "KILLED",
            EventKind::Suspended => "SUSPENDED",
            EventKind::Resumed => "RESUMED",
        }
    }
}

/// One row of the audit log.
#[derive(Debug, Clone)]
pub struct JobEvent {
    pub timestamp: DateTime<Utc>,
    pub job_id: JobId,
    pub job_name: Option<String>,
    pub command: String,
    pub priority: Priority,
    pub status: JobStatus,
    pub thread_id: String,
    pub core_id: i64,
    pub duration_ms: i64,
    pub event: EventKind,
}

/// Destination for lifecycle event records. The scheduler never opens a
/// file or a socket itself; it calls `record` on whatever sink it was
/// configured with.
pub trait EventSink: Send + Sync {
    fn record(&self, event: &JobEvent);
}

/// An in-memory sink for tests: records every row into a `Vec` behind a
/// mutex instead of touching the filesystem.
#[derive(Debug, Default)]
pub struct InMemoryEventSink {
    rows: Mutex<Vec<JobEvent>>,
}

impl InMemoryEventSink {
    pub fn new() -> Self {
        InMemoryEventSink::default()
    }

    pub fn rows(&self) -> Vec<JobEvent> {
        self.rows.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn events_for(&self, job_id: JobId) -> Vec<EventKind> {
        self.rows()
            .into_iter()
            .filter(|r| r.job_id == job_id)
            .map(|r| r.event)
            .collect()
    }
}

impl EventSink for InMemoryEventSink {
    fn record(&self, event: &JobEvent) {
        self.rows
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event(job_id: JobId, kind: EventKind) -> JobEvent {
        JobEvent {
            timestamp: Utc::now(),
            job_id,
            job_name: None,
            command: "echo hi".to_string(),
            priority: Priority::Medium,
            status: JobStatus::Pending,
            thread_id: "worker-0".to_string(),
            core_id: -1,
            duration_ms: 0,
            event: kind,
        }
    }

    #[test]
    fn in_memory_sink_preserves_order_per_job() {
        let sink = InMemoryEventSink::new();
        sink.record(&sample_event(1, EventKind::Submitted));
        sink.record(&sample_event(1, EventKind::Started));
        sink.record(&sample_event(1, EventKind::Completed));
        assert_eq!(
            sink.events_for(1),
            vec![EventKind::Submitted, EventKind::Started, EventKind::Completed]
        );
    }

    #[test]
    fn in_memory_sink_separates_jobs() {
        let sink = InMemoryEventSink::new();
        sink.record(&sample_event(1, EventKind::Submitted));
        sink.record(&sample_event(2, EventKind::Submitted));
        assert_eq!(sink.events_for(1).len(), 1);
        assert_eq!(sink.events_for(2).len(), 1);
    }
}
