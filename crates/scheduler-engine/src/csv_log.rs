//! File-backed `EventSink`: one CSV row per lifecycle transition, header
//! written once per session, flushed after every record so a crash loses
//! at most the in-flight row.

use scheduler_core::{EventSink, JobEvent};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

const HEADER: &str = "Timestamp,JobID,JobName,Command,Priority,Status,ThreadID,CoreID,Duration(ms),Event";

#[derive(Debug, Error)]
pub enum CsvLogError {
    #[error("could not create log directory for {path}: {source}")]
    CreateDir { path: String, source: io::Error },

    #[error("could not open job log at {path}: {source}")]
    Open { path: String, source: io::Error },
}

/// Quote a field per RFC 4180: wrap in double quotes, doubling any embedded
/// quote. Applied to every column since commands and job names may contain
/// commas.
fn quote(field: &str) -> String {
    let mut out = String::with_capacity(field.len() + 2);
    out.push('"');
    for ch in field.chars() {
        if ch == '"' {
            out.push('"');
        }
        out.push(ch);
    }
    out.push('"');
    out
}

pub struct CsvEventSink {
    file: Mutex<File>,
}

impl CsvEventSink {
    /// Open (or create) the log file at `path`, writing the header iff the
    /// file is newly created or was already empty. A failure here is
    /// treated as fatal by the caller.
    pub fn open(path: &Path) -> Result<Self, CsvLogError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| CsvLogError::CreateDir {
                    path: parent.display().to_string(),
                    source,
                })?;
            }
        }

        let needs_header = path
            .metadata()
            .map(|meta| meta.len() == 0)
            .unwrap_or(true);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| CsvLogError::Open {
                path: path.display().to_string(),
                source,
            })?;

        if needs_header {
            writeln!(file, "{HEADER}").map_err(|source| CsvLogError::Open {
                path: path.display().to_string(),
                source,
            })?;
            file.flush().map_err(|source| CsvLogError::Open {
                path: path.display().to_string(),
                source,
            })?;
        }

        Ok(CsvEventSink { file: Mutex::new(file) })
    }

    fn path_hint() -> PathBuf {
        PathBuf::from("logs/job_log.csv")
    }

    /// Convenience constructor using the default log path.
    pub fn open_default() -> Result<Self, CsvLogError> {
        Self::open(&Self::path_hint())
    }
}

impl EventSink for CsvEventSink {
    fn record(&self, event: &JobEvent) {
        let line = format!(
            "{},{},{},{},{:?},{:?},{},{},{},{}\n",
            event.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            event.job_id,
            quote(event.job_name.as_deref().unwrap_or("")),
            quote(&event.command),
            event.priority,
            event.status,
            quote(&event.thread_id),
            event.core_id,
            event.duration_ms,
            event.event.as_str(),
        );

        let mut guard = match self.file.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(err) = guard.write_all(line.as_bytes()).and_then(|_| guard.flush()) {
            tracing::warn!(error = %err, job_id = event.job_id, "failed to write job log record");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use scheduler_core::{EventKind, JobStatus, Priority};
    use tempfile::tempdir;

    fn sample_event() -> JobEvent {
        JobEvent {
            timestamp: Utc::now(),
            job_id: 1,
            job_name: Some("name, with comma".to_string()),
            command: "echo \"hi\"".to_string(),
            priority: Priority::Medium,
            status: JobStatus::Completed,
            thread_id: "worker-0".to_string(),
            core_id: 0,
            duration_ms: 42,
            event: EventKind::Completed,
        }
    }

    #[test]
    fn writes_header_once_and_appends_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("job_log.csv");

        let sink = CsvEventSink::open(&path).unwrap();
        sink.record(&sample_event());
        drop(sink);

        let sink = CsvEventSink::open(&path).unwrap();
        sink.record(&sample_event());
        drop(sink);

        let contents = std::fs::read_to_string(&path).unwrap();
        let header_count = contents.lines().filter(|l| l.starts_with("Timestamp,")).count();
        assert_eq!(header_count, 1);
        assert_eq!(contents.lines().count(), 3);
    }

    #[test]
    fn quote_doubles_embedded_quotes() {
        assert_eq!(quote("echo \"hi\""), "\"echo \"\"hi\"\"\"");
    }
}
