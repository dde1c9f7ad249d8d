//! Engine-level error types. Submission-path errors (`ScriptError`,
//! `ControlError`) live in `scheduler-core` and are re-exported; this module
//! adds the one failure mode specific to standing the engine up.

use crate::csv_log::CsvLogError;
use thiserror::Error;

/// Fatal at startup: the process has no durable audit log to write to.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to initialize job event log: {0}")]
    EventLog(#[from] CsvLogError),
}
