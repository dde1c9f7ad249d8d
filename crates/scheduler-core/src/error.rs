//! Error types for submission paths. Control-API methods that merely fail
//! a precondition (kill of a non-running job, priority change of a
//! non-pending job) return `bool` rather than an error — these types are
//! reserved for submission paths that can be outright rejected.

use thiserror::Error;

/// Failure modes for `submit_script`.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("could not open job script {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("job script has no command line after its headers")]
    MissingCommand,

    #[error("malformed {header} header value {value:?}")]
    MalformedHeader { header: &'static str, value: String },

    #[error("unknown priority {0:?}; expected one of LOW, MEDIUM, HIGH, CRITICAL")]
    UnknownPriority(String),
}

/// Failure modes for structured submission (`submit_with_deps`,
/// `submit_array`) that are rejected outright rather than merely
/// discouraged.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error(
        "dependency set for job would create a cycle through job {through}"
    )]
    DependencyCycle { through: crate::job::JobId },

    #[error("array size must be at least 1")]
    EmptyArray,
}
