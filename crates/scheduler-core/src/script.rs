//! Parser for the job-script header grammar. Deliberately small: this
//! module does not attempt general shell parsing, it reads a fixed set of
//! `KEY: value` headers followed by one literal command line.

use crate::error::ScriptError;
use crate::job::{Limits, Priority};
use std::collections::HashSet;
use std::path::Path;

/// The result of parsing a job-script file, ready to be handed to
/// `submit` / `submit_with_deps`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedScript {
    pub job_name: Option<String>,
    pub priority: Priority,
    pub limits: Limits,
    pub dependencies: HashSet<u64>,
    pub command: String,
}

fn parse_priority(value: &str) -> Result<Priority, ScriptError> {
    match value {
        "LOW" => Ok(Priority::Low),
        "MEDIUM" => Ok(Priority::Medium),
        "HIGH" => Ok(Priority::High),
        "CRITICAL" => Ok(Priority::Critical),
        other => Err(ScriptError::UnknownPriority(other.to_string())),
    }
}

fn parse_u32_header(header: &'static str, value: &str) -> Result<u32, ScriptError> {
    value
        .parse::<u32>()
        .map_err(|_| ScriptError::MalformedHeader { header, value: value.to_string() })
}

fn parse_dependencies(value: &str) -> Result<HashSet<u64>, ScriptError> {
    if value.trim().is_empty() {
        return Ok(HashSet::new());
    }
    value
        .split(',')
        .map(|part| {
            part.trim().parse::<u64>().map_err(|_| ScriptError::MalformedHeader {
                header: "DEPENDENCIES",
                value: value.to_string(),
            })
        })
        .collect()
}

/// Parse job-script text already read into memory.
pub fn parse_job_script(text: &str) -> Result<ParsedScript, ScriptError> {
    let mut job_name = None;
    let mut priority = Priority::Medium;
    let mut limits = Limits::default();
    let mut dependencies = HashSet::new();
    let mut command = None;

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if let Some(header) = trimmed.strip_prefix('#') {
            let header = header.trim();
            let Some((key, value)) = header.split_once(':') else {
                // A comment line with no colon is just a comment, not a header.
                continue;
            };
            let key = key.trim();
            let value = value.trim();

            match key {
                "JOB_NAME" => job_name = Some(value.to_string()),
                "PRIORITY" => priority = parse_priority(value)?,
                "MEMORY_LIMIT" => limits.max_memory_mb = parse_u32_header("MEMORY_LIMIT", value)?,
                "RUNTIME_LIMIT" => {
                    limits.max_runtime_seconds = parse_u32_header("RUNTIME_LIMIT", value)?
                }
                "CORES" => limits.max_cpu_cores = parse_u32_header("CORES", value)?,
                "DEPENDENCIES" => dependencies = parse_dependencies(value)?,
                _ => {
                    // Unknown header keys are ignored rather than rejected,
                    // so newer scripts remain readable by older parsers.
                }
            }
            continue;
        }

        // First non-header, non-blank line is the command; the rest of
        // the file (if any) is not part of this grammar.
        command = Some(trimmed.to_string());
        break;
    }

    let command = command.ok_or(ScriptError::MissingCommand)?;

    Ok(ParsedScript {
        job_name,
        priority,
        limits,
        dependencies,
        command,
    })
}

/// Read and parse a job-script file from disk.
pub fn submit_script_file(path: &Path) -> Result<ParsedScript, ScriptError> {
    let text = std::fs::read_to_string(path).map_err(|source| ScriptError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_job_script(&text)
}
