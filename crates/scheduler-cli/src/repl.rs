//! Interactive shell mode (`scheduler shell` / the default when no
//! subcommand is given): read one line at a time from stdin, tokenize it
//! with `shlex` the same way a POSIX shell would, and dispatch it through
//! the same `Command` enum the one-shot subcommands use.
//!
//! Deliberately plain: no persistent history file, no line editing beyond
//! what the terminal already buffers, no ANSI color.

use crate::cli::Command;
use crate::commands;
use anyhow::Result;
use clap::Parser;
use scheduler_engine::Scheduler;
use std::io::{self, BufRead, Write};

#[derive(Parser)]
#[command(name = "scheduler", no_binary_name = true)]
struct ReplLine {
    #[command(subcommand)]
    command: Command,
}

const PROMPT: &str = "scheduler> ";
const HELP: &str = "\
commands: submit, submit-deps, submit-script, submit-array, kill, suspend,
resume, priority, jobs, active, completed, stats, cores, queue-len, policy,
help, exit";

pub fn run(scheduler: &Scheduler, json: bool) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("{PROMPT}");
        stdout.flush()?;

        let mut line = String::new();
        let bytes_read = stdin.lock().read_line(&mut line)?;
        if bytes_read == 0 {
            println!();
            return Ok(());
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed == "exit" || trimmed == "quit" {
            return Ok(());
        }
        if trimmed == "help" {
            println!("{HELP}");
            continue;
        }

        let tokens = match shlex::split(trimmed) {
            Some(tokens) => tokens,
            None => {
                eprintln!("error: unterminated quote");
                continue;
            }
        };

        match ReplLine::try_parse_from(tokens) {
            Ok(parsed) => {
                if matches!(parsed.command, Command::Shell) {
                    eprintln!("error: already in shell mode");
                    continue;
                }
                if let Err(err) = commands::run(scheduler, parsed.command, json) {
                    eprintln!("error: {err:#}");
                }
            }
            Err(err) => {
                eprintln!("{err}");
            }
        }
    }
}
