mod cli;
mod commands;
mod repl;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Command};
use scheduler_engine::{CsvEventSink, EventSink, Scheduler};
use std::path::Path;
use std::sync::Arc;

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let log_sink = CsvEventSink::open(Path::new(&cli.log_path))
        .with_context(|| format!("opening job log at {}", cli.log_path))?;
    let sink: Arc<dyn EventSink> = Arc::new(log_sink);

    let scheduler = Scheduler::new(cli.num_cores, cli.completed_capacity, sink);
    scheduler.set_scheduling_policy(cli.policy.into());
    scheduler.start();
    tracing::info!(num_cores = cli.num_cores, log_path = %cli.log_path, "scheduler started");

    let result = match cli.command {
        Some(Command::Shell) | None => repl::run(&scheduler, cli.json),
        Some(command) => commands::run(&scheduler, command, cli.json),
    };

    scheduler.stop();
    result
}
