#![forbid(unsafe_code)]

use std::io;
use std::process::ExitCode;

use lj_cli::{CliError, Command, Invocation, execute, help_text, parse_args, version_text};
use lj_runtime::{CancellationToken, RunConfig};
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "LINEJOIN_LOG";

fn main() -> ExitCode {
    init_tracing();

    let command = match parse_args(std::env::args().skip(1), RunConfig::from_env()) {
        Ok(command) => command,
        Err(error) => return report_error(&error),
    };

    match command {
        Command::Help => {
            println!("{}", help_text());
            ExitCode::SUCCESS
        }
        Command::Version => {
            println!("{}", version_text());
            ExitCode::SUCCESS
        }
        Command::Join(invocation) => run_join(&invocation),
    }
}

/// Logs go to stderr so they never interleave with joined output.
fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Stdout stays line-buffered: each joined line reaches the pipe in one
/// write, so an interrupted run never leaves half a line behind.
fn run_join(invocation: &Invocation) -> ExitCode {
    let output = io::stdout().lock();
    let diagnostics = io::stderr().lock();

    let report = match execute(invocation, output, diagnostics, &CancellationToken::new()) {
        Ok(report) => report,
        Err(error) => return report_error(&error),
    };

    if report.output_closed {
        tracing::debug!("stdout closed by reader");
    }
    if invocation.stats {
        match serde_json::to_string(&report) {
            Ok(json) => eprintln!("{json}"),
            Err(error) => tracing::warn!(%error, "could not serialize run report"),
        }
    }
    ExitCode::SUCCESS
}

fn report_error(error: &CliError) -> ExitCode {
    eprintln!("{error}");
    if error.is_usage() {
        eprintln!("Try 'linejoin --help' for more information.");
    }
    ExitCode::from(error.exit_code())
}
