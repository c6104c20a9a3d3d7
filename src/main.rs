// SPDX-License-Identifier: MIT
//
// termio — command-line front-end for the termio driver.
//
// Wires together:
//
//   clap        → subcommand and global flags
//   tracing     → TERMIO_LOG filter, stderr or a non-blocking log file
//   termio      → the process-wide driver, configured from the
//                 environment and then from flags
//
// Logs go to a file when --log-file is given so they never interleave with
// what `keys` or `watch` draw on the terminal. The panic hook puts the
// terminal back into its original modes before the panic message prints.

mod cli;
mod commands;

use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use miette::{IntoDiagnostic, Result};
use termio::{DriverConfig, SystemDriver};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::cli::{Args, Command};

/// Environment variable holding the log filter directive.
const LOG_ENV: &str = "TERMIO_LOG";

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    let _log_guard = init_logging(args.log_file.as_deref())?;

    let mut config = DriverConfig::from_env();
    if let Some(ms) = args.resize_interval_ms.filter(|&ms| ms > 0) {
        config.resize_interval = Duration::from_millis(ms);
    }
    if let Some(tty) = args.tty {
        config.terminal_device = tty;
    }
    tracing::debug!(?config, "starting");

    let driver = SystemDriver::install(&config);
    SystemDriver::install_panic_hook();

    match args.command {
        Command::Info => commands::info(driver)?,
        Command::Size => {
            if !commands::size(driver)? {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Watch { seconds } => commands::watch(driver, seconds.map(Duration::from_secs))?,
        Command::Keys => commands::keys(driver)?,
        Command::Cat => {
            commands::cat(driver)?;
        }
        Command::Signal { signal } => commands::signal(driver, signal)?,
    }

    Ok(ExitCode::SUCCESS)
}

/// Install the global subscriber. The returned guard flushes the log file
/// when dropped and must live until exit.
fn init_logging(log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));

    let Some(path) = log_file else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
        return Ok(None);
    };

    let file_name = path
        .file_name()
        .ok_or_else(|| miette::miette!("Log file path has no file name: {}", path.display()))?;
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(directory).into_diagnostic()?;

    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(directory, file_name));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(writer)
        .init();
    Ok(Some(guard))
}
