// SPDX-License-Identifier: MIT
//
// Command-line surface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use termio::{TerminalError, TerminalSignal};

/// Inspect and drive the terminal through termio.
#[derive(Parser, Debug)]
#[command(name = "termio")]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Resize poll interval in milliseconds (also: TERMIO_RESIZE_INTERVAL_MS)
    #[arg(long, value_name = "MS", global = true)]
    pub resize_interval_ms: Option<u64>,

    /// Terminal device to open on Unix (also: TERMIO_TTY)
    #[arg(long, value_name = "PATH", global = true)]
    pub tty: Option<PathBuf>,

    /// Write logs to this file instead of standard error (filter: TERMIO_LOG)
    #[arg(long, value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Show how each stream is attached, the current mode, and the size
    Info,

    /// Print the terminal size as COLSxROWS
    Size,

    /// Print every terminal size change
    Watch {
        /// Stop after this many seconds instead of running until killed
        #[arg(long, value_name = "SECS")]
        seconds: Option<u64>,
    },

    /// Echo raw key bytes in hex until `q` or Ctrl-C
    Keys,

    /// Copy standard input to standard output
    Cat,

    /// Raise a signal against the process group
    Signal {
        /// close, interrupt, quit, terminate, or suspend
        #[arg(value_parser = parse_signal)]
        signal: TerminalSignal,
    },
}

fn parse_signal(value: &str) -> Result<TerminalSignal, TerminalError> {
    value.parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_subcommand_and_globals() {
        let args = Args::try_parse_from([
            "termio",
            "watch",
            "--seconds",
            "3",
            "--resize-interval-ms",
            "20",
        ])
        .unwrap();
        assert_eq!(args.command, Command::Watch { seconds: Some(3) });
        assert_eq!(args.resize_interval_ms, Some(20));
    }

    #[test]
    fn parses_signal_aliases() {
        let args = Args::try_parse_from(["termio", "signal", "int"]).unwrap();
        assert_eq!(
            args.command,
            Command::Signal {
                signal: TerminalSignal::Interrupt
            }
        );
    }

    #[test]
    fn rejects_unknown_signal() {
        assert!(Args::try_parse_from(["termio", "signal", "usr1"]).is_err());
    }

    #[test]
    fn command_is_required() {
        assert!(Args::try_parse_from(["termio"]).is_err());
    }
}
