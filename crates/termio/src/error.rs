// SPDX-License-Identifier: MIT
//
// The single error kind surfaced by the driver.
//
// Every failure a caller can observe is a `TerminalError`: no terminal
// attached, a native call that failed (with the OS error preserved as the
// source), an out-of-range signal value, or a cancelled async read. Graceful
// end-of-input is never an error — readers return 0 for that.
//
// `TerminalError` converts into `io::Error` so the `Read`/`Write` impls can
// hand it to std consumers without losing the underlying kind.

use std::io;

use miette::Diagnostic;

/// Result alias used throughout the crate.
pub type TerminalResult<T> = Result<T, TerminalError>;

/// Errors raised by the terminal driver, its readers, and its writers.
#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum TerminalError {
    /// A mode query or raw-mode toggle found no live console/tty device.
    #[error("There is no terminal attached")]
    #[diagnostic(
        code(termio::not_attached),
        help("Raw mode needs a console or tty; input or output is redirected")
    )]
    NotAttached,

    /// A native read/write/mode/flush/signal call failed.
    #[error("Could not {operation} {stream}: {source}")]
    #[diagnostic(code(termio::native))]
    Native {
        /// What was being attempted (`"read from"`, `"change raw mode of"`, ...).
        operation: &'static str,
        /// The affected stream (`"standard input"`, `"terminal output"`, ...).
        stream: &'static str,
        /// The captured OS error.
        #[source]
        source: io::Error,
    },

    /// A raw value does not name any [`TerminalSignal`](crate::TerminalSignal).
    #[error("Invalid terminal signal: {0}")]
    #[diagnostic(
        code(termio::invalid_signal),
        help("Expected one of: close, interrupt, quit, terminate, suspend")
    )]
    InvalidSignal(String),

    /// An async read or write was cancelled before it was dispatched.
    #[error("Operation on {stream} was cancelled")]
    #[diagnostic(code(termio::cancelled))]
    Cancelled {
        /// The affected stream.
        stream: &'static str,
    },

    /// The blocking worker running an async operation panicked or was aborted.
    #[error("Background operation on {stream} failed")]
    #[diagnostic(code(termio::task))]
    Task {
        /// The affected stream.
        stream: &'static str,
        /// The join failure reported by the runtime.
        #[source]
        source: tokio::task::JoinError,
    },
}

impl TerminalError {
    /// Wrap an OS error from a native call on `stream`.
    #[must_use]
    pub const fn native(operation: &'static str, stream: &'static str, source: io::Error) -> Self {
        Self::Native {
            operation,
            stream,
            source,
        }
    }

    /// The `io::ErrorKind` this error maps to.
    #[must_use]
    pub fn kind(&self) -> io::ErrorKind {
        match self {
            Self::NotAttached => io::ErrorKind::Unsupported,
            Self::Native { source, .. } => source.kind(),
            Self::InvalidSignal(_) => io::ErrorKind::InvalidInput,
            Self::Cancelled { .. } => io::ErrorKind::Interrupted,
            Self::Task { .. } => io::ErrorKind::Other,
        }
    }
}

impl From<TerminalError> for io::Error {
    fn from(err: TerminalError) -> Self {
        Self::new(err.kind(), err)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
