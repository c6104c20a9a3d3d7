// SPDX-License-Identifier: MIT
//
// Abstract terminal signals.
//
// Each backend maps these onto its native primitive (POSIX signals sent to
// the process group, or Windows console control events). A kind the platform
// has no equivalent for is a documented no-op in that backend; a raw value
// that names no kind at all is rejected here, before it reaches a backend.

use std::fmt;
use std::str::FromStr;

use crate::error::TerminalError;

/// A signal the driver can raise against the current process group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminalSignal {
    /// The terminal is going away (`SIGHUP`, `CTRL_CLOSE_EVENT`).
    Close,
    /// Interactive interrupt, usually Ctrl-C (`SIGINT`, `CTRL_C_EVENT`).
    Interrupt,
    /// Quit/break, usually Ctrl-\ or Ctrl-Break (`SIGQUIT`, `CTRL_BREAK_EVENT`).
    Quit,
    /// Polite termination request (`SIGTERM`, `CTRL_SHUTDOWN_EVENT`).
    Terminate,
    /// Job-control stop (`SIGTSTP`). No-op on Windows.
    Suspend,
}

impl TerminalSignal {
    /// Every signal kind, in discriminant order.
    pub const ALL: [Self; 5] = [
        Self::Close,
        Self::Interrupt,
        Self::Quit,
        Self::Terminate,
        Self::Suspend,
    ];

    /// Lowercase name, as accepted by [`FromStr`].
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Close => "close",
            Self::Interrupt => "interrupt",
            Self::Quit => "quit",
            Self::Terminate => "terminate",
            Self::Suspend => "suspend",
        }
    }
}

impl fmt::Display for TerminalSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<i32> for TerminalSignal {
    type Error = TerminalError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        usize::try_from(value)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
            .ok_or_else(|| TerminalError::InvalidSignal(value.to_string()))
    }
}

impl FromStr for TerminalSignal {
    type Err = TerminalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.as_str() {
            "close" | "hup" | "hangup" => Ok(Self::Close),
            "interrupt" | "int" => Ok(Self::Interrupt),
            "quit" | "break" => Ok(Self::Quit),
            "terminate" | "term" => Ok(Self::Terminate),
            "suspend" | "tstp" => Ok(Self::Suspend),
            _ => Err(TerminalError::InvalidSignal(s.to_owned())),
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
