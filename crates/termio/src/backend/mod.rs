// SPDX-License-Identifier: MIT
//
// Platform backends.
//
// `Backend` is the capability set the driver, readers, and writers are built
// on: handle probing, byte and wide-unit reads, writes, mode get/set, input
// flush, size queries, and signal generation. There is one implementation
// per OS plus an in-memory scripted one for tests. The OS implementation is
// picked at compile time through `SystemBackend`; nothing inspects types at
// runtime.
//
// Native reads and writes report a `Transfer` instead of `io::Result` because
// several OS calls can fail *after* moving data, and callers treat "moved
// some bytes" as success regardless of the error code.

use std::fmt;
use std::io;

use crate::mode::{ModeBits, ModeProfile};
use crate::signal::TerminalSignal;
use crate::size::Size;

#[cfg(unix)]
pub mod unix;
#[cfg(windows)]
pub mod windows;

/// The backend for the platform this crate was compiled for.
#[cfg(unix)]
pub type SystemBackend = unix::UnixBackend;

/// The backend for the platform this crate was compiled for.
#[cfg(windows)]
pub type SystemBackend = windows::WindowsBackend;

// ─── Transfer ────────────────────────────────────────────────────────────────

/// Outcome of one native read or write.
#[derive(Debug)]
pub struct Transfer {
    /// Units (bytes or wide characters) actually moved.
    pub count: usize,
    /// The error the call reported, if any — even when `count > 0`.
    pub error: Option<io::Error>,
}

impl Transfer {
    /// A call that moved `count` units and reported success.
    #[inline]
    #[must_use]
    pub const fn ok(count: usize) -> Self {
        Self { count, error: None }
    }

    /// A call that moved nothing and failed.
    #[inline]
    #[must_use]
    pub const fn failed(error: io::Error) -> Self {
        Self {
            count: 0,
            error: Some(error),
        }
    }

    /// Collapse into a result: an error only counts when nothing moved.
    ///
    /// # Errors
    ///
    /// Returns the reported error if `count` is zero.
    pub fn into_result(self) -> io::Result<usize> {
        match self.error {
            Some(err) if self.count == 0 => Err(err),
            _ => Ok(self.count),
        }
    }
}

// ─── Capabilities ────────────────────────────────────────────────────────────

/// How an interactive input handle delivers characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEncoding {
    /// 16-bit code units that must be transcoded to UTF-8 (Windows console).
    Utf16Units,
    /// Bytes that are already UTF-8 (POSIX tty).
    Utf8Bytes,
}

/// How terminal size changes are detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeSource {
    /// The OS raises this signal on resize (`SIGWINCH`).
    #[cfg(unix)]
    Signal(libc::c_int),
    /// No resize signal; the size must be polled.
    Poll,
}

/// Native descriptors for the three standard streams.
#[derive(Debug)]
pub struct StandardHandles<H> {
    /// Standard input.
    pub input: H,
    /// Standard output.
    pub output: H,
    /// Standard error.
    pub error: H,
}

/// Native descriptors for the console/tty device itself.
#[derive(Debug)]
pub struct TerminalHandles<H> {
    /// Device input (`CONIN$`, `/dev/tty`).
    pub input: H,
    /// Device output (`CONOUT$`, `/dev/tty`).
    pub output: H,
}

/// One platform's console/tty facilities.
pub trait Backend: fmt::Debug + Send + Sync + 'static {
    /// An owned OS descriptor.
    type Handle: Send + Sync + fmt::Debug + 'static;
    /// Input-side mode bitmask.
    type InputMode: ModeBits;
    /// Output-side mode bitmask.
    type OutputMode: ModeBits;

    /// How raw/cooked transitions program the input mode.
    const INPUT_PROFILE: ModeProfile<Self::InputMode>;
    /// How raw/cooked transitions program the output mode.
    const OUTPUT_PROFILE: ModeProfile<Self::OutputMode>;

    /// Short platform name for diagnostics.
    fn name(&self) -> &'static str;

    /// One-time process setup performed when the driver is created.
    fn prepare(&self) {}

    /// Descriptors for stdin/stdout/stderr.
    fn standard_handles(&self) -> StandardHandles<Self::Handle>;

    /// Descriptors for the terminal device, invalid when there is none.
    fn terminal_handles(&self) -> TerminalHandles<Self::Handle>;

    /// Non-destructive validity probe.
    fn is_handle_valid(&self, handle: &Self::Handle, write: bool) -> bool;

    /// Whether `handle` is a console/tty whose mode can be queried.
    fn is_handle_interactive(&self, handle: &Self::Handle) -> bool;

    /// How interactive handles deliver input.
    fn input_encoding(&self) -> InputEncoding;

    /// How resize is detected.
    fn resize_source(&self) -> ResizeSource;

    /// Read up to `buf.len()` bytes.
    fn read_bytes(&self, handle: &Self::Handle, buf: &mut [u8]) -> Transfer;

    /// Read up to `units.len()` wide character units from a console.
    ///
    /// Only called when [`input_encoding`](Self::input_encoding) is
    /// [`InputEncoding::Utf16Units`].
    fn read_units(&self, handle: &Self::Handle, units: &mut [u16]) -> Transfer;

    /// Write up to `buf.len()` bytes.
    fn write_bytes(&self, handle: &Self::Handle, buf: &[u8]) -> Transfer;

    /// Whether `err` means "interrupted, nothing happened, try again".
    fn is_transient(&self, err: &io::Error) -> bool;

    /// Current input mode, or `None` if `handle` is not a console/tty.
    fn input_mode(&self, handle: &Self::Handle) -> Option<Self::InputMode>;

    /// Program the input mode without touching output-side bits.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the mode cannot be applied.
    fn set_input_mode(&self, handle: &Self::Handle, mode: Self::InputMode) -> io::Result<()>;

    /// Current output mode, or `None` if `handle` is not a console/tty.
    fn output_mode(&self, handle: &Self::Handle) -> Option<Self::OutputMode>;

    /// Program the output mode without touching input-side bits.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the mode cannot be applied.
    fn set_output_mode(&self, handle: &Self::Handle, mode: Self::OutputMode) -> io::Result<()>;

    /// Discard any input typed but not yet read.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the flush fails.
    fn flush_input(&self, handle: &Self::Handle) -> io::Result<()>;

    /// Window size of the device behind `handle`.
    fn size(&self, handle: &Self::Handle) -> Option<Size>;

    /// Raise `signal` against the process group.
    ///
    /// Kinds the platform has no equivalent for return `Ok(())` without
    /// doing anything.
    ///
    /// # Errors
    ///
    /// Returns the OS error if dispatching the signal fails.
    fn generate_signal(&self, signal: TerminalSignal) -> io::Result<()>;
}

// ─── Tests ───────────────────────────────────────────────────────────────────
