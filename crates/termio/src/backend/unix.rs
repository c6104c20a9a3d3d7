// SPDX-License-Identifier: MIT
//
// POSIX backend — termios, ioctl(TIOCGWINSZ), read/write on raw fds.
//
// Safety: this module necessarily uses `unsafe` for the libc calls. These are
// the standard POSIX interfaces for terminal control; there is no safe
// alternative in std. Each unsafe block wraps exactly one call.
#![allow(unsafe_code)]
//
// Mode layout: the input mode packs `c_iflag` into the low 32 bits and
// `c_lflag` into the high 32 bits; the output mode is `c_oflag`. Each setter
// re-reads the full termios and replaces only its own fields, so the input
// and output sides can both be pointed at the same tty without stepping on
// each other.
//
// The terminal device is opened separately from the standard streams (which
// may be redirected). Without a controlling terminal the open fails and the
// terminal handles are simply invalid.

use std::fs::OpenOptions;
use std::io;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use bitflags::bitflags;

use super::{Backend, InputEncoding, ResizeSource, StandardHandles, TerminalHandles, Transfer};
use crate::mode::ModeProfile;
use crate::signal::TerminalSignal;
use crate::size::Size;

// ─── Mode flags ──────────────────────────────────────────────────────────────

/// Shift applied to `c_lflag` bits inside [`UnixInputMode`].
const LFLAG_SHIFT: u32 = 32;

/// `c_iflag` bits sit unshifted.
#[allow(clippy::cast_lossless, trivial_numeric_casts)]
const fn iflag(bit: libc::tcflag_t) -> u64 {
    bit as u64
}

#[allow(clippy::cast_lossless, trivial_numeric_casts)]
const fn oflag(bit: libc::tcflag_t) -> u64 {
    bit as u64
}

#[allow(clippy::cast_lossless, trivial_numeric_casts)]
const fn lflag(bit: libc::tcflag_t) -> u64 {
    (bit as u64) << LFLAG_SHIFT
}

bitflags! {
    /// Input-side termios bits (`c_iflag` low, `c_lflag` high).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct UnixInputMode: u64 {
        const IGNBRK = iflag(libc::IGNBRK);
        const BRKINT = iflag(libc::BRKINT);
        const PARMRK = iflag(libc::PARMRK);
        const ISTRIP = iflag(libc::ISTRIP);
        const INLCR  = iflag(libc::INLCR);
        const IGNCR  = iflag(libc::IGNCR);
        const ICRNL  = iflag(libc::ICRNL);
        const IXON   = iflag(libc::IXON);
        const ECHO   = lflag(libc::ECHO);
        const ECHONL = lflag(libc::ECHONL);
        const ICANON = lflag(libc::ICANON);
        const ISIG   = lflag(libc::ISIG);
        const IEXTEN = lflag(libc::IEXTEN);
    }
}

bitflags! {
    /// Output-side termios bits (`c_oflag`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct UnixOutputMode: u64 {
        const OPOST = oflag(libc::OPOST);
        const ONLCR = oflag(libc::ONLCR);
    }
}

#[allow(clippy::cast_lossless, trivial_numeric_casts)]
fn pack_input(t: &libc::termios) -> UnixInputMode {
    UnixInputMode::from_bits_retain(t.c_iflag as u64 | ((t.c_lflag as u64) << LFLAG_SHIFT))
}

#[allow(clippy::cast_possible_truncation, trivial_numeric_casts)]
fn unpack_input(t: &mut libc::termios, mode: UnixInputMode) {
    let bits = mode.bits();
    t.c_iflag = (bits & u64::from(u32::MAX)) as libc::tcflag_t;
    t.c_lflag = (bits >> LFLAG_SHIFT) as libc::tcflag_t;

    // Non-canonical reads return as soon as one byte is available.
    if !mode.contains(UnixInputMode::ICANON) {
        t.c_cc[libc::VMIN] = 1;
        t.c_cc[libc::VTIME] = 0;
    }
}

// ─── Handle ──────────────────────────────────────────────────────────────────

/// A POSIX file descriptor as seen by the driver.
#[derive(Debug)]
pub enum UnixHandle {
    /// A standard descriptor (0, 1, 2); never closed by us.
    Borrowed(RawFd),
    /// A descriptor we opened (the tty device); closed on drop.
    Owned(OwnedFd),
    /// No descriptor.
    Invalid,
}

impl UnixHandle {
    /// The raw descriptor, if any.
    #[must_use]
    pub fn fd(&self) -> Option<RawFd> {
        match self {
            Self::Borrowed(fd) => Some(*fd),
            Self::Owned(fd) => Some(fd.as_raw_fd()),
            Self::Invalid => None,
        }
    }

    fn open(path: &Path) -> Self {
        match OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NOCTTY | libc::O_CLOEXEC)
            .open(path)
        {
            Ok(file) => Self::Owned(OwnedFd::from(file)),
            Err(err) => {
                tracing::debug!(device = %path.display(), %err, "no terminal device");
                Self::Invalid
            }
        }
    }
}

fn tcgetattr(fd: RawFd) -> io::Result<libc::termios> {
    let mut termios: libc::termios = unsafe { std::mem::zeroed() };
    if unsafe { libc::tcgetattr(fd, &raw mut termios) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(termios)
}

fn tcsetattr(fd: RawFd, termios: &libc::termios) -> io::Result<()> {
    if unsafe { libc::tcsetattr(fd, libc::TCSANOW, termios) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

fn bad_descriptor() -> io::Error {
    io::Error::from_raw_os_error(libc::EBADF)
}

#[allow(clippy::cast_sign_loss)] // n >= 0 checked first.
fn transfer_from(n: libc::ssize_t) -> Transfer {
    if n < 0 {
        Transfer::failed(io::Error::last_os_error())
    } else {
        Transfer::ok(n as usize)
    }
}

// ─── UnixBackend ─────────────────────────────────────────────────────────────

/// termios/ioctl backend for Linux, macOS, and the BSDs.
#[derive(Debug, Clone)]
pub struct UnixBackend {
    device: PathBuf,
}

impl UnixBackend {
    /// Default terminal device.
    pub const DEFAULT_DEVICE: &'static str = "/dev/tty";

    /// A backend that opens `device` for the terminal handles.
    #[must_use]
    pub fn new(device: impl Into<PathBuf>) -> Self {
        Self {
            device: device.into(),
        }
    }

    /// The configured terminal device path.
    #[must_use]
    pub fn device(&self) -> &Path {
        &self.device
    }
}

impl Default for UnixBackend {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DEVICE)
    }
}

impl Backend for UnixBackend {
    type Handle = UnixHandle;
    type InputMode = UnixInputMode;
    type OutputMode = UnixOutputMode;

    const INPUT_PROFILE: ModeProfile<UnixInputMode> = ModeProfile {
        clear: UnixInputMode::IGNBRK
            .union(UnixInputMode::PARMRK)
            .union(UnixInputMode::ISTRIP)
            .union(UnixInputMode::INLCR)
            .union(UnixInputMode::IGNCR)
            .union(UnixInputMode::ECHONL),
        set: UnixInputMode::empty(),
        cooked: UnixInputMode::BRKINT
            .union(UnixInputMode::ICRNL)
            .union(UnixInputMode::IXON)
            .union(UnixInputMode::ECHO)
            .union(UnixInputMode::ICANON)
            .union(UnixInputMode::ISIG)
            .union(UnixInputMode::IEXTEN),
    };

    const OUTPUT_PROFILE: ModeProfile<UnixOutputMode> = ModeProfile {
        clear: UnixOutputMode::empty(),
        set: UnixOutputMode::OPOST.union(UnixOutputMode::ONLCR),
        cooked: UnixOutputMode::empty(),
    };

    fn name(&self) -> &'static str {
        "unix"
    }

    fn standard_handles(&self) -> StandardHandles<UnixHandle> {
        StandardHandles {
            input: UnixHandle::Borrowed(libc::STDIN_FILENO),
            output: UnixHandle::Borrowed(libc::STDOUT_FILENO),
            error: UnixHandle::Borrowed(libc::STDERR_FILENO),
        }
    }

    fn terminal_handles(&self) -> TerminalHandles<UnixHandle> {
        TerminalHandles {
            input: UnixHandle::open(&self.device),
            output: UnixHandle::open(&self.device),
        }
    }

    fn is_handle_valid(&self, handle: &UnixHandle, write: bool) -> bool {
        let Some(fd) = handle.fd() else {
            return false;
        };
        if unsafe { libc::fcntl(fd, libc::F_GETFD) } == -1 {
            return false;
        }
        if write {
            let dummy = 0u8;
            return unsafe { libc::write(fd, (&raw const dummy).cast(), 0) } >= 0;
        }
        true
    }

    fn is_handle_interactive(&self, handle: &UnixHandle) -> bool {
        handle
            .fd()
            .is_some_and(|fd| unsafe { libc::isatty(fd) } == 1 && tcgetattr(fd).is_ok())
    }

    fn input_encoding(&self) -> InputEncoding {
        InputEncoding::Utf8Bytes
    }

    fn resize_source(&self) -> ResizeSource {
        ResizeSource::Signal(libc::SIGWINCH)
    }

    fn read_bytes(&self, handle: &UnixHandle, buf: &mut [u8]) -> Transfer {
        let Some(fd) = handle.fd() else {
            return Transfer::failed(bad_descriptor());
        };
        transfer_from(unsafe { libc::read(fd, buf.as_mut_ptr().cast(), buf.len()) })
    }

    fn read_units(&self, _handle: &UnixHandle, _units: &mut [u16]) -> Transfer {
        Transfer::failed(io::Error::new(
            io::ErrorKind::Unsupported,
            "tty input is byte-oriented",
        ))
    }

    fn write_bytes(&self, handle: &UnixHandle, buf: &[u8]) -> Transfer {
        let Some(fd) = handle.fd() else {
            return Transfer::failed(bad_descriptor());
        };
        transfer_from(unsafe { libc::write(fd, buf.as_ptr().cast(), buf.len()) })
    }

    fn is_transient(&self, err: &io::Error) -> bool {
        err.kind() == io::ErrorKind::Interrupted
    }

    fn input_mode(&self, handle: &UnixHandle) -> Option<UnixInputMode> {
        tcgetattr(handle.fd()?).ok().map(|t| pack_input(&t))
    }

    fn set_input_mode(&self, handle: &UnixHandle, mode: UnixInputMode) -> io::Result<()> {
        let fd = handle.fd().ok_or_else(bad_descriptor)?;
        let mut termios = tcgetattr(fd)?;
        unpack_input(&mut termios, mode);
        tcsetattr(fd, &termios)
    }

    #[allow(clippy::cast_lossless, trivial_numeric_casts)]
    fn output_mode(&self, handle: &UnixHandle) -> Option<UnixOutputMode> {
        tcgetattr(handle.fd()?)
            .ok()
            .map(|t| UnixOutputMode::from_bits_retain(t.c_oflag as u64))
    }

    #[allow(clippy::cast_possible_truncation, trivial_numeric_casts)]
    fn set_output_mode(&self, handle: &UnixHandle, mode: UnixOutputMode) -> io::Result<()> {
        let fd = handle.fd().ok_or_else(bad_descriptor)?;
        let mut termios = tcgetattr(fd)?;
        termios.c_oflag = mode.bits() as libc::tcflag_t;
        tcsetattr(fd, &termios)
    }

    fn flush_input(&self, handle: &UnixHandle) -> io::Result<()> {
        let fd = handle.fd().ok_or_else(bad_descriptor)?;
        if unsafe { libc::tcflush(fd, libc::TCIFLUSH) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn size(&self, handle: &UnixHandle) -> Option<Size> {
        let fd = handle.fd()?;
        let mut ws: libc::winsize = unsafe { std::mem::zeroed() };
        if unsafe { libc::ioctl(fd, libc::TIOCGWINSZ, &raw mut ws) } != 0 {
            return None;
        }
        Size::from_nonzero(ws.ws_col, ws.ws_row)
    }

    fn generate_signal(&self, signal: TerminalSignal) -> io::Result<()> {
        let sig = match signal {
            TerminalSignal::Close => libc::SIGHUP,
            TerminalSignal::Interrupt => libc::SIGINT,
            TerminalSignal::Quit => libc::SIGQUIT,
            TerminalSignal::Terminate => libc::SIGTERM,
            TerminalSignal::Suspend => libc::SIGTSTP,
        };

        // Pid 0 addresses every process in our process group.
        if unsafe { libc::kill(0, sig) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
