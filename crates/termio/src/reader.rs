// SPDX-License-Identifier: MIT
//
// Blocking terminal reader with UTF-8 transcoding.
//
// A reader owns one native input handle and hands out UTF-8 bytes. There are
// three paths:
//
//   invalid handle   — reads return 0, as if the stream were /dev/null.
//   redirected       — one bounded native read straight into the caller's
//                      buffer. A failure that still moved bytes is success.
//   interactive      — on byte-oriented ttys, the same bounded read with
//                      EINTR retry. On wide-character consoles, one code
//                      point at a time: read a unit (two for a surrogate
//                      pair), encode to UTF-8 into a 4-byte residual, and
//                      drain the residual across as many calls as the
//                      caller's buffer sizes require.
//
// The residual is refilled only when empty, so a call that finds leftover
// bytes returns them immediately without touching the device.
//
// # Lone surrogates
//
// A high surrogate is expected to be followed immediately by a low one.
// When it is not (broken WriteConsoleInput callers, mostly), the high
// surrogate is delivered as U+FFFD rather than passed through or dropped.
// If the follow-up unit was something else, it is kept and delivered by the
// next call, so nothing typed is lost and the residual never exceeds one
// encoded code point. Passing the lone surrogate through or discarding it
// would be equally defensible; this choice keeps the output valid UTF-8.
//
// # Ctrl-Z
//
// The console's line reader treats Ctrl-Z (0x1A) as end-of-input, but the
// wide-character read primitive does not. In cooked mode we emulate the
// line reader and return 0; in raw mode 0x1A is ordinary data.
//
// # Cancellation
//
// `read_async` runs the blocking read on tokio's blocking pool. A token
// cancelled before the native call starts, including while the job waits in
// the pool's queue, yields `TerminalError::Cancelled` at once and the input
// stays unread. Once the native call is running it cannot be interrupted
// portably, so the read completes (or hits end-of-input) normally. Bytes
// that were read are always returned, never dropped.

use std::io;
use std::sync::{Arc, Mutex, PoisonError};

use tokio_util::sync::CancellationToken;

use crate::backend::{Backend, InputEncoding};
use crate::blocking;
use crate::error::{TerminalError, TerminalResult};
use crate::handle::{NativeHandle, StreamLock};
use crate::mode::ModeState;

/// The ASCII substitute control character (Ctrl-Z).
const SUBSTITUTE: u16 = 0x1A;

/// Largest UTF-8 encoding of one code point.
const MAX_UTF8_LEN: usize = 4;

const fn is_high_surrogate(unit: u16) -> bool {
    matches!(unit, 0xD800..=0xDBFF)
}

const fn is_low_surrogate(unit: u16) -> bool {
    matches!(unit, 0xDC00..=0xDFFF)
}

// ─── Residual ────────────────────────────────────────────────────────────────

/// Transcoded bytes not yet delivered, plus at most one unit read ahead.
#[derive(Debug, Default)]
struct Residual {
    bytes: [u8; MAX_UTF8_LEN],
    start: usize,
    end: usize,
    unit: Option<u16>,
}

impl Residual {
    const fn is_empty(&self) -> bool {
        self.start == self.end
    }

    fn load(&mut self, ch: char) {
        self.start = 0;
        self.end = ch.encode_utf8(&mut self.bytes).len();
    }

    fn drain_into(&mut self, buf: &mut [u8]) -> usize {
        let n = (self.end - self.start).min(buf.len());
        buf[..n].copy_from_slice(&self.bytes[self.start..self.start + n]);
        self.start += n;
        n
    }
}

// ─── Reader ──────────────────────────────────────────────────────────────────

/// Blocking UTF-8 reader over one native input handle.
#[derive(Debug)]
pub struct Reader<B: Backend> {
    backend: Arc<B>,
    handle: NativeHandle<B::Handle>,
    lock: StreamLock,
    mode: Arc<ModeState>,
    residual: Mutex<Residual>,
}

impl<B: Backend> Reader<B> {
    /// Wrap `raw`, probing its validity and interactivity once.
    ///
    /// `lock` serializes reads with any stream it is shared with; `mode` is
    /// the driver's raw/cooked state.
    pub fn new(
        backend: Arc<B>,
        raw: B::Handle,
        name: &'static str,
        lock: StreamLock,
        mode: Arc<ModeState>,
    ) -> Self {
        let handle = NativeHandle::probe(backend.as_ref(), raw, name, false);
        Self {
            backend,
            handle,
            lock,
            mode,
            residual: Mutex::new(Residual::default()),
        }
    }

    /// Stream name used in diagnostics.
    #[inline]
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.handle.name()
    }

    /// Whether the handle was usable at startup.
    #[inline]
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.handle.is_valid()
    }

    /// Whether the handle is an interactive console/tty.
    #[inline]
    #[must_use]
    pub const fn is_interactive(&self) -> bool {
        self.handle.is_interactive()
    }

    /// Whether the handle is redirected to a file or pipe.
    #[inline]
    #[must_use]
    pub const fn is_redirected(&self) -> bool {
        self.handle.is_redirected()
    }

    /// The wrapped handle.
    #[inline]
    pub const fn handle(&self) -> &NativeHandle<B::Handle> {
        &self.handle
    }

    /// The lock serializing this reader.
    #[inline]
    #[must_use]
    pub const fn lock(&self) -> &StreamLock {
        &self.lock
    }

    /// Read up to `buf.len()` bytes of UTF-8 input, blocking until at least
    /// one byte is available or input ends.
    ///
    /// Returns 0 at end of input, for an empty `buf`, and for an invalid
    /// handle.
    ///
    /// # Errors
    ///
    /// Returns [`TerminalError::Native`] if the native read fails without
    /// transferring anything.
    pub fn read_into(&self, buf: &mut [u8]) -> TerminalResult<usize> {
        if buf.is_empty() || !self.handle.is_valid() {
            return Ok(0);
        }

        if self.handle.is_redirected() {
            let _guard = self.lock.acquire();
            return self
                .backend
                .read_bytes(self.handle.raw(), buf)
                .into_result()
                .map_err(|err| self.read_error(err));
        }

        match self.backend.input_encoding() {
            InputEncoding::Utf8Bytes => self.read_tty(buf),
            InputEncoding::Utf16Units => self.read_transcoded(buf),
        }
    }

    /// Read up to `len` bytes on the blocking pool.
    ///
    /// See the module docs for cancellation semantics: `cancel` is honoured
    /// until the native read starts, even while the job is still queued.
    ///
    /// # Errors
    ///
    /// Returns [`TerminalError::Cancelled`] if `cancel` fired before the read
    /// started, [`TerminalError::Task`] if the blocking worker panicked,
    /// and otherwise whatever [`read_into`](Self::read_into) returns.
    pub async fn read_async(
        self: &Arc<Self>,
        len: usize,
        cancel: &CancellationToken,
    ) -> TerminalResult<Vec<u8>> {
        let this = Arc::clone(self);
        blocking::dispatch(self.name(), cancel, move || {
            let mut buf = vec![0; len];
            let n = this.read_into(&mut buf)?;
            buf.truncate(n);
            Ok(buf)
        })
        .await
    }

    // ── Mode helpers ─────────────────────────────────────────────────

    /// Current input mode, or `None` if this is not a console/tty.
    #[must_use]
    pub fn mode(&self) -> Option<B::InputMode> {
        self.backend.input_mode(self.handle.raw())
    }

    /// Replace the input mode.
    ///
    /// # Errors
    ///
    /// Returns [`TerminalError::Native`] if the OS rejects the mode.
    pub fn set_mode(&self, mode: B::InputMode) -> TerminalResult<()> {
        self.backend
            .set_input_mode(self.handle.raw(), mode)
            .map_err(|err| TerminalError::native("set mode of", self.name(), err))
    }

    /// Turn on `bits`, leaving every other bit as it is.
    ///
    /// # Errors
    ///
    /// Returns [`TerminalError::NotAttached`] if the mode cannot be queried
    /// and [`TerminalError::Native`] if it cannot be set.
    pub fn add_mode(&self, bits: B::InputMode) -> TerminalResult<()> {
        let current = self.mode().ok_or(TerminalError::NotAttached)?;
        self.set_mode(current | bits)
    }

    /// Turn off `bits`, leaving every other bit as it is.
    ///
    /// # Errors
    ///
    /// Returns [`TerminalError::NotAttached`] if the mode cannot be queried
    /// and [`TerminalError::Native`] if it cannot be set.
    pub fn remove_mode(&self, bits: B::InputMode) -> TerminalResult<()> {
        let current = self.mode().ok_or(TerminalError::NotAttached)?;
        self.set_mode(current - bits)
    }

    /// Discard input typed but not yet read.
    ///
    /// # Errors
    ///
    /// Returns [`TerminalError::Native`] if the flush fails.
    pub fn flush_input(&self) -> TerminalResult<()> {
        self.backend
            .flush_input(self.handle.raw())
            .map_err(|err| TerminalError::native("flush input buffer of", self.name(), err))
    }

    // ── Read paths ───────────────────────────────────────────────────

    fn read_error(&self, err: io::Error) -> TerminalError {
        TerminalError::native("read from", self.name(), err)
    }

    fn read_tty(&self, buf: &mut [u8]) -> TerminalResult<usize> {
        let _guard = self.lock.acquire();
        loop {
            let transfer = self.backend.read_bytes(self.handle.raw(), buf);
            if transfer.count == 0
                && transfer
                    .error
                    .as_ref()
                    .is_some_and(|err| self.backend.is_transient(err))
            {
                tracing::trace!(stream = self.name(), "interrupted read, retrying");
                continue;
            }
            return transfer.into_result().map_err(|err| self.read_error(err));
        }
    }

    /// Read one wide unit, retrying transient aborts. `None` is end of input.
    fn read_unit(&self) -> TerminalResult<Option<u16>> {
        let mut unit = [0u16; 1];
        loop {
            let transfer = self.backend.read_units(self.handle.raw(), &mut unit);
            if transfer.count == 0
                && transfer
                    .error
                    .as_ref()
                    .is_some_and(|err| self.backend.is_transient(err))
            {
                tracing::trace!(stream = self.name(), "aborted console read, retrying");
                continue;
            }
            let n = transfer.into_result().map_err(|err| self.read_error(err))?;
            return Ok((n > 0).then_some(unit[0]));
        }
    }

    fn read_transcoded(&self, buf: &mut [u8]) -> TerminalResult<usize> {
        let _guard = self.lock.acquire();
        let mut residual = self.residual.lock().unwrap_or_else(PoisonError::into_inner);

        if residual.is_empty() {
            let first = match residual.unit.take() {
                Some(unit) => unit,
                None => match self.read_unit()? {
                    Some(unit) => unit,
                    None => return Ok(0),
                },
            };

            if first == SUBSTITUTE && !self.mode.get().is_raw() {
                return Ok(0);
            }

            let ch = if is_high_surrogate(first) {
                match self.read_unit()? {
                    Some(low) if is_low_surrogate(low) => char::decode_utf16([first, low])
                        .next()
                        .and_then(Result::ok)
                        .unwrap_or(char::REPLACEMENT_CHARACTER),
                    Some(other) => {
                        residual.unit = Some(other);
                        char::REPLACEMENT_CHARACTER
                    }
                    None => char::REPLACEMENT_CHARACTER,
                }
            } else {
                char::from_u32(u32::from(first)).unwrap_or(char::REPLACEMENT_CHARACTER)
            };

            residual.load(ch);
        }

        Ok(residual.drain_into(buf))
    }
}

impl<B: Backend> io::Read for &Reader<B> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_into(buf).map_err(io::Error::from)
    }
}

impl<B: Backend> io::Read for Reader<B> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_into(buf).map_err(io::Error::from)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
