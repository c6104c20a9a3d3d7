// SPDX-License-Identifier: MIT
//
// Blocking terminal writer.
//
// Writes go straight to the native handle with no buffering of our own; the
// caller decides when to batch. A handle that was invalid at startup (a GUI
// process with no console, a closed descriptor) swallows every write and
// reports full success, the same /dev/null illusion readers give by
// returning 0.
//
// The mode helpers here act on the output side only and are what the driver
// uses when it reprograms the terminal for raw or cooked mode.

use std::io;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::backend::Backend;
use crate::blocking;
use crate::error::{TerminalError, TerminalResult};
use crate::handle::{NativeHandle, StreamLock};
use crate::size::Size;

/// Blocking writer over one native output handle.
#[derive(Debug)]
pub struct Writer<B: Backend> {
    backend: Arc<B>,
    handle: NativeHandle<B::Handle>,
    lock: StreamLock,
}

impl<B: Backend> Writer<B> {
    /// Wrap `raw`, probing it with a zero-length write.
    pub fn new(backend: Arc<B>, raw: B::Handle, name: &'static str, lock: StreamLock) -> Self {
        let handle = NativeHandle::probe(backend.as_ref(), raw, name, true);
        Self {
            backend,
            handle,
            lock,
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

    /// The lock serializing this writer.
    #[inline]
    #[must_use]
    pub const fn lock(&self) -> &StreamLock {
        &self.lock
    }

    /// Window size of the device behind this handle.
    #[must_use]
    pub fn size(&self) -> Option<Size> {
        if self.handle.is_valid() {
            self.backend.size(self.handle.raw())
        } else {
            None
        }
    }

    /// Write some prefix of `buf`, returning how many bytes were taken.
    ///
    /// # Errors
    ///
    /// Returns [`TerminalError::Native`] if the native write fails without
    /// transferring anything.
    pub fn write_bytes(&self, buf: &[u8]) -> TerminalResult<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if !self.handle.is_valid() {
            return Ok(buf.len());
        }
        let _guard = self.lock.acquire();
        self.write_locked(buf)
    }

    /// Write all of `buf`, holding the stream lock for the duration so
    /// concurrent writers never interleave inside one call.
    ///
    /// # Errors
    ///
    /// Returns [`TerminalError::Native`] if a native write fails, or with
    /// kind `WriteZero` if the OS stops accepting bytes.
    pub fn write_all_bytes(&self, mut buf: &[u8]) -> TerminalResult<()> {
        if buf.is_empty() || !self.handle.is_valid() {
            return Ok(());
        }
        let _guard = self.lock.acquire();
        while !buf.is_empty() {
            match self.write_locked(buf)? {
                0 => {
                    return Err(TerminalError::native(
                        "write to",
                        self.name(),
                        io::Error::from(io::ErrorKind::WriteZero),
                    ));
                }
                n => buf = &buf[n..],
            }
        }
        Ok(())
    }

    /// Write all of `bytes` on the blocking pool.
    ///
    /// Like [`Reader::read_async`](crate::Reader::read_async), `cancel` is
    /// honoured until the native write starts.
    ///
    /// # Errors
    ///
    /// Returns [`TerminalError::Cancelled`] if `cancel` fired before the write
    /// started, [`TerminalError::Task`] if the worker panicked, and
    /// otherwise whatever [`write_all_bytes`](Self::write_all_bytes) returns.
    pub async fn write_async(
        self: &Arc<Self>,
        bytes: Vec<u8>,
        cancel: &CancellationToken,
    ) -> TerminalResult<()> {
        let this = Arc::clone(self);
        blocking::dispatch(self.name(), cancel, move || this.write_all_bytes(&bytes)).await
    }

    fn write_locked(&self, buf: &[u8]) -> TerminalResult<usize> {
        self.backend
            .write_bytes(self.handle.raw(), buf)
            .into_result()
            .map_err(|err| TerminalError::native("write to", self.name(), err))
    }

    // ── Mode helpers ─────────────────────────────────────────────────

    /// Current output mode, or `None` if this is not a console/tty.
    #[must_use]
    pub fn mode(&self) -> Option<B::OutputMode> {
        self.backend.output_mode(self.handle.raw())
    }

    /// Replace the output mode.
    ///
    /// # Errors
    ///
    /// Returns [`TerminalError::Native`] if the OS rejects the mode.
    pub fn set_mode(&self, mode: B::OutputMode) -> TerminalResult<()> {
        self.backend
            .set_output_mode(self.handle.raw(), mode)
            .map_err(|err| TerminalError::native("set mode of", self.name(), err))
    }

    /// Turn on `bits`, leaving every other bit as it is.
    ///
    /// # Errors
    ///
    /// Returns [`TerminalError::NotAttached`] if the mode cannot be queried
    /// and [`TerminalError::Native`] if it cannot be set.
    pub fn add_mode(&self, bits: B::OutputMode) -> TerminalResult<()> {
        let current = self.mode().ok_or(TerminalError::NotAttached)?;
        self.set_mode(current | bits)
    }

    /// Turn off `bits`, leaving every other bit as it is.
    ///
    /// # Errors
    ///
    /// Returns [`TerminalError::NotAttached`] if the mode cannot be queried
    /// and [`TerminalError::Native`] if it cannot be set.
    pub fn remove_mode(&self, bits: B::OutputMode) -> TerminalResult<()> {
        let current = self.mode().ok_or(TerminalError::NotAttached)?;
        self.set_mode(current - bits)
    }
}

impl<B: Backend> io::Write for &Writer<B> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_bytes(buf).map_err(io::Error::from)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.write_all_bytes(buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<B: Backend> io::Write for Writer<B> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_bytes(buf).map_err(io::Error::from)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.write_all_bytes(buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedBackend, ScriptedMode, Slot};
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn writer(backend: &Arc<ScriptedBackend>, slot: Slot) -> Writer<ScriptedBackend> {
        Writer::new(Arc::clone(backend), slot, "terminal output", StreamLock::new())
    }

    #[test]
    fn writes_reach_the_device() {
        let backend = Arc::new(ScriptedBackend::interactive());
        let out = writer(&backend, Slot::TermOut);

        assert_eq!(out.write_bytes(b"hello").unwrap(), 5);
        out.write_all_bytes(b", world").unwrap();
        assert_eq!(backend.written(Slot::TermOut), b"hello, world");
    }

    #[test]
    fn std_write_macro_works() {
        let backend = Arc::new(ScriptedBackend::interactive());
        let out = writer(&backend, Slot::StdOut);

        write!(&out, "{}x{}", 80, 24).unwrap();
        (&out).flush().unwrap();
        assert_eq!(backend.written(Slot::StdOut), b"80x24");
    }

    #[test]
    fn invalid_handle_swallows_writes() {
        let backend = Arc::new(ScriptedBackend::interactive());
        backend.set_valid(Slot::TermOut, false);
        let out = writer(&backend, Slot::TermOut);

        assert!(!out.is_valid());
        assert_eq!(out.write_bytes(b"gone").unwrap(), 4);
        out.write_all_bytes(b"also gone").unwrap();
        assert!(backend.written(Slot::TermOut).is_empty());
    }

    #[test]
    fn empty_write_is_zero() {
        let backend = Arc::new(ScriptedBackend::interactive());
        let out = writer(&backend, Slot::TermOut);
        assert_eq!(out.write_bytes(b"").unwrap(), 0);
    }

    #[test]
    fn failed_write_names_stream() {
        let backend = Arc::new(ScriptedBackend::interactive());
        backend.fail_writes(Slot::TermOut, Some(io::ErrorKind::BrokenPipe));
        let out = writer(&backend, Slot::TermOut);

        let err = out.write_all_bytes(b"x").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert_eq!(
            err.to_string(),
            format!(
                "Could not write to terminal output: {}",
                io::Error::from(io::ErrorKind::BrokenPipe)
            )
        );
    }

    #[test]
    fn size_comes_from_the_device() {
        let backend = Arc::new(ScriptedBackend::interactive());
        let out = writer(&backend, Slot::TermOut);
        assert_eq!(out.size(), Some(Size::new(80, 24)));

        backend.resize(Size::new(120, 40));
        assert_eq!(out.size(), Some(Size::new(120, 40)));
    }

    #[test]
    fn add_and_remove_mode_keep_other_bits() {
        let backend = Arc::new(ScriptedBackend::interactive());
        let out = writer(&backend, Slot::TermOut);
        let before = out.mode().unwrap();

        out.remove_mode(ScriptedMode::WRAP).unwrap();
        assert_eq!(out.mode().unwrap(), before - ScriptedMode::WRAP);

        out.add_mode(ScriptedMode::WRAP | ScriptedMode::MOUSE).unwrap();
        assert_eq!(out.mode().unwrap(), before | ScriptedMode::MOUSE);
    }

    #[test]
    fn redirected_writer_has_no_mode() {
        let backend = Arc::new(ScriptedBackend::interactive());
        backend.set_interactive(Slot::StdOut, false);
        let out = writer(&backend, Slot::StdOut);

        assert!(out.is_redirected());
        assert_eq!(out.mode(), None);
        assert!(matches!(
            out.add_mode(ScriptedMode::WRAP),
            Err(TerminalError::NotAttached)
        ));
    }

    #[tokio::test]
    async fn write_async_writes_everything() {
        let backend = Arc::new(ScriptedBackend::interactive());
        let out = Arc::new(writer(&backend, Slot::TermOut));

        out.write_async(b"later".to_vec(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(backend.written(Slot::TermOut), b"later");
    }

    #[tokio::test]
    async fn write_async_precancelled_writes_nothing() {
        let backend = Arc::new(ScriptedBackend::interactive());
        let out = Arc::new(writer(&backend, Slot::TermOut));

        let token = CancellationToken::new();
        token.cancel();
        let err = out.write_async(b"never".to_vec(), &token).await.unwrap_err();
        assert!(matches!(err, TerminalError::Cancelled { .. }));
        assert!(backend.written(Slot::TermOut).is_empty());
    }

    #[test]
    fn write_async_cancelled_while_queued_writes_nothing() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .max_blocking_threads(1)
            .build()
            .unwrap();
        let (release, parked) = std::sync::mpsc::channel::<()>();
        let _busy = runtime.spawn_blocking(move || {
            let _ = parked.recv_timeout(std::time::Duration::from_secs(5));
        });

        let backend = Arc::new(ScriptedBackend::interactive());
        let out = Arc::new(writer(&backend, Slot::TermOut));
        let token = CancellationToken::new();

        let result = runtime.block_on({
            let token = token.clone();
            async move {
                let pending = tokio::spawn({
                    let token = token.clone();
                    async move { out.write_async(b"never".to_vec(), &token).await }
                });
                for _ in 0..8 {
                    tokio::task::yield_now().await;
                }
                token.cancel();
                pending.await.unwrap()
            }
        });
        assert!(matches!(result, Err(TerminalError::Cancelled { .. })));

        release.send(()).unwrap();
        drop(runtime);
        assert!(backend.written(Slot::TermOut).is_empty());
    }
}
