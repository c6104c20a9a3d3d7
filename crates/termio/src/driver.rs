// SPDX-License-Identifier: MIT
//
// The terminal driver — streams, raw/cooked mode, size, and signals.
//
// A driver owns five streams built once from the backend's native handles:
// standard input/output/error and the terminal device's own input/output.
// The device streams are what raw-mode transitions act on, because the
// standard streams may be redirected while a user is still sitting at the
// terminal. Standard input shares its lock with terminal input, and standard
// output with terminal output, so paired streams never interleave.
//
// # Mode transitions
//
// The first successful transition captures both sides' modes as the
// original snapshot. Every later target is computed from that snapshot
// through the backend's profiles, never from the current mode, so any
// sequence of toggles lands on exactly two bitmasks. Construction performs
// one cooked-mode transition (without flushing) to normalise whatever state
// the parent process left behind; a missing terminal is fine there.
//
// Mode edits take only the driver's transition lock, never a stream lock,
// so toggling raw mode while another thread is blocked in a read is safe:
// the read continues under the new mode once it returns.
//
// # Panic safety
//
// A process that panics in raw mode leaves the user's shell without echo.
// `install_panic_hook` writes the original snapshot back before the
// previous hook prints the message. It uses `try_lock` because the
// panicking thread may be the one holding the transition lock.

use std::sync::{Arc, Mutex, MutexGuard, Once, OnceLock, PoisonError, TryLockError};

use crate::backend::{Backend, SystemBackend};
use crate::config::DriverConfig;
use crate::error::{TerminalError, TerminalResult};
use crate::handle::StreamLock;
use crate::mode::{ModeSnapshot, ModeState, TerminalMode};
use crate::reader::Reader;
use crate::resize::{ResizeMonitor, ResizeSubscription};
use crate::signal::TerminalSignal;
use crate::size::Size;
use crate::writer::Writer;

type Snapshot<B> = ModeSnapshot<<B as Backend>::InputMode, <B as Backend>::OutputMode>;

/// First size any of `writers` can report.
fn first_size<'a, B: Backend>(writers: impl IntoIterator<Item = &'a Arc<Writer<B>>>) -> Option<Size> {
    writers.into_iter().find_map(|writer| writer.size())
}

// ─── Driver ──────────────────────────────────────────────────────────────────

/// Process-wide authority over terminal streams and modes.
#[derive(Debug)]
pub struct Driver<B: Backend> {
    backend: Arc<B>,
    standard_in: Arc<Reader<B>>,
    standard_out: Arc<Writer<B>>,
    standard_error: Arc<Writer<B>>,
    terminal_in: Arc<Reader<B>>,
    terminal_out: Arc<Writer<B>>,
    mode: Arc<ModeState>,
    original: Mutex<Option<Snapshot<B>>>,
    resize: ResizeMonitor,
}

impl<B: Backend> Driver<B> {
    /// Build a driver over `backend`.
    ///
    /// Prepares the backend, wraps and probes every handle, captures the
    /// initial size for resize monitoring, and normalises the terminal to
    /// cooked mode if one is attached.
    pub fn with_backend(backend: B, config: &DriverConfig) -> Self {
        backend.prepare();
        let backend = Arc::new(backend);
        let mode = Arc::new(ModeState::new());

        let input_lock = StreamLock::new();
        let output_lock = StreamLock::new();
        let standard = backend.standard_handles();
        let terminal = backend.terminal_handles();

        let standard_in = Arc::new(Reader::new(
            Arc::clone(&backend),
            standard.input,
            "standard input",
            input_lock.clone(),
            Arc::clone(&mode),
        ));
        let standard_out = Arc::new(Writer::new(
            Arc::clone(&backend),
            standard.output,
            "standard output",
            output_lock.clone(),
        ));
        let standard_error = Arc::new(Writer::new(
            Arc::clone(&backend),
            standard.error,
            "standard error",
            StreamLock::new(),
        ));
        let terminal_in = Arc::new(Reader::new(
            Arc::clone(&backend),
            terminal.input,
            "terminal input",
            input_lock,
            Arc::clone(&mode),
        ));
        let terminal_out = Arc::new(Writer::new(
            Arc::clone(&backend),
            terminal.output,
            "terminal output",
            output_lock,
        ));

        let outputs = [
            Arc::clone(&terminal_out),
            Arc::clone(&standard_out),
            Arc::clone(&standard_error),
        ];
        let resize = ResizeMonitor::new(
            backend.resize_source(),
            config.resize_interval,
            Box::new(move || first_size(&outputs)),
        );

        let driver = Self {
            backend,
            standard_in,
            standard_out,
            standard_error,
            terminal_in,
            terminal_out,
            mode,
            original: Mutex::new(None),
            resize,
        };

        match driver.apply(TerminalMode::Cooked, false) {
            Ok(()) => {}
            Err(TerminalError::NotAttached) => tracing::debug!("no terminal attached"),
            Err(err) => tracing::warn!(%err, "could not normalise terminal to cooked mode"),
        }

        tracing::debug!(
            backend = driver.backend.name(),
            size = ?driver.resize.last_size(),
            "terminal driver ready"
        );
        driver
    }

    // ── Streams ──────────────────────────────────────────────────────

    /// Standard input.
    #[inline]
    pub const fn standard_in(&self) -> &Arc<Reader<B>> {
        &self.standard_in
    }

    /// Standard output.
    #[inline]
    pub const fn standard_out(&self) -> &Arc<Writer<B>> {
        &self.standard_out
    }

    /// Standard error.
    #[inline]
    pub const fn standard_error(&self) -> &Arc<Writer<B>> {
        &self.standard_error
    }

    /// The terminal device's input, even when standard input is redirected.
    #[inline]
    pub const fn terminal_in(&self) -> &Arc<Reader<B>> {
        &self.terminal_in
    }

    /// The terminal device's output, even when standard output is redirected.
    #[inline]
    pub const fn terminal_out(&self) -> &Arc<Writer<B>> {
        &self.terminal_out
    }

    /// The backend this driver runs on.
    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    // ── Size ─────────────────────────────────────────────────────────

    /// Terminal size in cells, or `None` if no device can report one.
    ///
    /// Asks terminal output first, then standard output, then standard
    /// error, so one redirected output is tolerated.
    #[must_use]
    pub fn size(&self) -> Option<Size> {
        first_size([&self.terminal_out, &self.standard_out, &self.standard_error])
    }

    /// The resize monitor.
    #[inline]
    pub const fn resize(&self) -> &ResizeMonitor {
        &self.resize
    }

    /// Call `callback` with the new size whenever the terminal is resized.
    pub fn on_resize(&self, callback: impl Fn(Size) + Send + Sync + 'static) -> ResizeSubscription {
        self.resize.subscribe(callback)
    }

    // ── Modes ────────────────────────────────────────────────────────

    /// The current raw/cooked state.
    #[inline]
    #[must_use]
    pub fn mode(&self) -> TerminalMode {
        self.mode.get()
    }

    /// The modes captured on the first successful transition.
    #[must_use]
    pub fn original_modes(&self) -> Option<Snapshot<B>> {
        *self.lock_original()
    }

    /// Switch the terminal into raw (`true`) or cooked (`false`) mode, then
    /// discard any input typed but not yet read.
    ///
    /// # Errors
    ///
    /// Returns [`TerminalError::NotAttached`] if the terminal's modes cannot
    /// be queried, and [`TerminalError::Native`] if setting a mode or
    /// flushing input fails.
    pub fn set_raw_mode(&self, raw: bool) -> TerminalResult<()> {
        self.apply(TerminalMode::from_raw(raw), true)
    }

    /// Enter raw mode until the returned guard is dropped.
    ///
    /// # Errors
    ///
    /// As for [`set_raw_mode`](Self::set_raw_mode).
    pub fn enable_raw_mode(&self) -> TerminalResult<RawModeGuard<'_, B>> {
        self.set_raw_mode(true)?;
        Ok(RawModeGuard { driver: self })
    }

    /// Write the original modes back verbatim.
    ///
    /// Does nothing if no transition ever succeeded.
    ///
    /// # Errors
    ///
    /// Returns [`TerminalError::Native`] if either side cannot be set.
    pub fn restore(&self) -> TerminalResult<()> {
        let original = self.lock_original();
        self.write_back(*original)
    }

    fn lock_original(&self) -> MutexGuard<'_, Option<Snapshot<B>>> {
        self.original.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_back(&self, snapshot: Option<Snapshot<B>>) -> TerminalResult<()> {
        let Some(snapshot) = snapshot else {
            return Ok(());
        };
        self.terminal_in.set_mode(snapshot.input)?;
        self.terminal_out.set_mode(snapshot.output)?;
        self.mode.set(TerminalMode::Cooked);
        tracing::debug!("terminal modes restored");
        Ok(())
    }

    fn apply(&self, mode: TerminalMode, flush: bool) -> TerminalResult<()> {
        let mut original = self.lock_original();

        let (Some(input), Some(output)) = (self.terminal_in.mode(), self.terminal_out.mode())
        else {
            return Err(TerminalError::NotAttached);
        };
        let snapshot = *original.get_or_insert(ModeSnapshot { input, output });

        self.terminal_in
            .set_mode(B::INPUT_PROFILE.target(snapshot.input, mode))?;
        if let Err(err) = self
            .terminal_out
            .set_mode(B::OUTPUT_PROFILE.target(snapshot.output, mode))
        {
            // Keep the input side consistent with `self.mode`.
            if let Err(rollback) = self.terminal_in.set_mode(input) {
                tracing::warn!(error = %rollback, "could not roll back input mode");
            }
            return Err(err);
        }
        self.mode.set(mode);
        tracing::debug!(?mode, "terminal mode changed");

        if flush {
            self.terminal_in.flush_input()?;
        }
        Ok(())
    }

    // ── Signals ──────────────────────────────────────────────────────

    /// Raise `signal` against the current process group.
    ///
    /// Kinds the platform has no equivalent for do nothing.
    ///
    /// # Errors
    ///
    /// Returns [`TerminalError::Native`] if dispatching fails.
    pub fn generate_signal(&self, signal: TerminalSignal) -> TerminalResult<()> {
        tracing::debug!(%signal, "generating signal");
        self.backend
            .generate_signal(signal)
            .map_err(|err| TerminalError::native("raise", signal.name(), err))
    }

    /// Raise the signal whose [`TerminalSignal::ALL`] index is `value`.
    ///
    /// # Errors
    ///
    /// Returns [`TerminalError::InvalidSignal`] if `value` is out of range,
    /// otherwise as for [`generate_signal`](Self::generate_signal).
    pub fn generate_signal_raw(&self, value: i32) -> TerminalResult<()> {
        self.generate_signal(TerminalSignal::try_from(value)?)
    }
}

// ─── RawModeGuard ────────────────────────────────────────────────────────────

/// Keeps the terminal in raw mode; returns it to cooked mode on drop.
#[derive(Debug)]
#[must_use = "raw mode ends when the guard is dropped"]
pub struct RawModeGuard<'a, B: Backend> {
    driver: &'a Driver<B>,
}

impl<B: Backend> Drop for RawModeGuard<'_, B> {
    fn drop(&mut self) {
        if let Err(err) = self.driver.set_raw_mode(false) {
            tracing::warn!(%err, "could not leave raw mode");
        }
    }
}

// ─── System driver ───────────────────────────────────────────────────────────

/// The driver for the platform this crate was compiled for.
pub type SystemDriver = Driver<SystemBackend>;

static SYSTEM: OnceLock<SystemDriver> = OnceLock::new();
static PANIC_HOOK_INSTALLED: Once = Once::new();

impl Driver<SystemBackend> {
    /// A driver over the real console/tty.
    #[must_use]
    pub fn new(config: &DriverConfig) -> Self {
        #[cfg(unix)]
        let backend = SystemBackend::new(config.terminal_device.clone());
        #[cfg(windows)]
        let backend = SystemBackend::default();
        Self::with_backend(backend, config)
    }

    /// The process-wide driver, created on first use from
    /// [`DriverConfig::from_env`].
    pub fn system() -> &'static Self {
        SYSTEM.get_or_init(|| Self::new(&DriverConfig::from_env()))
    }

    /// The process-wide driver, created from `config` unless it already
    /// exists.
    pub fn install(config: &DriverConfig) -> &'static Self {
        SYSTEM.get_or_init(|| Self::new(config))
    }

    /// Restore the original terminal modes before any panic message is
    /// printed. Installed at most once per process.
    pub fn install_panic_hook() {
        PANIC_HOOK_INSTALLED.call_once(|| {
            let previous = std::panic::take_hook();
            std::panic::set_hook(Box::new(move |info| {
                if let Some(driver) = SYSTEM.get() {
                    driver.emergency_restore();
                }
                previous(info);
            }));
        });
    }

    fn emergency_restore(&self) {
        let snapshot = match self.original.try_lock() {
            Ok(guard) => *guard,
            Err(TryLockError::Poisoned(poisoned)) => *poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return,
        };
        let _ = self.write_back(snapshot);
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::ModeProfile;
    use crate::testing::{ScriptedBackend, ScriptedMode, Slot};
    use pretty_assertions::assert_eq;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};
    use test_case::test_case;

    const INPUT: ModeProfile<ScriptedMode> = ScriptedBackend::INPUT_PROFILE;
    const OUTPUT: ModeProfile<ScriptedMode> = ScriptedBackend::OUTPUT_PROFILE;

    fn config() -> DriverConfig {
        DriverConfig::default().with_resize_interval(Duration::from_millis(5))
    }

    fn driver(backend: ScriptedBackend) -> Driver<ScriptedBackend> {
        Driver::with_backend(backend, &config())
    }

    // ── Construction ────────────────────────────────────────────────

    #[test]
    fn streams_are_probed_and_paired() {
        let driver = driver(ScriptedBackend::interactive());

        assert_eq!(driver.standard_in().name(), "standard input");
        assert_eq!(driver.terminal_out().name(), "terminal output");
        assert!(driver.terminal_in().is_interactive());
        assert!(driver.standard_in().lock().is_shared_with(driver.terminal_in().lock()));
        assert!(driver.standard_out().lock().is_shared_with(driver.terminal_out().lock()));
        assert!(!driver.standard_error().lock().is_shared_with(driver.standard_out().lock()));
    }

    #[test]
    fn construction_normalises_without_flushing() {
        let driver = driver(ScriptedBackend::interactive());

        assert_eq!(driver.mode(), TerminalMode::Cooked);
        assert_eq!(driver.backend().mode_writes(), 2);
        assert_eq!(driver.backend().flushes(), 0);
        assert_eq!(
            driver.original_modes(),
            Some(ModeSnapshot {
                input: ScriptedMode::COOKED_INPUT,
                output: ScriptedMode::COOKED_OUTPUT,
            })
        );
    }

    #[test]
    fn construction_tolerates_missing_terminal() {
        let driver = driver(ScriptedBackend::detached());

        assert_eq!(driver.mode(), TerminalMode::Cooked);
        assert_eq!(driver.original_modes(), None);
        assert!(!driver.terminal_in().is_valid());
        assert!(driver.standard_in().is_redirected());
    }

    // ── Raw mode ────────────────────────────────────────────────────

    #[test]
    fn raw_mode_clears_cooked_bits_and_flushes() {
        let driver = driver(ScriptedBackend::interactive());
        driver.set_raw_mode(true).unwrap();

        let input = driver.backend().input_mode_bits();
        assert!(!input.intersects(ScriptedMode::ECHO | ScriptedMode::LINE | ScriptedMode::SIGNALS));
        assert!(input.contains(ScriptedMode::VT));
        assert!(!driver.backend().output_mode_bits().contains(ScriptedMode::NEWLINE_RETURN));
        assert_eq!(driver.mode(), TerminalMode::Raw);
        assert_eq!(driver.backend().flushes(), 1);
    }

    #[test]
    fn raw_mode_discards_typed_input() {
        let backend = ScriptedBackend::interactive();
        backend.push_text(Slot::TermIn, "stale");
        let driver = driver(backend);

        driver.set_raw_mode(true).unwrap();
        assert_eq!(driver.backend().remaining(Slot::TermIn), 0);
    }

    #[test_case(1 ; "once")]
    #[test_case(2 ; "twice")]
    #[test_case(7 ; "many times")]
    fn raw_then_cooked_restores_original(toggles: usize) {
        let driver = driver(ScriptedBackend::interactive());
        let original = driver.original_modes().unwrap();

        for _ in 0..toggles {
            driver.set_raw_mode(true).unwrap();
        }
        driver.set_raw_mode(false).unwrap();

        assert_eq!(driver.backend().input_mode_bits(), original.input);
        assert_eq!(driver.backend().output_mode_bits(), original.output);
    }

    #[test]
    fn targets_come_from_snapshot_not_current_mode() {
        let driver = driver(ScriptedBackend::interactive());
        let original = driver.original_modes().unwrap();

        driver.set_raw_mode(true).unwrap();
        driver.backend().set_input_mode_bits(ScriptedMode::MOUSE | ScriptedMode::WRAP);
        driver.set_raw_mode(true).unwrap();

        assert_eq!(
            driver.backend().input_mode_bits(),
            INPUT.target(original.input, TerminalMode::Raw)
        );
    }

    #[test]
    fn snapshot_is_never_overwritten() {
        let backend = ScriptedBackend::interactive();
        backend.set_input_mode_bits(ScriptedMode::ECHO | ScriptedMode::MOUSE);
        let driver = driver(backend);

        let expected = ModeSnapshot {
            input: ScriptedMode::ECHO | ScriptedMode::MOUSE,
            output: ScriptedMode::COOKED_OUTPUT,
        };
        assert_eq!(driver.original_modes(), Some(expected));

        driver.set_raw_mode(true).unwrap();
        driver.set_raw_mode(false).unwrap();
        assert_eq!(driver.original_modes(), Some(expected));
        assert_eq!(
            driver.backend().input_mode_bits(),
            INPUT.target(expected.input, TerminalMode::Cooked)
        );
        assert_eq!(
            driver.backend().output_mode_bits(),
            OUTPUT.target(expected.output, TerminalMode::Cooked)
        );
    }

    #[test]
    fn restore_writes_snapshot_verbatim() {
        let backend = ScriptedBackend::interactive();
        backend.set_input_mode_bits(ScriptedMode::ECHO | ScriptedMode::MOUSE);
        let driver = driver(backend);

        driver.set_raw_mode(true).unwrap();
        driver.restore().unwrap();

        assert_eq!(driver.backend().input_mode_bits(), ScriptedMode::ECHO | ScriptedMode::MOUSE);
        assert_eq!(driver.mode(), TerminalMode::Cooked);
    }

    #[test]
    fn restore_without_snapshot_is_noop() {
        let driver = driver(ScriptedBackend::detached());
        driver.restore().unwrap();
        assert_eq!(driver.backend().mode_writes(), 0);
    }

    #[test]
    fn raw_mode_without_terminal_is_not_attached() {
        let driver = driver(ScriptedBackend::detached());
        let err = driver.set_raw_mode(true).unwrap_err();
        assert!(matches!(err, TerminalError::NotAttached));
        assert_eq!(driver.mode(), TerminalMode::Cooked);
    }

    #[test]
    fn mode_write_failure_keeps_state() {
        let driver = driver(ScriptedBackend::interactive());
        driver.backend().fail_mode_writes(true);

        let err = driver.set_raw_mode(true).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
        assert!(err.to_string().contains("terminal input"));
        assert_eq!(driver.mode(), TerminalMode::Cooked);
    }

    #[test]
    fn output_mode_failure_rolls_back_input() {
        let driver = driver(ScriptedBackend::interactive());
        let cooked_input = driver.backend().input_mode_bits();
        driver.backend().fail_output_mode_writes(true);

        let err = driver.set_raw_mode(true).unwrap_err();
        assert!(matches!(err, TerminalError::Native { stream: "terminal output", .. }));
        assert_eq!(driver.mode(), TerminalMode::Cooked);
        assert_eq!(driver.backend().input_mode_bits(), cooked_input);

        driver.backend().fail_output_mode_writes(false);
        driver.set_raw_mode(true).unwrap();
        assert_eq!(driver.mode(), TerminalMode::Raw);
    }

    #[test]
    fn flush_failure_is_an_error() {
        let driver = driver(ScriptedBackend::interactive());
        driver.backend().fail_flush(true);

        let err = driver.set_raw_mode(true).unwrap_err();
        assert!(matches!(err, TerminalError::Native { stream: "terminal input", .. }));
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn guard_returns_to_cooked() {
        let driver = driver(ScriptedBackend::interactive());
        {
            let _raw = driver.enable_raw_mode().unwrap();
            assert_eq!(driver.mode(), TerminalMode::Raw);
        }
        assert_eq!(driver.mode(), TerminalMode::Cooked);
        assert_eq!(driver.backend().input_mode_bits(), ScriptedMode::COOKED_INPUT);
    }

    #[test]
    fn readers_follow_raw_state() {
        let backend = ScriptedBackend::interactive();
        let driver = driver(backend);
        driver.set_raw_mode(true).unwrap();
        driver.backend().push_units(Slot::TermIn, &[0x1A]);

        let mut buf = [0u8; 4];
        assert_eq!(driver.terminal_in().read_into(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], 0x1A);
    }

    #[test]
    fn toggling_while_a_read_holds_the_stream_lock() {
        let driver = driver(ScriptedBackend::interactive());
        let _held = driver.terminal_in().lock().acquire();
        driver.set_raw_mode(true).unwrap();
        driver.set_raw_mode(false).unwrap();
    }

    // ── Size ────────────────────────────────────────────────────────

    #[test]
    fn size_prefers_terminal_output() {
        let backend = ScriptedBackend::interactive();
        backend.set_size(Slot::TermOut, Some(Size::new(132, 43)));
        let driver = driver(backend);
        assert_eq!(driver.size(), Some(Size::new(132, 43)));
    }

    #[test]
    fn size_falls_back_through_outputs() {
        let backend = ScriptedBackend::interactive();
        backend.set_valid(Slot::TermOut, false);
        backend.set_size(Slot::StdOut, None);
        backend.set_size(Slot::StdErr, Some(Size::new(100, 50)));
        let driver = driver(backend);
        assert_eq!(driver.size(), Some(Size::new(100, 50)));
    }

    #[test]
    fn size_without_terminal_is_none() {
        let driver = driver(ScriptedBackend::detached());
        assert_eq!(driver.size(), None);
    }

    // ── Resize ──────────────────────────────────────────────────────

    #[test]
    fn resize_reaches_subscribers() {
        let driver = driver(ScriptedBackend::interactive());
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let _sub = driver.on_resize(move |size| {
            assert_eq!(size, Size::new(100, 30));
            seen.fetch_add(1, Ordering::SeqCst);
        });

        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(count.load(Ordering::SeqCst), 0);

        driver.backend().resize(Size::new(100, 30));
        let deadline = Instant::now() + Duration::from_secs(2);
        while count.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    // ── Signals ─────────────────────────────────────────────────────

    #[test]
    fn signals_reach_the_backend() {
        let driver = driver(ScriptedBackend::interactive());
        driver.generate_signal(TerminalSignal::Interrupt).unwrap();
        driver.generate_signal_raw(3).unwrap();
        assert_eq!(
            driver.backend().signals(),
            vec![TerminalSignal::Interrupt, TerminalSignal::Terminate]
        );
    }

    // ── System driver ───────────────────────────────────────────────

    #[cfg(unix)]
    fn detached_system_config() -> DriverConfig {
        DriverConfig {
            terminal_device: "/nonexistent/termio-test-tty".into(),
            ..config()
        }
    }

    #[cfg(unix)]
    #[test]
    #[serial_test::serial(system_driver)]
    fn install_is_idempotent() {
        let first = SystemDriver::install(&detached_system_config());
        let second = SystemDriver::install(&DriverConfig::default());
        assert!(std::ptr::eq(first, second));
        assert!(std::ptr::eq(first, SystemDriver::system()));
    }

    #[cfg(unix)]
    #[test]
    #[serial_test::serial(system_driver)]
    fn system_driver_without_device_has_invalid_terminal_streams() {
        let driver = SystemDriver::install(&detached_system_config());
        assert!(!driver.terminal_in().is_valid());
        assert!(!driver.terminal_out().is_valid());
        assert_eq!(driver.original_modes(), None);
        assert!(matches!(driver.set_raw_mode(true), Err(TerminalError::NotAttached)));
    }

    #[test]
    fn out_of_range_signal_is_rejected() {
        let driver = driver(ScriptedBackend::interactive());
        let err = driver.generate_signal_raw(42).unwrap_err();
        assert!(matches!(err, TerminalError::InvalidSignal(_)));
        assert!(driver.backend().signals().is_empty());
    }
}
