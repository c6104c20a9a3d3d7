// SPDX-License-Identifier: MIT
//
// In-memory backend for tests.
//
// `ScriptedBackend` models one console with five stream slots. Each slot has
// a queue of scripted read steps (wide units, byte chunks, transient aborts,
// hard failures), a capture of everything written to it, and its own
// validity/interactivity/size. Mode bits are device-wide, like a real
// console. An exhausted read script reads as end-of-input instead of
// blocking.

use std::collections::VecDeque;
use std::io;
use std::sync::{Mutex, MutexGuard, PoisonError};

use bitflags::bitflags;

use crate::backend::{
    Backend, InputEncoding, ResizeSource, StandardHandles, TerminalHandles, Transfer,
};
use crate::mode::ModeProfile;
use crate::signal::TerminalSignal;
use crate::size::Size;

bitflags! {
    /// Mode bits understood by [`ScriptedBackend`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ScriptedMode: u32 {
        const ECHO           = 1 << 0;
        const LINE           = 1 << 1;
        const SIGNALS        = 1 << 2;
        const MOUSE          = 1 << 3;
        const VT             = 1 << 4;
        const WRAP           = 1 << 5;
        const NEWLINE_RETURN = 1 << 6;
    }
}

impl ScriptedMode {
    /// Input mode a freshly attached console reports.
    pub const COOKED_INPUT: Self = Self::ECHO
        .union(Self::LINE)
        .union(Self::SIGNALS)
        .union(Self::VT);

    /// Output mode a freshly attached console reports.
    pub const COOKED_OUTPUT: Self = Self::WRAP.union(Self::VT).union(Self::NEWLINE_RETURN);
}

/// One of the five streams the driver opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// Standard input.
    StdIn,
    /// Standard output.
    StdOut,
    /// Standard error.
    StdErr,
    /// Terminal device input.
    TermIn,
    /// Terminal device output.
    TermOut,
}

impl Slot {
    const ALL: [Self; 5] = [
        Self::StdIn,
        Self::StdOut,
        Self::StdErr,
        Self::TermIn,
        Self::TermOut,
    ];

    /// This slot as a backend handle.
    #[must_use]
    pub const fn handle(self) -> Self {
        self
    }

    const fn index(self) -> usize {
        self as usize
    }

    const fn is_output(self) -> bool {
        matches!(self, Self::StdOut | Self::StdErr | Self::TermOut)
    }
}

/// One scripted outcome of a native read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// A wide console unit (consumed by unit reads).
    Unit(u16),
    /// A chunk of bytes (consumed by byte reads, possibly over several calls).
    Bytes(Vec<u8>),
    /// "Operation aborted": nothing read, try again.
    Aborted,
    /// The call fails without reading anything.
    Fail(io::ErrorKind),
    /// The call reads these bytes and still reports a failure.
    PartialFail(Vec<u8>, io::ErrorKind),
}

#[derive(Debug)]
struct SlotState {
    valid: bool,
    interactive: bool,
    script: VecDeque<Step>,
    written: Vec<u8>,
    size: Option<Size>,
    write_error: Option<io::ErrorKind>,
}

impl SlotState {
    fn new(slot: Slot) -> Self {
        Self {
            valid: true,
            interactive: true,
            script: VecDeque::new(),
            written: Vec::new(),
            size: slot.is_output().then_some(Size::new(80, 24)),
            write_error: None,
        }
    }
}

#[derive(Debug)]
struct State {
    slots: Vec<SlotState>,
    encoding: InputEncoding,
    input_mode: ScriptedMode,
    output_mode: ScriptedMode,
    mode_writes: usize,
    fail_mode_writes: bool,
    fail_output_mode_writes: bool,
    flushes: usize,
    fail_flush: bool,
    signals: Vec<TerminalSignal>,
}

/// Scriptable in-memory console.
#[derive(Debug)]
pub struct ScriptedBackend {
    state: Mutex<State>,
}

fn transient() -> io::Error {
    io::Error::new(io::ErrorKind::Interrupted, "operation aborted")
}

impl ScriptedBackend {
    /// A console where every stream is attached and interactive, input is
    /// delivered as UTF-16 units, and the size is 80×24.
    #[must_use]
    pub fn interactive() -> Self {
        Self {
            state: Mutex::new(State {
                slots: Slot::ALL.iter().map(|&s| SlotState::new(s)).collect(),
                encoding: InputEncoding::Utf16Units,
                input_mode: ScriptedMode::COOKED_INPUT,
                output_mode: ScriptedMode::COOKED_OUTPUT,
                mode_writes: 0,
                fail_mode_writes: false,
                fail_output_mode_writes: false,
                flushes: 0,
                fail_flush: false,
                signals: Vec::new(),
            }),
        }
    }

    /// A process with no console: standard streams redirected, terminal
    /// device handles invalid.
    #[must_use]
    pub fn detached() -> Self {
        let backend = Self::interactive();
        for slot in [Slot::StdIn, Slot::StdOut, Slot::StdErr] {
            backend.set_interactive(slot, false);
            backend.set_size(slot, None);
        }
        for slot in [Slot::TermIn, Slot::TermOut] {
            backend.set_valid(slot, false);
            backend.set_interactive(slot, false);
            backend.set_size(slot, None);
        }
        backend
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark `slot` valid or invalid.
    pub fn set_valid(&self, slot: Slot, valid: bool) {
        self.lock().slots[slot.index()].valid = valid;
    }

    /// Mark `slot` interactive or redirected.
    pub fn set_interactive(&self, slot: Slot, interactive: bool) {
        self.lock().slots[slot.index()].interactive = interactive;
    }

    /// Set the window size reported through `slot`.
    pub fn set_size(&self, slot: Slot, size: Option<Size>) {
        self.lock().slots[slot.index()].size = size;
    }

    /// Set the window size reported through every output slot.
    pub fn resize(&self, size: Size) {
        let mut state = self.lock();
        for slot in [Slot::StdOut, Slot::StdErr, Slot::TermOut] {
            let entry = &mut state.slots[slot.index()];
            if entry.size.is_some() {
                entry.size = Some(size);
            }
        }
    }

    /// Choose how interactive input is delivered.
    pub fn set_encoding(&self, encoding: InputEncoding) {
        self.lock().encoding = encoding;
    }

    /// Append read steps to `slot`'s script.
    pub fn push(&self, slot: Slot, steps: impl IntoIterator<Item = Step>) {
        self.lock().slots[slot.index()].script.extend(steps);
    }

    /// Append wide units to `slot`'s script.
    pub fn push_units(&self, slot: Slot, units: &[u16]) {
        self.push(slot, units.iter().copied().map(Step::Unit));
    }

    /// Append `text` as UTF-16 units to `slot`'s script.
    pub fn push_text(&self, slot: Slot, text: &str) {
        self.push(slot, text.encode_utf16().map(Step::Unit));
    }

    /// Append a byte chunk to `slot`'s script.
    pub fn push_bytes(&self, slot: Slot, bytes: &[u8]) {
        self.push(slot, [Step::Bytes(bytes.to_vec())]);
    }

    /// Make writes to `slot` fail with `kind` (or succeed again with `None`).
    pub fn fail_writes(&self, slot: Slot, kind: Option<io::ErrorKind>) {
        self.lock().slots[slot.index()].write_error = kind;
    }

    /// Make mode writes fail.
    pub fn fail_mode_writes(&self, fail: bool) {
        self.lock().fail_mode_writes = fail;
    }

    /// Make output mode writes fail while input mode writes still succeed.
    pub fn fail_output_mode_writes(&self, fail: bool) {
        self.lock().fail_output_mode_writes = fail;
    }

    /// Make input flushes fail.
    pub fn fail_flush(&self, fail: bool) {
        self.lock().fail_flush = fail;
    }

    /// Force the device-wide input mode.
    pub fn set_input_mode_bits(&self, mode: ScriptedMode) {
        self.lock().input_mode = mode;
    }

    /// Everything written to `slot` so far.
    #[must_use]
    pub fn written(&self, slot: Slot) -> Vec<u8> {
        self.lock().slots[slot.index()].written.clone()
    }

    /// Steps not yet consumed from `slot`'s script.
    #[must_use]
    pub fn remaining(&self, slot: Slot) -> usize {
        self.lock().slots[slot.index()].script.len()
    }

    /// Current device input mode.
    #[must_use]
    pub fn input_mode_bits(&self) -> ScriptedMode {
        self.lock().input_mode
    }

    /// Current device output mode.
    #[must_use]
    pub fn output_mode_bits(&self) -> ScriptedMode {
        self.lock().output_mode
    }

    /// Number of successful mode writes.
    #[must_use]
    pub fn mode_writes(&self) -> usize {
        self.lock().mode_writes
    }

    /// Number of successful input flushes.
    #[must_use]
    pub fn flushes(&self) -> usize {
        self.lock().flushes
    }

    /// Signals raised so far, in order.
    #[must_use]
    pub fn signals(&self) -> Vec<TerminalSignal> {
        self.lock().signals.clone()
    }

    fn mode_of(&self, slot: Slot, output: bool) -> Option<ScriptedMode> {
        let state = self.lock();
        let entry = &state.slots[slot.index()];
        (entry.valid && entry.interactive).then_some(if output {
            state.output_mode
        } else {
            state.input_mode
        })
    }

    fn write_mode(&self, slot: Slot, mode: ScriptedMode, output: bool) -> io::Result<()> {
        let mut state = self.lock();
        let entry = &state.slots[slot.index()];
        if !entry.valid || !entry.interactive {
            return Err(io::Error::from(io::ErrorKind::Unsupported));
        }
        if state.fail_mode_writes || (output && state.fail_output_mode_writes) {
            return Err(io::Error::from(io::ErrorKind::PermissionDenied));
        }
        if output {
            state.output_mode = mode;
        } else {
            state.input_mode = mode;
        }
        state.mode_writes += 1;
        Ok(())
    }
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::interactive()
    }
}

impl Backend for ScriptedBackend {
    type Handle = Slot;
    type InputMode = ScriptedMode;
    type OutputMode = ScriptedMode;

    const INPUT_PROFILE: ModeProfile<ScriptedMode> = ModeProfile {
        clear: ScriptedMode::MOUSE,
        set: ScriptedMode::VT,
        cooked: ScriptedMode::ECHO
            .union(ScriptedMode::LINE)
            .union(ScriptedMode::SIGNALS),
    };

    const OUTPUT_PROFILE: ModeProfile<ScriptedMode> = ModeProfile {
        clear: ScriptedMode::empty(),
        set: ScriptedMode::WRAP.union(ScriptedMode::VT),
        cooked: ScriptedMode::NEWLINE_RETURN,
    };

    fn name(&self) -> &'static str {
        "scripted"
    }

    fn standard_handles(&self) -> StandardHandles<Slot> {
        StandardHandles {
            input: Slot::StdIn,
            output: Slot::StdOut,
            error: Slot::StdErr,
        }
    }

    fn terminal_handles(&self) -> TerminalHandles<Slot> {
        TerminalHandles {
            input: Slot::TermIn,
            output: Slot::TermOut,
        }
    }

    fn is_handle_valid(&self, handle: &Slot, _write: bool) -> bool {
        self.lock().slots[handle.index()].valid
    }

    fn is_handle_interactive(&self, handle: &Slot) -> bool {
        self.lock().slots[handle.index()].interactive
    }

    fn input_encoding(&self) -> InputEncoding {
        self.lock().encoding
    }

    fn resize_source(&self) -> ResizeSource {
        ResizeSource::Poll
    }

    fn read_bytes(&self, handle: &Slot, buf: &mut [u8]) -> Transfer {
        let mut state = self.lock();
        let script = &mut state.slots[handle.index()].script;
        match script.pop_front() {
            None => Transfer::ok(0),
            Some(Step::Bytes(bytes)) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                if n < bytes.len() {
                    script.push_front(Step::Bytes(bytes[n..].to_vec()));
                }
                Transfer::ok(n)
            }
            Some(Step::PartialFail(bytes, kind)) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                Transfer {
                    count: n,
                    error: Some(io::Error::from(kind)),
                }
            }
            Some(Step::Aborted) => Transfer::failed(transient()),
            Some(Step::Fail(kind)) => Transfer::failed(io::Error::from(kind)),
            Some(step @ Step::Unit(_)) => {
                script.push_front(step);
                Transfer::failed(io::Error::from(io::ErrorKind::InvalidData))
            }
        }
    }

    fn read_units(&self, handle: &Slot, units: &mut [u16]) -> Transfer {
        let mut state = self.lock();
        let script = &mut state.slots[handle.index()].script;
        match script.pop_front() {
            None => Transfer::ok(0),
            Some(Step::Unit(unit)) => match units.first_mut() {
                Some(first) => {
                    *first = unit;
                    Transfer::ok(1)
                }
                None => {
                    script.push_front(Step::Unit(unit));
                    Transfer::ok(0)
                }
            },
            Some(Step::Aborted) => Transfer::failed(transient()),
            Some(Step::Fail(kind) | Step::PartialFail(_, kind)) => {
                Transfer::failed(io::Error::from(kind))
            }
            Some(step @ Step::Bytes(_)) => {
                script.push_front(step);
                Transfer::failed(io::Error::from(io::ErrorKind::InvalidData))
            }
        }
    }

    fn write_bytes(&self, handle: &Slot, buf: &[u8]) -> Transfer {
        let mut state = self.lock();
        let entry = &mut state.slots[handle.index()];
        if let Some(kind) = entry.write_error {
            return Transfer::failed(io::Error::from(kind));
        }
        entry.written.extend_from_slice(buf);
        Transfer::ok(buf.len())
    }

    fn is_transient(&self, err: &io::Error) -> bool {
        err.kind() == io::ErrorKind::Interrupted
    }

    fn input_mode(&self, handle: &Slot) -> Option<ScriptedMode> {
        self.mode_of(*handle, false)
    }

    fn set_input_mode(&self, handle: &Slot, mode: ScriptedMode) -> io::Result<()> {
        self.write_mode(*handle, mode, false)
    }

    fn output_mode(&self, handle: &Slot) -> Option<ScriptedMode> {
        self.mode_of(*handle, true)
    }

    fn set_output_mode(&self, handle: &Slot, mode: ScriptedMode) -> io::Result<()> {
        self.write_mode(*handle, mode, true)
    }

    fn flush_input(&self, handle: &Slot) -> io::Result<()> {
        let mut state = self.lock();
        if state.fail_flush {
            return Err(io::Error::from(io::ErrorKind::BrokenPipe));
        }
        state.slots[handle.index()]
            .script
            .retain(|step| !matches!(step, Step::Unit(_) | Step::Bytes(_)));
        state.flushes += 1;
        Ok(())
    }

    fn size(&self, handle: &Slot) -> Option<Size> {
        let state = self.lock();
        let entry = &state.slots[handle.index()];
        if entry.valid { entry.size } else { None }
    }

    fn generate_signal(&self, signal: TerminalSignal) -> io::Result<()> {
        self.lock().signals.push(signal);
        Ok(())
    }
}
