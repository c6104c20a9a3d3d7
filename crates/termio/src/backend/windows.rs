// SPDX-License-Identifier: MIT
//
// Windows console backend — console modes, ReadConsoleW, control events.
//
// Safety: this module necessarily uses `unsafe` for Win32 console calls.
// Each unsafe block wraps exactly one call.
#![allow(unsafe_code)]
//
// The console host mangles non-ASCII input read through ReadFile, so
// interactive input is read as UTF-16 through ReadConsoleW and transcoded
// by the reader; redirected input stays on ReadFile. The input code page is
// pinned to UTF-16 and the output code page to UTF-8 at startup so the byte
// contract never depends on the user's code page.
//
// GUI-subsystem processes get standard handles that look valid but are not
// usable, hence the zero-length write probe for output handles.

use std::io;
use std::ptr;

use bitflags::bitflags;
use windows_sys::Win32::Foundation::{
    CloseHandle, ERROR_OPERATION_ABORTED, GENERIC_READ, GENERIC_WRITE, HANDLE,
    INVALID_HANDLE_VALUE, SetLastError,
};
use windows_sys::Win32::Storage::FileSystem::{
    CreateFileW, FILE_SHARE_READ, FILE_SHARE_WRITE, FILE_TYPE_CHAR, GetFileType, OPEN_EXISTING,
    ReadFile, WriteFile,
};
use windows_sys::Win32::System::Console::{
    CONSOLE_SCREEN_BUFFER_INFO, CTRL_BREAK_EVENT, CTRL_C_EVENT, CTRL_CLOSE_EVENT,
    CTRL_SHUTDOWN_EVENT, FlushConsoleInputBuffer, GenerateConsoleCtrlEvent, GetConsoleMode,
    GetConsoleScreenBufferInfo, GetStdHandle, ReadConsoleW, STD_ERROR_HANDLE, STD_INPUT_HANDLE,
    STD_OUTPUT_HANDLE, SetConsoleCP, SetConsoleMode, SetConsoleOutputCP,
};

use super::{Backend, InputEncoding, ResizeSource, StandardHandles, TerminalHandles, Transfer};
use crate::mode::ModeProfile;
use crate::signal::TerminalSignal;
use crate::size::Size;

/// UTF-16LE code page.
const CP_UTF16: u32 = 1200;
/// UTF-8 code page.
const CP_UTF8: u32 = 65001;

// ─── Mode flags ──────────────────────────────────────────────────────────────

bitflags! {
    /// Console input mode bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ConsoleInputMode: u32 {
        const PROCESSED_INPUT        = 0x0001;
        const LINE_INPUT             = 0x0002;
        const ECHO_INPUT             = 0x0004;
        const WINDOW_INPUT           = 0x0008;
        const MOUSE_INPUT            = 0x0010;
        const INSERT_MODE            = 0x0020;
        const QUICK_EDIT_MODE        = 0x0040;
        const EXTENDED_FLAGS         = 0x0080;
        const VIRTUAL_TERMINAL_INPUT = 0x0200;
    }
}

bitflags! {
    /// Console output mode bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ConsoleOutputMode: u32 {
        const PROCESSED_OUTPUT            = 0x0001;
        const WRAP_AT_EOL_OUTPUT          = 0x0002;
        const VIRTUAL_TERMINAL_PROCESSING = 0x0004;
        const DISABLE_NEWLINE_AUTO_RETURN = 0x0008;
        const LVB_GRID_WORLDWIDE          = 0x0010;
    }
}

// ─── Handle ──────────────────────────────────────────────────────────────────

/// A Win32 handle as seen by the driver.
///
/// Stored as an integer so it can cross threads; standard handles are
/// borrowed, console device handles are closed on drop.
#[derive(Debug)]
pub struct WindowsHandle {
    raw: isize,
    owned: bool,
}

impl WindowsHandle {
    fn borrowed(handle: HANDLE) -> Self {
        Self {
            raw: handle as isize,
            owned: false,
        }
    }

    fn open(name: &str) -> Self {
        let wide: Vec<u16> = name.encode_utf16().chain(std::iter::once(0)).collect();
        let handle = unsafe {
            CreateFileW(
                wide.as_ptr(),
                GENERIC_READ | GENERIC_WRITE,
                FILE_SHARE_READ | FILE_SHARE_WRITE,
                ptr::null(),
                OPEN_EXISTING,
                0,
                ptr::null_mut(),
            )
        };
        if handle == INVALID_HANDLE_VALUE {
            tracing::debug!(device = name, err = %io::Error::last_os_error(), "no console device");
        }
        Self {
            raw: handle as isize,
            owned: true,
        }
    }

    fn as_raw(&self) -> HANDLE {
        self.raw as HANDLE
    }

    fn is_null_or_invalid(&self) -> bool {
        self.raw == 0 || self.as_raw() == INVALID_HANDLE_VALUE
    }
}

impl Drop for WindowsHandle {
    fn drop(&mut self) {
        if self.owned && !self.is_null_or_invalid() {
            unsafe {
                CloseHandle(self.as_raw());
            }
        }
    }
}

fn clamp_len(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

fn transfer_from(ok: bool, count: u32) -> Transfer {
    Transfer {
        count: count as usize,
        error: (!ok).then(io::Error::last_os_error),
    }
}

fn check(ok: i32) -> io::Result<()> {
    if ok == 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

// ─── WindowsBackend ──────────────────────────────────────────────────────────

/// Win32 console backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsBackend;

impl WindowsBackend {
    fn raw_mode(handle: &WindowsHandle) -> Option<u32> {
        let mut mode = 0u32;
        (unsafe { GetConsoleMode(handle.as_raw(), &raw mut mode) } != 0).then_some(mode)
    }
}

impl Backend for WindowsBackend {
    type Handle = WindowsHandle;
    type InputMode = ConsoleInputMode;
    type OutputMode = ConsoleOutputMode;

    const INPUT_PROFILE: ModeProfile<ConsoleInputMode> = ModeProfile {
        clear: ConsoleInputMode::WINDOW_INPUT
            .union(ConsoleInputMode::MOUSE_INPUT)
            .union(ConsoleInputMode::QUICK_EDIT_MODE),
        set: ConsoleInputMode::INSERT_MODE
            .union(ConsoleInputMode::EXTENDED_FLAGS)
            .union(ConsoleInputMode::VIRTUAL_TERMINAL_INPUT),
        cooked: ConsoleInputMode::PROCESSED_INPUT
            .union(ConsoleInputMode::LINE_INPUT)
            .union(ConsoleInputMode::ECHO_INPUT),
    };

    const OUTPUT_PROFILE: ModeProfile<ConsoleOutputMode> = ModeProfile {
        clear: ConsoleOutputMode::LVB_GRID_WORLDWIDE,
        set: ConsoleOutputMode::PROCESSED_OUTPUT
            .union(ConsoleOutputMode::WRAP_AT_EOL_OUTPUT)
            .union(ConsoleOutputMode::VIRTUAL_TERMINAL_PROCESSING),
        cooked: ConsoleOutputMode::DISABLE_NEWLINE_AUTO_RETURN,
    };

    fn name(&self) -> &'static str {
        "windows"
    }

    fn prepare(&self) {
        unsafe {
            SetConsoleCP(CP_UTF16);
            SetConsoleOutputCP(CP_UTF8);
        }
    }

    fn standard_handles(&self) -> StandardHandles<WindowsHandle> {
        unsafe {
            StandardHandles {
                input: WindowsHandle::borrowed(GetStdHandle(STD_INPUT_HANDLE)),
                output: WindowsHandle::borrowed(GetStdHandle(STD_OUTPUT_HANDLE)),
                error: WindowsHandle::borrowed(GetStdHandle(STD_ERROR_HANDLE)),
            }
        }
    }

    fn terminal_handles(&self) -> TerminalHandles<WindowsHandle> {
        TerminalHandles {
            input: WindowsHandle::open("CONIN$"),
            output: WindowsHandle::open("CONOUT$"),
        }
    }

    fn is_handle_valid(&self, handle: &WindowsHandle, write: bool) -> bool {
        if handle.is_null_or_invalid() {
            return false;
        }
        if write {
            let dummy = 0u8;
            let mut written = 0u32;
            return unsafe {
                WriteFile(
                    handle.as_raw(),
                    &raw const dummy,
                    0,
                    &raw mut written,
                    ptr::null_mut(),
                )
            } != 0;
        }
        true
    }

    fn is_handle_interactive(&self, handle: &WindowsHandle) -> bool {
        unsafe { GetFileType(handle.as_raw()) } == FILE_TYPE_CHAR
            && Self::raw_mode(handle).is_some()
    }

    fn input_encoding(&self) -> InputEncoding {
        InputEncoding::Utf16Units
    }

    fn resize_source(&self) -> ResizeSource {
        ResizeSource::Poll
    }

    fn read_bytes(&self, handle: &WindowsHandle, buf: &mut [u8]) -> Transfer {
        let mut read = 0u32;
        let ok = unsafe {
            ReadFile(
                handle.as_raw(),
                buf.as_mut_ptr(),
                clamp_len(buf.len()),
                &raw mut read,
                ptr::null_mut(),
            )
        } != 0;
        transfer_from(ok, read)
    }

    fn read_units(&self, handle: &WindowsHandle, units: &mut [u16]) -> Transfer {
        let mut read = 0u32;

        // ReadConsoleW reports success with zero characters and leaves
        // ERROR_OPERATION_ABORTED behind when Ctrl-C interrupts it; clear the
        // last error first so a stale code cannot masquerade as that case.
        unsafe { SetLastError(0) };
        let ok = unsafe {
            ReadConsoleW(
                handle.as_raw(),
                units.as_mut_ptr().cast(),
                clamp_len(units.len()),
                &raw mut read,
                ptr::null(),
            )
        } != 0;

        let err = io::Error::last_os_error();
        if ok && read == 0 && err.raw_os_error() == Some(ERROR_OPERATION_ABORTED as i32) {
            return Transfer::failed(err);
        }
        Transfer {
            count: read as usize,
            error: (!ok).then_some(err),
        }
    }

    fn write_bytes(&self, handle: &WindowsHandle, buf: &[u8]) -> Transfer {
        let mut written = 0u32;
        let ok = unsafe {
            WriteFile(
                handle.as_raw(),
                buf.as_ptr(),
                clamp_len(buf.len()),
                &raw mut written,
                ptr::null_mut(),
            )
        } != 0;
        transfer_from(ok, written)
    }

    #[allow(clippy::cast_possible_wrap)]
    fn is_transient(&self, err: &io::Error) -> bool {
        err.raw_os_error() == Some(ERROR_OPERATION_ABORTED as i32)
    }

    fn input_mode(&self, handle: &WindowsHandle) -> Option<ConsoleInputMode> {
        Self::raw_mode(handle).map(ConsoleInputMode::from_bits_retain)
    }

    fn set_input_mode(&self, handle: &WindowsHandle, mode: ConsoleInputMode) -> io::Result<()> {
        check(unsafe { SetConsoleMode(handle.as_raw(), mode.bits()) })
    }

    fn output_mode(&self, handle: &WindowsHandle) -> Option<ConsoleOutputMode> {
        Self::raw_mode(handle).map(ConsoleOutputMode::from_bits_retain)
    }

    fn set_output_mode(&self, handle: &WindowsHandle, mode: ConsoleOutputMode) -> io::Result<()> {
        check(unsafe { SetConsoleMode(handle.as_raw(), mode.bits()) })
    }

    fn flush_input(&self, handle: &WindowsHandle) -> io::Result<()> {
        check(unsafe { FlushConsoleInputBuffer(handle.as_raw()) })
    }

    fn size(&self, handle: &WindowsHandle) -> Option<Size> {
        let mut info: CONSOLE_SCREEN_BUFFER_INFO = unsafe { std::mem::zeroed() };
        if unsafe { GetConsoleScreenBufferInfo(handle.as_raw(), &raw mut info) } == 0 {
            return None;
        }
        let window = info.srWindow;
        let cols = u16::try_from(i32::from(window.Right) - i32::from(window.Left) + 1).ok()?;
        let rows = u16::try_from(i32::from(window.Bottom) - i32::from(window.Top) + 1).ok()?;
        Size::from_nonzero(cols, rows)
    }

    fn generate_signal(&self, signal: TerminalSignal) -> io::Result<()> {
        let event = match signal {
            TerminalSignal::Close => CTRL_CLOSE_EVENT,
            TerminalSignal::Interrupt => CTRL_C_EVENT,
            TerminalSignal::Quit => CTRL_BREAK_EVENT,
            TerminalSignal::Terminate => CTRL_SHUTDOWN_EVENT,
            // No job control on Windows.
            TerminalSignal::Suspend => return Ok(()),
        };
        check(unsafe { GenerateConsoleCtrlEvent(event, 0) })
    }
}
