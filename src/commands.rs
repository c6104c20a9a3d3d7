// SPDX-License-Identifier: MIT
//
// Subcommand implementations.
//
// Each command takes the driver it should act on, so the same code runs
// against the real console and against the scripted backend in tests.
// Output goes through the driver's writers rather than println! so a
// redirected or missing stream behaves the same way here as it would for
// any other termio consumer.

use std::io::{self, Write};
use std::sync::mpsc;
use std::time::Duration;

use miette::{IntoDiagnostic, Result};
use termio::{Backend, Driver, Reader, Size, TerminalSignal, Writer};

/// Bytes read per call in `keys` and `cat`.
const CHUNK: usize = 256;

// ─── info ────────────────────────────────────────────────────────────────────

pub fn info<B: Backend>(driver: &Driver<B>) -> Result<()> {
    let mut out: &Writer<B> = driver.standard_out();

    writeln!(out, "backend: {}", driver.backend().name()).into_diagnostic()?;
    writeln!(out, "mode:    {:?}", driver.mode()).into_diagnostic()?;
    let size = driver
        .size()
        .map_or_else(|| "unknown".to_owned(), |size| size.to_string());
    writeln!(out, "size:    {size}").into_diagnostic()?;
    writeln!(out).into_diagnostic()?;

    let streams = [
        describe_reader(driver.standard_in()),
        describe_writer(driver.standard_out()),
        describe_writer(driver.standard_error()),
        describe_reader(driver.terminal_in()),
        describe_writer(driver.terminal_out()),
    ];
    writeln!(out, "{:<16} {:<6} {:<12}", "stream", "valid", "attachment").into_diagnostic()?;
    for (name, valid, interactive) in streams {
        let attachment = if !valid {
            "none"
        } else if interactive {
            "interactive"
        } else {
            "redirected"
        };
        writeln!(out, "{name:<16} {:<6} {attachment:<12}", yes_no(valid)).into_diagnostic()?;
    }

    if let Some(original) = driver.original_modes() {
        writeln!(out).into_diagnostic()?;
        writeln!(out, "original input mode:  {:?}", original.input).into_diagnostic()?;
        writeln!(out, "original output mode: {:?}", original.output).into_diagnostic()?;
    }
    Ok(())
}

fn describe_reader<B: Backend>(reader: &Reader<B>) -> (&'static str, bool, bool) {
    (reader.name(), reader.is_valid(), reader.is_interactive())
}

fn describe_writer<B: Backend>(writer: &Writer<B>) -> (&'static str, bool, bool) {
    (writer.name(), writer.is_valid(), writer.is_interactive())
}

const fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

// ─── size ────────────────────────────────────────────────────────────────────

/// Print the size; returns whether it was known.
pub fn size<B: Backend>(driver: &Driver<B>) -> Result<bool> {
    let mut out: &Writer<B> = driver.standard_out();
    match driver.size() {
        Some(size) => {
            writeln!(out, "{size}").into_diagnostic()?;
            Ok(true)
        }
        None => {
            tracing::warn!("terminal size is unknown");
            Ok(false)
        }
    }
}

// ─── watch ───────────────────────────────────────────────────────────────────

/// Print size changes until `limit` elapses, or forever without one.
pub fn watch<B: Backend>(driver: &Driver<B>, limit: Option<Duration>) -> Result<()> {
    let mut out: &Writer<B> = driver.terminal_out();
    writeln!(out, "Listening for resize events.").into_diagnostic()?;
    if let Some(size) = driver.resize().last_size() {
        writeln!(out, "Initial size: {size}").into_diagnostic()?;
    }

    let (tx, rx) = mpsc::channel::<Size>();
    let _subscription = driver.on_resize(move |size| {
        let _ = tx.send(size);
    });

    let deadline = limit.map(|limit| std::time::Instant::now() + limit);
    loop {
        let received = match deadline {
            Some(deadline) => {
                let left = deadline.saturating_duration_since(std::time::Instant::now());
                if left.is_zero() {
                    return Ok(());
                }
                rx.recv_timeout(left).ok()
            }
            None => rx.recv().ok(),
        };
        if let Some(size) = received {
            writeln!(out, "Width = {}, Height = {}", size.cols, size.rows).into_diagnostic()?;
        }
    }
}

// ─── keys ────────────────────────────────────────────────────────────────────

/// Echo raw input as hex until `q`, Ctrl-C, or end of input.
pub fn keys<B: Backend>(driver: &Driver<B>) -> Result<()> {
    let _raw = driver.enable_raw_mode()?;
    echo_keys(driver.terminal_in(), driver.terminal_out())
}

fn echo_keys<B: Backend>(input: &Reader<B>, mut out: &Writer<B>) -> Result<()> {
    write!(out, "Press keys; q or Ctrl-C quits.\r\n").into_diagnostic()?;

    let mut buf = [0u8; CHUNK];
    loop {
        let n = input.read_into(&mut buf)?;
        if n == 0 {
            break;
        }
        let bytes = &buf[..n];
        write!(out, "{}\r\n", hex_line(bytes)).into_diagnostic()?;
        if bytes.iter().any(|&b| b == b'q' || b == 0x03) {
            break;
        }
    }
    Ok(())
}

fn hex_line(bytes: &[u8]) -> String {
    let hex: Vec<String> = bytes.iter().map(|b| format!("{b:02x}")).collect();
    let text: String = String::from_utf8_lossy(bytes)
        .chars()
        .map(|c| if c.is_control() { '.' } else { c })
        .collect();
    format!("{:<48} {text}", hex.join(" "))
}

// ─── cat ─────────────────────────────────────────────────────────────────────

/// Copy standard input to standard output; returns the byte count.
pub fn cat<B: Backend>(driver: &Driver<B>) -> Result<u64> {
    let mut input: &Reader<B> = driver.standard_in();
    let mut output: &Writer<B> = driver.standard_out();
    let copied = io::copy(&mut input, &mut output).into_diagnostic()?;
    tracing::debug!(bytes = copied, "copied standard input");
    Ok(copied)
}

// ─── signal ──────────────────────────────────────────────────────────────────

pub fn signal<B: Backend>(driver: &Driver<B>, signal: TerminalSignal) -> Result<()> {
    driver.generate_signal(signal)?;
    Ok(())
}

// ─── Tests ───────────────────────────────────────────────────────────────────
