// SPDX-License-Identifier: MIT
//
// Raw/cooked mode state and the mode-bit arithmetic behind it.
//
// A backend describes each side (input, output) of its console mode with a
// `ModeProfile`: bits that are always cleared, bits that are always set, and
// the "cooked-only" bits (echo, line buffering, signal generation, ...) that
// raw mode removes. Targets are always computed from the snapshot captured on
// the first successful toggle, never from whatever mode is current, so any
// sequence of toggles lands on the same two bitmasks.
//
// Edits use set difference rather than complement-and-mask: bitflags'
// complement drops unknown bits, and the OS may hand us bits we have no name
// for.

use std::fmt;
use std::ops::{BitAnd, BitOr, Sub};
use std::sync::atomic::{AtomicBool, Ordering};

/// Operations every mode bitmask type supports.
///
/// Implemented automatically for any `bitflags` type.
pub trait ModeBits:
    Copy
    + Eq
    + fmt::Debug
    + Send
    + Sync
    + 'static
    + BitOr<Output = Self>
    + BitAnd<Output = Self>
    + Sub<Output = Self>
{
}

impl<T> ModeBits for T where
    T: Copy
        + Eq
        + fmt::Debug
        + Send
        + Sync
        + 'static
        + BitOr<Output = T>
        + BitAnd<Output = T>
        + Sub<Output = T>
{
}

// ─── ModeProfile ─────────────────────────────────────────────────────────────

/// Fixed flag sets describing how one side of a console mode is programmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeProfile<M> {
    /// Bits removed in both raw and cooked mode.
    pub clear: M,
    /// Bits added in both raw and cooked mode.
    pub set: M,
    /// Bits present only in cooked mode.
    pub cooked: M,
}

impl<M: ModeBits> ModeProfile<M> {
    /// The bitmask to program for `mode`, derived from `original`.
    #[must_use]
    pub fn target(&self, original: M, mode: TerminalMode) -> M {
        let base = (original - self.clear) | self.set;
        match mode {
            TerminalMode::Raw => base - self.cooked,
            TerminalMode::Cooked => base | self.cooked,
        }
    }
}

// ─── TerminalMode ────────────────────────────────────────────────────────────

/// The driver's raw/cooked state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum TerminalMode {
    /// Line-buffered, echoing, signal-generating (initial state).
    #[default]
    Cooked,
    /// Byte-exact input with no echo, line editing, or control-key signals.
    Raw,
}

impl TerminalMode {
    /// `Raw` when `raw` is true, `Cooked` otherwise.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: bool) -> Self {
        if raw { Self::Raw } else { Self::Cooked }
    }

    /// Whether this is [`TerminalMode::Raw`].
    #[inline]
    #[must_use]
    pub const fn is_raw(self) -> bool {
        matches!(self, Self::Raw)
    }
}

/// Shared view of the current [`TerminalMode`].
///
/// Owned by the driver and handed to readers at construction so the
/// interactive path can decide how to treat the Ctrl-Z unit without a
/// back-reference to the driver.
#[derive(Debug, Default)]
pub struct ModeState {
    raw: AtomicBool,
}

impl ModeState {
    /// A fresh state in cooked mode.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            raw: AtomicBool::new(false),
        }
    }

    /// The current mode.
    #[inline]
    #[must_use]
    pub fn get(&self) -> TerminalMode {
        TerminalMode::from_raw(self.raw.load(Ordering::Acquire))
    }

    /// Record a completed transition.
    #[inline]
    pub fn set(&self, mode: TerminalMode) {
        self.raw.store(mode.is_raw(), Ordering::Release);
    }
}

// ─── ModeSnapshot ────────────────────────────────────────────────────────────

/// The input/output mode pair captured on the first successful mode change.
///
/// This is the restore target for cooked mode and is never overwritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeSnapshot<I, O> {
    /// Input-side mode bits.
    pub input: I,
    /// Output-side mode bits.
    pub output: O,
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    bitflags::bitflags! {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        struct Bits: u16 {
            const ECHO   = 1 << 0;
            const LINE   = 1 << 1;
            const SIG    = 1 << 2;
            const MOUSE  = 1 << 3;
            const VT     = 1 << 4;
        }
    }

    const PROFILE: ModeProfile<Bits> = ModeProfile {
        clear: Bits::MOUSE,
        set: Bits::VT,
        cooked: Bits::ECHO.union(Bits::LINE).union(Bits::SIG),
    };

    #[test]
    fn raw_removes_cooked_bits() {
        let original = Bits::ECHO | Bits::LINE | Bits::SIG;
        assert_eq!(PROFILE.target(original, TerminalMode::Raw), Bits::VT);
    }

    #[test]
    fn cooked_adds_cooked_bits() {
        assert_eq!(
            PROFILE.target(Bits::empty(), TerminalMode::Cooked),
            Bits::ECHO | Bits::LINE | Bits::SIG | Bits::VT
        );
    }

    #[test]
    fn clear_and_set_apply_in_both_modes() {
        let original = Bits::MOUSE | Bits::ECHO;
        for mode in [TerminalMode::Raw, TerminalMode::Cooked] {
            let target = PROFILE.target(original, mode);
            assert!(!target.contains(Bits::MOUSE));
            assert!(target.contains(Bits::VT));
        }
    }

    #[test]
    fn unknown_bits_survive() {
        let original = Bits::from_bits_retain(0x8000) | Bits::ECHO;
        let raw = PROFILE.target(original, TerminalMode::Raw);
        assert_eq!(raw.bits() & 0x8000, 0x8000);
        let cooked = PROFILE.target(original, TerminalMode::Cooked);
        assert_eq!(cooked.bits() & 0x8000, 0x8000);
    }

    #[test]
    fn target_ignores_toggle_history() {
        let original = Bits::ECHO | Bits::LINE | Bits::SIG | Bits::VT;
        let first = PROFILE.target(original, TerminalMode::Cooked);
        let mut current = original;
        for raw in [true, false, true, true, false] {
            current = PROFILE.target(original, TerminalMode::from_raw(raw));
        }
        assert_eq!(current, first);
        assert_eq!(first, original);
    }

    #[test]
    fn mode_state_tracks_transitions() {
        let state = ModeState::new();
        assert_eq!(state.get(), TerminalMode::Cooked);
        state.set(TerminalMode::Raw);
        assert!(state.get().is_raw());
        state.set(TerminalMode::Cooked);
        assert!(!state.get().is_raw());
    }

    #[test]
    fn default_mode_is_cooked() {
        assert_eq!(TerminalMode::default(), TerminalMode::Cooked);
    }
}
