// SPDX-License-Identifier: MIT
//
// Native handle wrapper.
//
// Validity and interactivity are probed exactly once, when the handle is
// wrapped, and never re-evaluated. A standard stream redirected after
// startup keeps the classification it had at startup.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::backend::Backend;

/// One OS descriptor plus its startup classification.
#[derive(Debug)]
pub struct NativeHandle<H> {
    raw: H,
    name: &'static str,
    valid: bool,
    interactive: bool,
}

impl<H> NativeHandle<H> {
    /// Wrap `raw`, probing it through `backend`.
    ///
    /// `write` selects the output-side validity probe (a zero-length write
    /// on platforms where descriptors can look valid but be unusable).
    pub fn probe<B>(backend: &B, raw: H, name: &'static str, write: bool) -> Self
    where
        B: Backend<Handle = H>,
    {
        let valid = backend.is_handle_valid(&raw, write);
        let interactive = valid && backend.is_handle_interactive(&raw);

        tracing::debug!(stream = name, valid, interactive, "probed native handle");

        Self {
            raw,
            name,
            valid,
            interactive,
        }
    }

    /// The wrapped OS descriptor.
    #[inline]
    pub const fn raw(&self) -> &H {
        &self.raw
    }

    /// Human-readable stream name used in diagnostics.
    #[inline]
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Whether the descriptor was usable at startup.
    #[inline]
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.valid
    }

    /// Whether the descriptor is a character-mode console/tty whose mode
    /// can be queried.
    #[inline]
    #[must_use]
    pub const fn is_interactive(&self) -> bool {
        self.interactive
    }

    /// Whether the descriptor points at a file, pipe, or nothing at all.
    #[inline]
    #[must_use]
    pub const fn is_redirected(&self) -> bool {
        !self.interactive
    }
}

// ─── StreamLock ──────────────────────────────────────────────────────────────

/// Mutual-exclusion lock serializing I/O on one or more streams.
///
/// Cloning yields another handle to the same lock; the driver gives one
/// clone to standard input and one to terminal input so the pair never
/// interleave.
#[derive(Debug, Clone, Default)]
pub struct StreamLock(Arc<Mutex<()>>);

impl StreamLock {
    /// A fresh, unshared lock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until the lock is held.
    ///
    /// The lock guards no data, so poisoning from a panicked holder is
    /// ignored.
    pub fn acquire(&self) -> MutexGuard<'_, ()> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether `self` and `other` are the same lock.
    #[must_use]
    pub fn is_shared_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
