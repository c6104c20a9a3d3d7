// SPDX-License-Identifier: MIT

/// Terminal dimensions in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Size {
    /// Number of columns (width in character cells).
    pub cols: u16,
    /// Number of rows (height in character cells).
    pub rows: u16,
}

impl Size {
    /// Create a size from columns and rows.
    #[inline]
    #[must_use]
    pub const fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }

    /// Build a size from raw OS dimensions, rejecting a zero extent.
    ///
    /// Some platforms report `0×0` for a pseudo-terminal nobody sized yet;
    /// that is indistinguishable from "no terminal" to callers.
    #[inline]
    #[must_use]
    pub const fn from_nonzero(cols: u16, rows: u16) -> Option<Self> {
        if cols > 0 && rows > 0 {
            Some(Self { cols, rows })
        } else {
            None
        }
    }
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.cols, self.rows)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
