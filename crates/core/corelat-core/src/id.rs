//! Type-safe identifiers.

use core::fmt;

/// Identifier of a participating core.
///
/// Core 0 is the lowest-numbered participant and acts as the run
/// coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct CoreId(u32);

impl CoreId {
    /// The coordinating core.
    pub const COORDINATOR: Self = Self(0);

    /// Creates a new `CoreId`.
    pub const fn new(val: u32) -> Self {
        Self(val)
    }

    /// Returns the raw `u32` value.
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Returns the value as `usize` (convenience for indexing).
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Returns the core `offset` positions above this one.
    pub const fn offset(self, offset: u32) -> Self {
        Self(self.0 + offset)
    }

    /// Returns `true` for the coordinating core.
    pub const fn is_coordinator(self) -> bool {
        self.0 == Self::COORDINATOR.0
    }
}

impl fmt::Display for CoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for CoreId {
    fn from(val: u32) -> Self {
        Self(val)
    }
}
