//! One-shot and per-core spin flags.

use alloc::vec::Vec;

use super::loom_compat::{AtomicBool, Ordering};
use super::spin::{SpinLimit, SpinTimeout, spin_until};

/// Run-termination flag.
///
/// Raised once by the coordinating core when its measurement loop has
/// finished; every other core polls it between iterations.
#[derive(Debug)]
pub struct ExitFlag {
    raised: AtomicBool,
}

impl ExitFlag {
    /// Creates a lowered flag.
    pub fn new() -> Self {
        Self {
            raised: AtomicBool::new(false),
        }
    }

    /// Raises the flag. Everything written before this call is visible to
    /// a core that observes the flag raised.
    pub fn raise(&self) {
        self.raised.store(true, Ordering::Release);
    }

    /// Returns `true` once the flag has been raised.
    #[inline]
    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }

    /// Spins until the flag is raised.
    pub fn wait(&self, limit: SpinLimit) -> Result<(), SpinTimeout> {
        spin_until(limit, || self.is_raised()).map(|_| ())
    }
}

impl Default for ExitFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// One boolean per participating core.
///
/// Used for responder readiness and for "measurement finished" marks.
/// Indexing past the core count panics.
#[derive(Debug)]
pub struct CoreFlags {
    flags: Vec<AtomicBool>,
}

impl CoreFlags {
    /// Creates `cores` cleared flags.
    pub fn new(cores: usize) -> Self {
        Self {
            flags: (0..cores).map(|_| AtomicBool::new(false)).collect(),
        }
    }

    /// Number of flags.
    pub fn len(&self) -> usize {
        self.flags.len()
    }

    /// Returns `true` if there are no flags.
    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    /// Sets the flag of `core`.
    pub fn mark(&self, core: usize) {
        self.flags[core].store(true, Ordering::Release);
    }

    /// Clears the flag of `core`.
    pub fn clear(&self, core: usize) {
        self.flags[core].store(false, Ordering::Release);
    }

    /// Returns the flag of `core`.
    #[inline]
    pub fn is_set(&self, core: usize) -> bool {
        self.flags[core].load(Ordering::Acquire)
    }

    /// Spins until the flag of `core` is set.
    pub fn wait(&self, core: usize, limit: SpinLimit) -> Result<(), SpinTimeout> {
        spin_until(limit, || self.is_set(core)).map(|_| ())
    }
}
