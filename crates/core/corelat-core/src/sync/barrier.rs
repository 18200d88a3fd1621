//! Counter-based rendezvous barrier.
//!
//! Every arrival bumps a shared counter that is never reset. The caller's
//! generation is implied by the running total: it may leave once the
//! counter reaches the next multiple of the participant count at or above
//! its own post-increment value. Repeated phases reuse the same barrier
//! safely as long as each phase is entered by exactly `participants`
//! callers.
//!
//! # Liveness
//!
//! If fewer than `participants` callers ever arrive for a generation, the
//! ones that did arrive spin forever. With a [`SpinLimit::Bounded`] limit
//! this surfaces as [`SpinTimeout`] instead. A caller that times out has
//! still been counted, so the barrier is unusable for the rest of the run.

use super::loom_compat::{AtomicUsize, Ordering};
use super::spin::{SpinLimit, SpinTimeout, spin_until};

/// A spinning rendezvous barrier with implicit generations.
#[derive(Debug)]
pub struct SpinBarrier {
    arrived: AtomicUsize,
}

impl SpinBarrier {
    /// Creates a barrier with no arrivals.
    pub fn new() -> Self {
        Self {
            arrived: AtomicUsize::new(0),
        }
    }

    /// Arrives at the barrier and spins until all `participants` callers of
    /// this generation have arrived.
    ///
    /// Returns the counter value the caller waited for.
    ///
    /// # Panics
    ///
    /// Panics if `participants` is zero.
    pub fn arrive_and_wait(
        &self,
        participants: usize,
        limit: SpinLimit,
    ) -> Result<usize, SpinTimeout> {
        assert!(participants != 0, "barrier needs at least one participant");
        let prev = self.arrived.fetch_add(1, Ordering::AcqRel);
        let target = (prev / participants + 1) * participants;
        spin_until(limit, || self.arrived.load(Ordering::Acquire) >= target)?;
        Ok(target)
    }

    /// Returns the total number of arrivals so far.
    pub fn arrivals(&self) -> usize {
        self.arrived.load(Ordering::Acquire)
    }
}

impl Default for SpinBarrier {
    fn default() -> Self {
        Self::new()
    }
}
