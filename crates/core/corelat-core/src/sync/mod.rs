//! Spin-wait synchronization primitives.
//!
//! Everything here busy-polls shared atomics; nothing yields to a
//! scheduler. Each waiting operation takes a [`SpinLimit`] so a missing
//! peer surfaces as [`SpinTimeout`] instead of a silent hang when the run
//! is configured with a bound.

mod barrier;
mod flag;
pub mod loom_compat;
mod spin;
mod spinlock;

pub use barrier::SpinBarrier;
pub use flag::{CoreFlags, ExitFlag};
pub use spin::{SpinLimit, SpinTimeout, spin_until};
pub use spinlock::{SpinLock, SpinLockGuard};
