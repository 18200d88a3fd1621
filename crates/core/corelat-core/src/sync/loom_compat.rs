//! Loom compatibility shim.
//!
//! Under `cfg(loom)` this re-exports loom's atomics and spin hint so the
//! barrier and flags run under loom's model checker unchanged. Otherwise it
//! re-exports the `core` equivalents.
//!
//! Downstream crates build their shared state from these re-exports too.

#[cfg(loom)]
pub use loom::cell::UnsafeCell;
#[cfg(loom)]
pub use loom::hint::spin_loop;
#[cfg(loom)]
pub use loom::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering, fence};

#[cfg(not(loom))]
pub use core::cell::UnsafeCell;
#[cfg(not(loom))]
pub use core::hint::spin_loop;
#[cfg(not(loom))]
pub use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering, fence};
