//! Core types and spin-wait primitives for the corelat latency harness.
//!
//! This crate holds everything the measurement loops share across cores:
//! core identifiers, the leveled logging sink, and the busy-wait
//! synchronization primitives (rendezvous barrier, exit and readiness
//! flags, a small spin lock). Nothing here blocks in the scheduler sense;
//! every wait is a spin-poll on an atomic, optionally bounded by a
//! [`SpinLimit`](sync::SpinLimit).
//!
//! The crate is `no_std` outside of tests so the same code runs inside a
//! kernel component and on the host.

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

extern crate alloc;

pub mod id;
pub mod log;
pub mod sync;

pub use id::CoreId;
