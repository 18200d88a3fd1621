//! Bounded and unbounded spin-polling.

use core::fmt;

use super::loom_compat::spin_loop;

/// Upper bound on the number of polls a wait may perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpinLimit {
    /// Poll until the condition holds. A missing peer hangs the caller.
    #[default]
    Unbounded,
    /// Give up after this many unsuccessful polls.
    Bounded(u64),
}

impl SpinLimit {
    /// Builds a limit from an optional bound (`None` means unbounded).
    pub const fn from_option(bound: Option<u64>) -> Self {
        match bound {
            Some(n) => Self::Bounded(n),
            None => Self::Unbounded,
        }
    }

    /// Returns `true` once `polls` failed polls exhaust this limit.
    #[inline]
    pub const fn exhausted(self, polls: u64) -> bool {
        match self {
            Self::Unbounded => false,
            Self::Bounded(n) => polls >= n,
        }
    }
}

/// A bounded spin-wait gave up before its condition held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpinTimeout {
    /// Number of unsuccessful polls performed.
    pub polls: u64,
}

impl fmt::Display for SpinTimeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "spin wait gave up after {} polls", self.polls)
    }
}

/// Polls `cond` until it returns `true` or `limit` is exhausted.
///
/// Returns the number of unsuccessful polls before success.
#[inline]
pub fn spin_until(limit: SpinLimit, mut cond: impl FnMut() -> bool) -> Result<u64, SpinTimeout> {
    let mut polls = 0u64;
    while !cond() {
        polls += 1;
        if limit.exhausted(polls) {
            return Err(SpinTimeout { polls });
        }
        spin_loop();
    }
    Ok(polls)
}
