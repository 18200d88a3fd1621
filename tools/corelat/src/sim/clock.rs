//! Host cycle clocks for simulated runs.

use std::time::{Duration, Instant};

#[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))]
use corelat_bench::clock::Tsc;
use corelat_bench::{CycleClock, Cycles};

/// Clock handed to the simulated cores.
#[derive(Debug, Clone, Copy)]
pub enum HostClock {
    /// The architectural counter, with its frequency measured if the
    /// architecture does not expose it.
    #[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))]
    Counter(Tsc),
    /// Nanoseconds since an epoch, read from the OS monotonic clock.
    Monotonic(Instant),
}

impl HostClock {
    /// Picks the cycle counter where one exists unless `monotonic` is set.
    pub fn new(monotonic: bool) -> Self {
        #[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))]
        if !monotonic {
            let tsc = Tsc::detect();
            let freq = match tsc.freq_khz() {
                0 => estimate_freq_khz(&tsc),
                f => f,
            };
            return Self::Counter(Tsc::new(freq));
        }
        let _ = monotonic;
        Self::Monotonic(Instant::now())
    }

    /// Short name for log lines.
    pub fn name(&self) -> &'static str {
        match self {
            #[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))]
            Self::Counter(_) => "cycle counter",
            Self::Monotonic(_) => "monotonic clock",
        }
    }

    /// Converts a wall-clock duration into this clock's units.
    pub fn cycles_in(&self, duration: Duration) -> Cycles {
        let khz = u128::from(self.freq_khz());
        u64::try_from(duration.as_micros() * khz / 1000).unwrap_or(u64::MAX)
    }
}

fn monotonic_nanos(epoch: Instant) -> Cycles {
    u64::try_from(epoch.elapsed().as_nanos()).unwrap_or(u64::MAX)
}

impl CycleClock for HostClock {
    #[inline]
    fn now(&self) -> Cycles {
        match self {
            #[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))]
            Self::Counter(tsc) => tsc.now(),
            Self::Monotonic(epoch) => monotonic_nanos(*epoch),
        }
    }

    #[inline]
    fn now_fast(&self) -> Cycles {
        match self {
            #[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))]
            Self::Counter(tsc) => tsc.now_fast(),
            Self::Monotonic(epoch) => monotonic_nanos(*epoch),
        }
    }

    fn freq_khz(&self) -> u64 {
        match self {
            #[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))]
            Self::Counter(tsc) => tsc.freq_khz(),
            Self::Monotonic(_) => 1_000_000,
        }
    }
}

/// Measures the counter against the monotonic clock over a short busy wait.
#[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))]
fn estimate_freq_khz(tsc: &Tsc) -> u64 {
    const WINDOW: Duration = Duration::from_millis(20);
    let start = Instant::now();
    let c0 = tsc.now();
    while start.elapsed() < WINDOW {
        std::hint::spin_loop();
    }
    let cycles = tsc.now().wrapping_sub(c0);
    let micros = start.elapsed().as_micros().max(1);
    u64::try_from(u128::from(cycles) * 1000 / micros).unwrap_or(u64::MAX)
}
