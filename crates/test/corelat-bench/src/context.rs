//! Per-core context and the state shared between cores.
//!
//! Nothing in the harness is a process-wide global: the barrier, flags,
//! slots, and report board live in one [`SharedState`] created before the
//! run and handed to every core by reference.

use corelat_core::CoreId;
use corelat_core::sync::loom_compat::{AtomicU64, Ordering};
use corelat_core::sync::{CoreFlags, ExitFlag, SpinBarrier, SpinLimit, SpinTimeout, spin_until};

use crate::channel::SlotTable;
use crate::clock::{CycleClock, spin_for};
use crate::config::{Calibration, Metric, RunConfig};
use crate::kernel::{Kernel, Op};
use crate::measure::{Attempt, Retry, Timed, Validity};
use crate::report::ReportBoard;
use crate::stats::RunningStats;
use crate::tick::TickWindow;

/// Lockstep handshake between the measuring core and the cache-flushing
/// interferer.
///
/// Round `n` (1-based) is requested by the measuring core before its
/// `n`-th logical iteration and completed by the flusher right before its
/// `n`-th page map. The other interferers map their `n`-th page only after
/// round `n` is complete.
#[derive(Debug)]
pub struct FlushHandshake {
    requested: AtomicU64,
    done: AtomicU64,
}

impl FlushHandshake {
    /// Creates a handshake with no rounds.
    pub fn new() -> Self {
        Self {
            requested: AtomicU64::new(0),
            done: AtomicU64::new(0),
        }
    }

    /// Requests round `round`.
    pub fn request(&self, round: u64) {
        self.requested.store(round, Ordering::Release);
    }

    /// Marks round `round` complete.
    pub fn complete(&self, round: u64) {
        self.done.store(round, Ordering::Release);
    }

    /// Spins until round `round` is requested. Returns `false` if `exit`
    /// was raised first.
    pub fn wait_requested(
        &self,
        round: u64,
        exit: &ExitFlag,
        limit: SpinLimit,
    ) -> Result<bool, SpinTimeout> {
        Self::wait(&self.requested, round, exit, limit)
    }

    /// Spins until round `round` is complete. Returns `false` if `exit`
    /// was raised first.
    pub fn wait_done(
        &self,
        round: u64,
        exit: &ExitFlag,
        limit: SpinLimit,
    ) -> Result<bool, SpinTimeout> {
        Self::wait(&self.done, round, exit, limit)
    }

    fn wait(
        counter: &AtomicU64,
        round: u64,
        exit: &ExitFlag,
        limit: SpinLimit,
    ) -> Result<bool, SpinTimeout> {
        spin_until(limit, || {
            counter.load(Ordering::Acquire) >= round || exit.is_raised()
        })?;
        Ok(counter.load(Ordering::Acquire) >= round)
    }
}

impl Default for FlushHandshake {
    fn default() -> Self {
        Self::new()
    }
}

/// State shared by all participating cores for one run.
#[derive(Debug)]
pub struct SharedState {
    participants: usize,
    /// Phase rendezvous.
    pub barrier: SpinBarrier,
    /// Raised by the coordinator when its measurement loop is done.
    pub exit: ExitFlag,
    /// Responder readiness, indexed by responder core.
    pub ready: CoreFlags,
    /// Measurement completion, indexed by measuring core.
    pub finished: CoreFlags,
    /// Round-trip slots.
    pub slots: SlotTable,
    /// Flush handshake for the response benchmark.
    pub flush: FlushHandshake,
    /// Where finished cores post their reports.
    pub reports: ReportBoard,
}

impl SharedState {
    /// Creates state for `participants` cores.
    ///
    /// # Panics
    ///
    /// Panics if `participants` is zero.
    pub fn new(participants: usize) -> Self {
        assert!(participants != 0, "a run needs at least one core");
        Self {
            participants,
            barrier: SpinBarrier::new(),
            exit: ExitFlag::new(),
            ready: CoreFlags::new(participants),
            finished: CoreFlags::new(participants),
            slots: SlotTable::new(participants),
            flush: FlushHandshake::new(),
            reports: ReportBoard::new(participants),
        }
    }

    /// Number of participating cores.
    pub fn participants(&self) -> usize {
        self.participants
    }
}

/// Everything one core needs to run its part of a benchmark.
pub struct CoreContext<'a, K: Kernel + ?Sized, C: CycleClock + ?Sized> {
    /// This core.
    pub core: CoreId,
    /// Operation interface.
    pub kernel: &'a K,
    /// Cycle counter.
    pub clock: &'a C,
    /// Cross-core state.
    pub shared: &'a SharedState,
    /// Run configuration.
    pub config: &'a RunConfig,
    /// Expected means.
    pub calibration: &'a Calibration,
}

impl<K: Kernel + ?Sized, C: CycleClock + ?Sized> Clone for CoreContext<'_, K, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K: Kernel + ?Sized, C: CycleClock + ?Sized> Copy for CoreContext<'_, K, C> {}

impl<'a, K: Kernel + ?Sized, C: CycleClock + ?Sized> CoreContext<'a, K, C> {
    /// Creates a context for `core`.
    pub fn new(
        core: CoreId,
        kernel: &'a K,
        clock: &'a C,
        shared: &'a SharedState,
        config: &'a RunConfig,
        calibration: &'a Calibration,
    ) -> Self {
        Self {
            core,
            kernel,
            clock,
            shared,
            config,
            calibration,
        }
    }

    /// Invokes `op`, bracketed by a serialized start read and a fast end
    /// read.
    #[inline]
    pub fn timed(&self, op: Op) -> Timed {
        let start = self.clock.now();
        let status = self.kernel.invoke(self.core, op);
        let end = self.clock.now_fast();
        Timed {
            cycles: end.saturating_sub(start),
            status,
        }
    }

    /// One tick-validated attempt at `op`.
    #[inline]
    pub fn attempt(&self, op: Op) -> Attempt<Timed> {
        let window = self.window();
        let timed = self.timed(op);
        if self.stable(window) {
            Attempt::Accept(timed)
        } else {
            Attempt::Discard(Validity::Interfered)
        }
    }

    /// Opens a tick window.
    #[inline]
    pub fn window(&self) -> TickWindow {
        TickWindow::open(self.kernel)
    }

    /// Closes a tick window.
    #[inline]
    pub fn stable(&self, window: TickWindow) -> bool {
        window.close(self.kernel)
    }

    /// Busy-waits for the configured settling delay.
    pub fn settle(&self) {
        spin_for(self.clock, self.config.settle_cycles);
    }

    /// Configured spin bound.
    pub fn limit(&self) -> SpinLimit {
        self.config.spin_limit()
    }

    /// Configured retry policy.
    pub fn retry(&self) -> Retry {
        Retry {
            max_retries: self.config.max_retries,
            settle: self.config.settle_cycles,
        }
    }

    /// Fresh accumulator for `metric`, centered on its calibration.
    pub fn stats(&self, metric: Metric) -> RunningStats {
        RunningStats::new(metric, self.calibration.expected(metric))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockKernel, StepClock};

    #[test]
    fn timed_measures_between_reads() {
        let kernel = MockKernel::new(1);
        let clock = StepClock::new(100, 25);
        let shared = SharedState::new(1);
        let config = RunConfig::default();
        let calibration = Calibration::new().with(Metric::Ipc, 25);
        let ctx = CoreContext::new(CoreId::new(0), &kernel, &clock, &shared, &config, &calibration);

        let timed = ctx.timed(Op::IpcCall);
        assert_eq!(timed.cycles, 25);
        assert!(timed.status.is_ok());
        assert!(ctx.stats(Metric::Ipc).finalize().is_err());
        assert_eq!(ctx.retry().max_retries, config.max_retries);
    }

    #[test]
    fn flush_rounds_advance_in_order() {
        let flush = FlushHandshake::new();
        let exit = ExitFlag::new();
        assert_eq!(
            flush.wait_requested(1, &exit, SpinLimit::Bounded(4)),
            Err(SpinTimeout { polls: 4 })
        );
        flush.request(1);
        assert_eq!(flush.wait_requested(1, &exit, SpinLimit::Bounded(4)), Ok(true));
        flush.complete(1);
        assert_eq!(flush.wait_done(1, &exit, SpinLimit::Bounded(4)), Ok(true));
        exit.raise();
        assert_eq!(flush.wait_done(2, &exit, SpinLimit::Unbounded), Ok(false));
    }
}
