//! A simulated kernel for running the harness on host threads.
//!
//! Each operation burns a modeled number of cycles and then updates a
//! small per-core state machine, so an unbalanced sequence (mapping a page
//! twice, deactivating an inactive capability) fails the way the real
//! kernel would. Signals are counted per core in atomic mailboxes. The
//! tick only moves when [`SimKernel::tick`] is called.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use corelat_bench::clock::spin_for;
use corelat_bench::{Calibration, Cycles, Kernel, Metric, Op, Status, Tick, TickSource};
use corelat_core::CoreId;

use super::clock::HostClock;

/// Object already exists / is already in the requested state.
pub const EEXIST: Status = Status(-17);
/// Object does not exist / is not in a state that allows the operation.
pub const ENOENT: Status = Status(-2);
/// Core or target out of range.
pub const EINVAL: Status = Status(-22);

/// Cost of the cache-disturbing operation, in reference cycles.
const CACHE_FLUSH_COST: Cycles = 2_000;

/// Polls before an idle core starts yielding its host thread.
const YIELD_AFTER: u32 = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum KobjState {
    #[default]
    Inactive,
    Active,
    Frozen,
}

#[derive(Debug, Default)]
struct CoreState {
    cap_active: bool,
    pgtbl_hooked: bool,
    captbl_hooked: bool,
    retyped: bool,
    kobj: KobjState,
    mapped: BTreeSet<u32>,
}

fn set(flag: &mut bool, to: bool) -> Status {
    if *flag == to {
        return if to { EEXIST } else { ENOENT };
    }
    *flag = to;
    Status::OK
}

impl CoreState {
    fn apply(&mut self, op: Op) -> Status {
        match op {
            Op::IpcCall | Op::CacheFlush => Status::OK,
            Op::CapActivate => set(&mut self.cap_active, true),
            Op::CapDeactivate => set(&mut self.cap_active, false),
            Op::MemMap { page } => {
                if self.mapped.insert(page) { Status::OK } else { EEXIST }
            }
            Op::MemUnmap { page } => {
                if self.mapped.remove(&page) { Status::OK } else { ENOENT }
            }
            Op::PgtblCons => set(&mut self.pgtbl_hooked, true),
            Op::PgtblDecons => set(&mut self.pgtbl_hooked, false),
            Op::CaptblCons => set(&mut self.captbl_hooked, true),
            Op::CaptblDecons => set(&mut self.captbl_hooked, false),
            Op::RetypeToUser => set(&mut self.retyped, true),
            Op::RetypeToFrame => set(&mut self.retyped, false),
            Op::KobjActivate => match self.kobj {
                KobjState::Inactive => {
                    self.kobj = KobjState::Active;
                    Status::OK
                }
                _ => EEXIST,
            },
            Op::KobjFreeze => match self.kobj {
                KobjState::Active => {
                    self.kobj = KobjState::Frozen;
                    Status::OK
                }
                _ => ENOENT,
            },
            Op::KobjDeactivate => match self.kobj {
                KobjState::Frozen => {
                    self.kobj = KobjState::Inactive;
                    Status::OK
                }
                _ => ENOENT,
            },
        }
    }

    fn is_idle(&self) -> bool {
        !self.cap_active
            && !self.pgtbl_hooked
            && !self.captbl_hooked
            && !self.retyped
            && self.kobj == KobjState::Inactive
            && self.mapped.is_empty()
    }
}

/// Modeled cost of every operation, in clock units.
#[derive(Debug, Clone)]
pub struct CostModel {
    reference: Calibration,
    pct: u64,
}

impl CostModel {
    /// Scales the means in `reference` by `pct` percent.
    pub fn new(reference: Calibration, pct: u32) -> Self {
        Self {
            reference,
            pct: u64::from(pct),
        }
    }

    fn scaled(&self, cycles: Cycles) -> Cycles {
        cycles.saturating_mul(self.pct) / 100
    }

    fn of(&self, metric: Metric) -> Cycles {
        self.scaled(self.reference.expected(metric).unwrap_or(0))
    }

    /// Cost of `op`.
    pub fn op(&self, op: Op) -> Cycles {
        let metric = match op {
            Op::IpcCall => Metric::Ipc,
            Op::CapActivate => Metric::CapActivate,
            Op::CapDeactivate => return self.of(Metric::CapActivate) / 2,
            Op::MemMap { .. } => Metric::MemMap,
            Op::MemUnmap { .. } => Metric::MemUnmap,
            Op::PgtblCons => Metric::PgtblCons,
            Op::PgtblDecons => Metric::PgtblDecons,
            Op::CaptblCons => Metric::CaptblCons,
            Op::CaptblDecons => Metric::CaptblDecons,
            Op::RetypeToUser => Metric::RetypeToUser,
            Op::RetypeToFrame => Metric::RetypeToFrame,
            Op::KobjActivate => Metric::KobjActivate,
            Op::KobjFreeze => return self.of(Metric::KobjActivate) / 4,
            Op::KobjDeactivate => Metric::KobjDeactivate,
            Op::CacheFlush => return self.scaled(CACHE_FLUSH_COST),
        };
        self.of(metric)
    }

    /// One-way signal delivery.
    pub fn signal(&self) -> Cycles {
        self.of(Metric::Ipi) / 2
    }

    /// One direction of a thread switch.
    pub fn switch(&self) -> Cycles {
        self.of(Metric::ThreadSwitch) / 2
    }
}

/// Simulated kernel shared by all simulated cores.
#[derive(Debug)]
pub struct SimKernel {
    clock: HostClock,
    costs: CostModel,
    cores: Vec<Mutex<CoreState>>,
    mailboxes: Vec<AtomicU64>,
    tick: AtomicU64,
    invocations: AtomicU64,
    failures: AtomicU64,
}

impl SimKernel {
    /// Creates a kernel for `cores` cores.
    pub fn new(cores: usize, clock: HostClock, costs: CostModel) -> Self {
        Self {
            clock,
            costs,
            cores: (0..cores).map(|_| Mutex::default()).collect(),
            mailboxes: (0..cores).map(|_| AtomicU64::new(0)).collect(),
            tick: AtomicU64::new(0),
            invocations: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// Advances the tick, as the timer interrupt would.
    pub fn tick(&self) {
        self.tick.fetch_add(1, Ordering::AcqRel);
    }

    /// Total operations invoked.
    pub fn invocations(&self) -> u64 {
        self.invocations.load(Ordering::Relaxed)
    }

    /// Operations that returned a non-zero status.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Cores whose kernel objects were left mapped, active, or hooked.
    pub fn unbalanced_cores(&self) -> Vec<CoreId> {
        self.cores
            .iter()
            .enumerate()
            .filter(|(_, state)| !state.lock().unwrap_or_else(PoisonError::into_inner).is_idle())
            .filter_map(|(i, _)| u32::try_from(i).ok().map(CoreId::new))
            .collect()
    }
}

impl TickSource for SimKernel {
    #[inline]
    fn tick_now(&self) -> Tick {
        self.tick.load(Ordering::Acquire)
    }
}

impl Kernel for SimKernel {
    fn invoke(&self, core: CoreId, op: Op) -> Status {
        let Some(state) = self.cores.get(core.as_usize()) else {
            return EINVAL;
        };
        spin_for(&self.clock, self.costs.op(op));
        self.invocations.fetch_add(1, Ordering::Relaxed);
        let status = state.lock().unwrap_or_else(PoisonError::into_inner).apply(op);
        if !status.is_ok() {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
        status
    }

    fn send_signal(&self, _from: CoreId, target: CoreId) -> Status {
        let Some(mailbox) = self.mailboxes.get(target.as_usize()) else {
            return EINVAL;
        };
        spin_for(&self.clock, self.costs.signal());
        mailbox.fetch_add(1, Ordering::AcqRel);
        Status::OK
    }

    fn await_signal(&self, core: CoreId) {
        let Some(mailbox) = self.mailboxes.get(core.as_usize()) else {
            return;
        };
        let mut polls = 0u32;
        loop {
            let pending = mailbox.load(Ordering::Acquire);
            if pending > 0
                && mailbox
                    .compare_exchange_weak(
                        pending,
                        pending - 1,
                        Ordering::AcqRel,
                        Ordering::Relaxed,
                    )
                    .is_ok()
            {
                return;
            }
            if polls < YIELD_AFTER {
                polls += 1;
                std::hint::spin_loop();
            } else {
                std::thread::yield_now();
            }
        }
    }

    fn switch_thread(&self, core: CoreId, on_switch: &dyn Fn()) -> Status {
        if core.as_usize() >= self.cores.len() {
            return EINVAL;
        }
        let half = self.costs.switch();
        spin_for(&self.clock, half);
        on_switch();
        spin_for(&self.clock, half);
        Status::OK
    }
}
