//! Metrics, calibration tables, and run configuration.

use corelat_core::sync::SpinLimit;

use crate::error::BenchError;

/// A single accumulator's identity. Calibration and reports are keyed by
/// metric, not by benchmark, since paired benchmarks produce two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
#[repr(u8)]
pub enum Metric {
    /// Synchronous IPC call and return.
    Ipc = 0,
    /// Inter-processor signal round trip.
    Ipi = 1,
    /// Cross-core response time under map/unmap interference.
    Response = 2,
    /// Synchronous-invocation capability activation.
    CapActivate = 3,
    /// Page map.
    MemMap = 4,
    /// Page unmap.
    MemUnmap = 5,
    /// Page-table construct.
    PgtblCons = 6,
    /// Page-table destruct.
    PgtblDecons = 7,
    /// Capability-table construct.
    CaptblCons = 8,
    /// Capability-table destruct.
    CaptblDecons = 9,
    /// Retype frame memory to user memory.
    RetypeToUser = 10,
    /// Retype user memory back to a frame.
    RetypeToFrame = 11,
    /// Kernel-object activation.
    KobjActivate = 12,
    /// Kernel-object deactivation.
    KobjDeactivate = 13,
    /// Thread switch to a partner thread.
    ThreadSwitch = 14,
}

impl Metric {
    /// Number of metrics.
    pub const COUNT: usize = 15;

    /// All metrics in index order.
    pub const ALL: [Metric; Self::COUNT] = [
        Metric::Ipc,
        Metric::Ipi,
        Metric::Response,
        Metric::CapActivate,
        Metric::MemMap,
        Metric::MemUnmap,
        Metric::PgtblCons,
        Metric::PgtblDecons,
        Metric::CaptblCons,
        Metric::CaptblDecons,
        Metric::RetypeToUser,
        Metric::RetypeToFrame,
        Metric::KobjActivate,
        Metric::KobjDeactivate,
        Metric::ThreadSwitch,
    ];

    /// Returns the metric's name as used in calibration files and output.
    pub const fn name(self) -> &'static str {
        match self {
            Metric::Ipc => "ipc",
            Metric::Ipi => "ipi",
            Metric::Response => "response",
            Metric::CapActivate => "cap_activate",
            Metric::MemMap => "mem_map",
            Metric::MemUnmap => "mem_unmap",
            Metric::PgtblCons => "pgtbl_cons",
            Metric::PgtblDecons => "pgtbl_decons",
            Metric::CaptblCons => "captbl_cons",
            Metric::CaptblDecons => "captbl_decons",
            Metric::RetypeToUser => "retype_to_user",
            Metric::RetypeToFrame => "retype_to_frame",
            Metric::KobjActivate => "kobj_activate",
            Metric::KobjDeactivate => "kobj_deactivate",
            Metric::ThreadSwitch => "thread_switch",
        }
    }

    /// Looks up a metric by name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.name() == name)
    }

    /// Returns the metric's dense index.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Looks up a metric by its wire encoding.
    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(usize::from(index)).copied()
    }
}

/// Expected mean per metric, measured on a reference machine.
///
/// Used twice: as the center of the variance sum, and as the regression
/// check against the measured mean after the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Calibration {
    expected: [Option<u64>; Metric::COUNT],
}

impl Calibration {
    /// Creates an empty calibration.
    pub const fn new() -> Self {
        Self {
            expected: [None; Metric::COUNT],
        }
    }

    /// Sets the expected mean for `metric`.
    pub fn set(&mut self, metric: Metric, mean: u64) {
        self.expected[metric.index()] = Some(mean);
    }

    /// Builder form of [`set`](Self::set).
    #[must_use]
    pub fn with(mut self, metric: Metric, mean: u64) -> Self {
        self.set(metric, mean);
        self
    }

    /// Returns the expected mean for `metric`, if calibrated.
    pub fn expected(&self, metric: Metric) -> Option<u64> {
        self.expected[metric.index()]
    }

    /// Iterates over all calibrated metrics.
    pub fn iter(&self) -> impl Iterator<Item = (Metric, u64)> + '_ {
        Metric::ALL
            .into_iter()
            .filter_map(|m| self.expected(m).map(|mean| (m, mean)))
    }

    /// Returns `true` if no metric is calibrated.
    pub fn is_empty(&self) -> bool {
        self.expected.iter().all(Option::is_none)
    }
}

/// Default logical iteration budget (2^20).
pub const DEFAULT_ITERATIONS: u64 = 1 << 20;
/// Default number of discarded attempts allowed per logical iteration.
pub const DEFAULT_MAX_RETRIES: u32 = 4096;
/// Default settling delay after an interfered sample, in cycles.
pub const DEFAULT_SETTLE_CYCLES: u64 = 10_000;
/// Default ceiling above which a round trip is treated as corrupted.
pub const DEFAULT_SANITY_CEILING: u64 = 50_000;
/// Default page batch for the map/unmap benchmarks.
pub const DEFAULT_BATCH_PAGES: u32 = 1024;
/// Discard count above which a report carries a "filtered" note.
pub const FILTERED_NOTE_THRESHOLD: u64 = 10;

/// Knobs for a single run. Every core sees the same configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default, deny_unknown_fields)
)]
pub struct RunConfig {
    /// Logical iterations per metric.
    pub iterations: u64,
    /// Discarded attempts allowed per logical iteration before
    /// [`BenchError::MaxRetriesExceeded`].
    pub max_retries: u32,
    /// Busy delay after an interfered sample and after quiescence.
    pub settle_cycles: u64,
    /// Round trips above this many cycles are discarded as corrupted.
    pub sanity_ceiling: u64,
    /// Poll bound for every spin-wait; `None` spins forever.
    pub spin_limit: Option<u64>,
    /// Responder core is `measuring core + responder_offset`.
    pub responder_offset: u32,
    /// Cores `0..measuring_cores` run the measurement loop.
    pub measuring_cores: u32,
    /// Pages per map/unmap batch.
    pub batch_pages: u32,
    /// Allowed deviation from the expected mean, in percent. Zero flags any
    /// difference.
    pub baseline_tolerance_pct: u32,
    /// Wait for a tick change between map/unmap batches.
    pub tlb_quiescence: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            max_retries: DEFAULT_MAX_RETRIES,
            settle_cycles: DEFAULT_SETTLE_CYCLES,
            sanity_ceiling: DEFAULT_SANITY_CEILING,
            spin_limit: None,
            responder_offset: 1,
            measuring_cores: 1,
            batch_pages: DEFAULT_BATCH_PAGES,
            baseline_tolerance_pct: 0,
            tlb_quiescence: true,
        }
    }
}

impl RunConfig {
    /// Returns the spin bound as a [`SpinLimit`].
    pub const fn spin_limit(&self) -> SpinLimit {
        SpinLimit::from_option(self.spin_limit)
    }

    /// Checks the configuration for values no benchmark can run with.
    pub fn validate(&self) -> Result<(), BenchError> {
        if self.iterations == 0 {
            return Err(BenchError::InvalidConfig("iterations must be non-zero"));
        }
        if self.batch_pages == 0 {
            return Err(BenchError::InvalidConfig("batch_pages must be non-zero"));
        }
        if self.measuring_cores == 0 {
            return Err(BenchError::InvalidConfig("measuring_cores must be non-zero"));
        }
        if self.responder_offset == 0 {
            return Err(BenchError::InvalidConfig("responder_offset must be non-zero"));
        }
        if self.spin_limit == Some(0) {
            return Err(BenchError::InvalidConfig("spin_limit must be non-zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_names_round_trip() {
        for metric in Metric::ALL {
            assert_eq!(Metric::from_name(metric.name()), Some(metric));
            assert_eq!(Metric::from_index(metric as u8), Some(metric));
        }
        assert_eq!(Metric::from_name("nope"), None);
        assert_eq!(Metric::from_index(Metric::COUNT as u8), None);
    }

    #[test]
    fn calibration_lookup() {
        let cal = Calibration::new()
            .with(Metric::Ipc, 638)
            .with(Metric::MemUnmap, 3248);
        assert_eq!(cal.expected(Metric::Ipc), Some(638));
        assert_eq!(cal.expected(Metric::Ipi), None);
        let all: Vec<_> = cal.iter().collect();
        assert_eq!(all, vec![(Metric::Ipc, 638), (Metric::MemUnmap, 3248)]);
        assert!(!cal.is_empty());
        assert!(Calibration::default().is_empty());
    }

    #[test]
    fn default_config_is_valid() {
        let config = RunConfig::default();
        assert_eq!(config.iterations, 1_048_576);
        assert_eq!(config.spin_limit(), SpinLimit::Unbounded);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_zero_values() {
        let config = RunConfig {
            iterations: 0,
            ..RunConfig::default()
        };
        assert!(matches!(config.validate(), Err(BenchError::InvalidConfig(_))));

        let config = RunConfig {
            spin_limit: Some(0),
            ..RunConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
