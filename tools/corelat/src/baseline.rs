//! Calibration files as regression baselines.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use corelat_bench::{Calibration, Metric};

use crate::config::FileConfig;
use crate::wire::Capture;

/// One metric's observed mean against its calibrated value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Comparison {
    /// Metric compared.
    pub metric: Metric,
    /// Calibrated mean, `None` if the file has no entry.
    pub expected: Option<u64>,
    /// Mean across all cores reporting the metric.
    pub measured: u64,
    /// Absolute difference as a percentage of `expected`.
    pub pct: u64,
    /// Slower than `expected` by more than the threshold.
    pub regression: bool,
}

/// Mean of each metric across cores, weighted by sample count.
pub fn observed_means(capture: &Capture) -> BTreeMap<Metric, u64> {
    let mut totals: BTreeMap<Metric, (u128, u128)> = BTreeMap::new();
    for report in &capture.reports {
        for summary in report.metrics.iter().filter_map(|m| m.summary) {
            let entry = totals.entry(summary.metric).or_default();
            entry.0 += u128::from(summary.mean) * u128::from(summary.count);
            entry.1 += u128::from(summary.count);
        }
    }
    totals
        .into_iter()
        .map(|(metric, (sum, n))| (metric, u64::try_from(sum / n).unwrap_or(u64::MAX)))
        .collect()
}

/// Compares observed means against `calibration`.
pub fn compare(
    capture: &Capture,
    calibration: &Calibration,
    threshold_pct: u32,
) -> Vec<Comparison> {
    observed_means(capture)
        .into_iter()
        .map(|(metric, measured)| {
            let expected = calibration.expected(metric);
            let pct = expected
                .filter(|&e| e > 0)
                .map_or(0, |e| measured.abs_diff(e) * 100 / e);
            let regression = expected
                .is_some_and(|e| measured > e && pct > u64::from(threshold_pct));
            Comparison {
                metric,
                expected,
                measured,
                pct,
                regression,
            }
        })
        .collect()
}

/// Prints comparisons and returns the number of regressions.
pub fn print_comparison(comparisons: &[Comparison], threshold_pct: u32) -> usize {
    println!("\n  Baseline comparison (threshold: {threshold_pct}%):");
    for c in comparisons {
        match c.expected {
            Some(expected) => {
                let direction = if c.measured > expected { "slower" } else { "faster" };
                let flag = if c.regression { " REGRESSION" } else { "" };
                println!(
                    "    {} : {} -> {} ({}% {direction}){flag}",
                    c.metric.name(),
                    expected,
                    c.measured,
                    c.pct
                );
            }
            None => println!("    {} : new (no baseline)", c.metric.name()),
        }
    }

    let regressions = comparisons.iter().filter(|c| c.regression).count();
    if regressions > 0 {
        println!("\n  {regressions} regression(s) detected!");
    } else {
        println!("\n  No regressions detected.");
    }
    regressions
}

/// Writes the observed means as a `[baseline]` calibration file.
pub fn save(capture: &Capture, path: &Path) -> Result<()> {
    let mut calibration = Calibration::new();
    for (metric, mean) in observed_means(capture) {
        calibration.set(metric, mean);
    }
    let text = FileConfig::from_calibration(&calibration).to_toml()?;
    std::fs::write(path, text).with_context(|| format!("writing baseline to {}", path.display()))
}
