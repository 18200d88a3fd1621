//! Terminal output for parsed reports.

use anyhow::{Context, Result};
use corelat_bench::clock::cycles_to_nanos;
use serde::Serialize;

use crate::wire::Capture;

/// One table row: a metric as observed on one core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Row {
    /// Reporting core.
    pub core: u32,
    /// Metric name.
    pub metric: &'static str,
    /// Valid samples.
    pub count: u64,
    /// Mean cycles (0 without samples).
    pub mean: u64,
    /// Largest sample.
    pub max: u64,
    /// Smallest sample.
    pub min: u64,
    /// Variance around the calibration value, or the mean without one.
    pub variance: u64,
    /// Integer square root of `variance`.
    pub stddev: u64,
    /// Calibrated mean, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<u64>,
    /// Samples with a non-zero status.
    pub failures: u64,
    /// Mean in nanoseconds, when the counter frequency is known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_ns: Option<u64>,
}

/// Flattens a capture into rows in core, then metric order.
pub fn rows(capture: &Capture) -> Vec<Row> {
    let freq = capture.tsc_freq_khz;
    capture
        .reports
        .iter()
        .flat_map(|report| {
            report.metrics.iter().map(move |entry| {
                let summary = entry.summary.as_ref();
                Row {
                    core: report.core.as_u32(),
                    metric: entry.metric.name(),
                    count: summary.map_or(0, |s| s.count),
                    mean: summary.map_or(0, |s| s.mean),
                    max: summary.map_or(0, |s| s.max),
                    min: summary.map_or(0, |s| s.min),
                    variance: summary.map_or(0, |s| s.variance),
                    stddev: summary.map_or(0, corelat_bench::Summary::stddev),
                    expected: summary.and_then(|s| s.expected),
                    failures: entry.failures,
                    mean_ns: summary
                        .filter(|_| freq > 0)
                        .map(|s| cycles_to_nanos(s.mean, freq)),
                }
            })
        })
        .collect()
}

/// Print a capture as a formatted table, followed by per-core counters.
pub fn print_table(capture: &Capture) {
    let rows = rows(capture);
    if rows.is_empty() {
        println!("  No reports to display.");
        return;
    }

    let width = rows.iter().map(|r| r.metric.len()).max().unwrap_or(6).max(6);

    println!();
    println!("  {} ({} cores reporting)", capture.kind.name(), capture.reports.len());
    println!(
        "  {:>4}  {:<width$}  {:>10}  {:>10}  {:>10}  {:>10}  {:>10}  {:>10}  {:>8}",
        "Core", "Metric", "Mean (cy)", "Min (cy)", "Max (cy)", "Stddev", "Expected", "Samples",
        "Failed",
    );
    println!(
        "  {:->4}  {:-<width$}  {:->10}  {:->10}  {:->10}  {:->10}  {:->10}  {:->10}  {:->8}",
        "", "", "", "", "", "", "", "", "",
    );
    for row in &rows {
        let expected = row.expected.map_or_else(|| "-".to_owned(), |e| e.to_string());
        if row.count == 0 {
            println!(
                "  {:>4}  {:<width$}  {:>10}  {:>10}  {:>10}  {:>10}  {:>10}  {:>10}  {:>8}",
                row.core, row.metric, "-", "-", "-", "-", expected, 0, row.failures,
            );
        } else {
            println!(
                "  {:>4}  {:<width$}  {:>10}  {:>10}  {:>10}  {:>10}  {:>10}  {:>10}  {:>8}",
                row.core,
                row.metric,
                row.mean,
                row.min,
                row.max,
                row.stddev,
                expected,
                row.count,
                row.failures,
            );
        }
    }

    println!();
    for report in &capture.reports {
        let c = &report.counters;
        println!(
            "  core {}: @tick {}, {} attempts, {} interfered, {} skewed, {} implausible, {} no reply, {} undo failures",
            report.core,
            report.tick,
            c.attempts,
            c.interfered,
            c.skewed,
            c.implausible,
            c.no_reply,
            c.undo_failures,
        );
        if let Some(mean) = report.unfiltered_mean {
            println!("  core {}: unfiltered mean {mean} cycles", report.core);
        }
    }

    if capture.tsc_freq_khz > 0 {
        println!();
        println!("  Cycle counter frequency: {} kHz", capture.tsc_freq_khz);
        for row in rows.iter().filter(|r| r.count > 0) {
            if let Some(ns) = row.mean_ns {
                println!("  core {} {}: {ns} ns", row.core, row.metric);
            }
        }
    }
    println!();
}

/// Print a capture as a JSON array of rows.
pub fn print_json(capture: &Capture) -> Result<()> {
    let json = serde_json::to_string_pretty(&rows(capture)).context("serializing rows to JSON")?;
    println!("{json}");
    Ok(())
}
