//! Parser for the binary report stream emitted by the harness.
//!
//! The stream may be preceded by arbitrary serial text; parsing starts at
//! the first header magic.

use anyhow::{Result, anyhow, bail};
use corelat_bench::measure::Counters;
use corelat_bench::wire::{FOOTER_MAGIC, HEADER_MAGIC, NONE};
use corelat_bench::{BenchKind, CoreReport, Metric, MetricReport, Summary};
use corelat_core::CoreId;

/// Reports recovered from one stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    /// Benchmark that produced the reports.
    pub kind: BenchKind,
    /// One report per measuring core.
    pub reports: Vec<CoreReport>,
    /// Cycle-counter frequency in kHz, 0 if unknown.
    pub tsc_freq_khz: u64,
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8]> {
        let end = self.pos + n;
        if end > self.data.len() {
            bail!("report stream truncated ({what})");
        }
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn u8(&mut self, what: &str) -> Result<u8> {
        Ok(self.take(1, what)?[0])
    }

    fn u32(&mut self, what: &str) -> Result<u32> {
        let bytes = self.take(4, what)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn u64(&mut self, what: &str) -> Result<u64> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8, what)?);
        Ok(u64::from_le_bytes(buf))
    }

    fn opt_u64(&mut self, what: &str) -> Result<Option<u64>> {
        Ok(Some(self.u64(what)?).filter(|&v| v != NONE))
    }
}

/// Parses the first report stream found in `data`.
pub fn parse(data: &[u8]) -> Result<Capture> {
    let start = find_magic(data, &HEADER_MAGIC)
        .ok_or_else(|| anyhow!("report header magic not found in input"))?;
    let mut r = Reader {
        data,
        pos: start + HEADER_MAGIC.len(),
    };

    let kind_index = r.u8("header")?;
    let kind = BenchKind::from_index(kind_index)
        .ok_or_else(|| anyhow!("unknown benchmark index {kind_index}"))?;
    r.take(3, "header")?;
    let count = r.u32("header")?;

    let mut reports = Vec::with_capacity(count.min(256) as usize);
    for _ in 0..count {
        reports.push(record(&mut r, kind)?);
    }

    let tsc_freq_khz = r.u64("footer")?;
    let body_end = r.pos;
    let crc = r.u32("footer")?;
    if r.take(FOOTER_MAGIC.len(), "footer")? != FOOTER_MAGIC {
        bail!("report footer magic mismatch");
    }
    let expected = crc32fast::hash(&data[start..body_end]);
    if crc != expected {
        bail!("report checksum mismatch (stored {crc:#010x}, computed {expected:#010x})");
    }

    Ok(Capture {
        kind,
        reports,
        tsc_freq_khz,
    })
}

fn record(r: &mut Reader<'_>, kind: BenchKind) -> Result<CoreReport> {
    let core = CoreId::new(r.u32("record")?);
    let tick = r.u64("record")?;
    let iterations = r.u64("record")?;
    let counters = Counters {
        attempts: r.u64("counters")?,
        interfered: r.u64("counters")?,
        skewed: r.u64("counters")?,
        implausible: r.u64("counters")?,
        no_reply: r.u64("counters")?,
        undo_failures: r.u64("counters")?,
    };
    let unfiltered_mean = r.opt_u64("record")?;
    let metric_count = r.u8("record")?;
    let metrics = (0..metric_count)
        .map(|_| metric(r))
        .collect::<Result<Vec<_>>>()?;
    Ok(CoreReport {
        kind,
        core,
        tick,
        iterations,
        metrics,
        counters,
        unfiltered_mean,
    })
}

fn metric(r: &mut Reader<'_>) -> Result<MetricReport> {
    let index = r.u8("metric")?;
    let metric = Metric::from_index(index).ok_or_else(|| anyhow!("unknown metric index {index}"))?;
    let failures = r.u64("metric")?;
    let count = r.u64("metric")?;
    let mean = r.u64("metric")?;
    let max = r.u64("metric")?;
    let min = r.u64("metric")?;
    let variance = r.u64("metric")?;
    let expected = r.opt_u64("metric")?;
    let summary = (count != 0).then_some(Summary {
        metric,
        count,
        mean,
        max,
        min,
        variance,
        expected,
    });
    Ok(MetricReport {
        metric,
        summary,
        failures,
    })
}

/// Find the position of a magic byte sequence in data.
fn find_magic(data: &[u8], magic: &[u8]) -> Option<usize> {
    data.windows(magic.len()).position(|w| w == magic)
}
