//! TOML run configuration and calibration files.
//!
//! ```toml
//! bench = "ipi"
//!
//! [run]
//! iterations = 65536
//! spin_limit = 1000000000
//!
//! [baseline]
//! ipi = 18122
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use corelat_bench::{BenchKind, Calibration, Metric, RunConfig};
use serde::{Deserialize, Serialize};

/// Contents of a configuration file. Every section is optional.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Benchmark to run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bench: Option<BenchKind>,
    /// Run knobs.
    #[serde(default)]
    pub run: RunConfig,
    /// Expected mean per metric name.
    #[serde(default)]
    pub baseline: BTreeMap<String, u64>,
}

impl FileConfig {
    /// Reads and parses `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing {}", path.display()))
    }

    /// Parses TOML text.
    pub fn parse(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.run.validate()?;
        config.calibration()?;
        Ok(config)
    }

    /// The `[baseline]` table as a [`Calibration`].
    pub fn calibration(&self) -> Result<Calibration> {
        let mut calibration = Calibration::new();
        for (name, &mean) in &self.baseline {
            let Some(metric) = Metric::from_name(name) else {
                bail!("unknown metric '{name}' in [baseline]");
            };
            calibration.set(metric, mean);
        }
        Ok(calibration)
    }

    /// Builds a file holding only a `[baseline]` table.
    pub fn from_calibration(calibration: &Calibration) -> Self {
        Self {
            baseline: calibration
                .iter()
                .map(|(metric, mean)| (metric.name().to_owned(), mean))
                .collect(),
            ..Self::default()
        }
    }

    /// Serializes to TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("serializing configuration")
    }
}

/// Parses a benchmark name, listing the catalog on failure.
pub fn bench_kind(name: &str) -> Result<BenchKind> {
    BenchKind::from_name(name).ok_or_else(|| {
        let names: Vec<&str> = BenchKind::ALL.iter().map(|k| k.name()).collect();
        anyhow!("unknown benchmark '{name}' (expected one of: {})", names.join(", "))
    })
}
