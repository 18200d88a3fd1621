//! Command-line interface definitions for corelat.

use clap::{Parser, Subcommand};

/// Host-side driver for the corelat latency harness.
#[derive(Parser)]
#[command(name = "corelat", version, about)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Only print summary lines and errors.
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Print debug diagnostics from the harness.
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Command {
    /// Run a benchmark on host threads against a simulated kernel.
    Sim(SimArgs),
    /// Parse a captured report stream and compare it against a calibration.
    Report(ReportArgs),
    /// Print kernel command-line arguments for a configuration file.
    Cmdline(CmdlineArgs),
    /// List the benchmark catalog.
    List,
}

/// Arguments for the `sim` subcommand.
#[derive(Parser)]
pub struct SimArgs {
    /// Benchmark to run (see `corelat list`).
    pub bench: String,

    /// Number of simulated cores, one host thread each.
    #[arg(long, default_value = "4")]
    pub cores: usize,

    /// TOML file with `[run]` and `[baseline]` tables.
    #[arg(long, short = 'c')]
    pub config: Option<String>,

    /// Override the iteration count.
    #[arg(long)]
    pub iters: Option<u64>,

    /// Simulated timer period in microseconds (0 disables the timer).
    #[arg(long, default_value = "1000")]
    pub tick_us: u64,

    /// Scale every simulated operation cost by this percentage.
    #[arg(long, default_value = "100")]
    pub cost_pct: u32,

    /// Use the OS monotonic clock instead of the cycle counter.
    #[arg(long)]
    pub monotonic: bool,

    /// Also write the binary report stream to this file.
    #[arg(long, short = 'o')]
    pub output: Option<String>,
}

/// Arguments for the `report` subcommand.
#[derive(Parser)]
pub struct ReportArgs {
    /// Captured serial output containing a report stream.
    pub input: String,

    /// Compare means against this calibration file.
    #[arg(long)]
    pub baseline: Option<String>,

    /// Regression threshold as a percentage (default: 5).
    #[arg(long, default_value = "5")]
    pub threshold: u32,

    /// Write the observed means as a calibration file.
    #[arg(long)]
    pub save_baseline: Option<String>,

    /// Exit with an error if any regression is found.
    #[arg(long)]
    pub fail_on_regression: bool,

    /// Output format: `table` or `json`.
    #[arg(long, default_value = "table")]
    pub format: String,
}

/// Arguments for the `cmdline` subcommand.
#[derive(Parser)]
pub struct CmdlineArgs {
    /// TOML configuration file.
    pub config: String,

    /// Benchmark to run; overrides `bench` in the file.
    #[arg(long)]
    pub bench: Option<String>,
}
