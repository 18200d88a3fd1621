//! Host-side driver for the corelat latency harness.
//!
//! `sim` runs the harness on host threads against a simulated kernel,
//! `report` decodes a captured serial stream and checks it against a
//! calibration, and `cmdline` turns a TOML configuration into the kernel
//! command line the bare-metal harness parses.

mod baseline;
mod cli;
mod config;
mod logger;
mod output;
mod sim;
mod wire;

use std::path::Path;

use anyhow::{Context, Result, bail};
use clap::Parser;
use corelat_bench::BenchKind;
use corelat_core::lwarn;

use config::FileConfig;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    logger::init(cli.quiet, cli.verbose);

    match cli.command {
        cli::Command::Sim(ref args) => sim::command(args),
        cli::Command::Report(ref args) => cmd_report(args),
        cli::Command::Cmdline(ref args) => cmd_cmdline(args),
        cli::Command::List => {
            cmd_list();
            Ok(())
        }
    }
}

/// Decode a captured stream, print it, and compare it against a baseline.
fn cmd_report(args: &cli::ReportArgs) -> Result<()> {
    let data = std::fs::read(&args.input).with_context(|| format!("reading {}", args.input))?;
    let capture =
        wire::parse(&data).with_context(|| format!("decoding report stream in {}", args.input))?;

    let json = match args.format.as_str() {
        "table" => false,
        "json" => true,
        other => bail!("unknown output format '{other}' (expected table or json)"),
    };
    if json {
        output::print_json(&capture)?;
    } else {
        output::print_table(&capture);
    }

    if let Some(ref path) = args.save_baseline {
        baseline::save(&capture, Path::new(path))?;
        if !json {
            println!("  Baseline saved to {path}");
        }
    }

    if let Some(ref path) = args.baseline {
        let calibration = FileConfig::load(Path::new(path))?.calibration()?;
        let comparisons = baseline::compare(&capture, &calibration, args.threshold);
        let regressions = if json {
            comparisons.iter().filter(|c| c.regression).count()
        } else {
            baseline::print_comparison(&comparisons, args.threshold)
        };
        if regressions > 0 {
            if args.fail_on_regression {
                bail!("{regressions} regression(s) above {}%", args.threshold);
            }
            lwarn!("{} regression(s) above {}%", regressions, args.threshold);
        }
    }

    Ok(())
}

/// Print the kernel command line for a configuration file.
fn cmd_cmdline(args: &cli::CmdlineArgs) -> Result<()> {
    let file = FileConfig::load(Path::new(&args.config))?;
    let kind = match (&args.bench, file.bench) {
        (Some(name), _) => config::bench_kind(name)?,
        (None, Some(kind)) => kind,
        (None, None) => bail!("no benchmark given: set `bench` in {} or pass --bench", args.config),
    };
    println!("{}", corelat_bench::args::render(kind, &file.run, &file.calibration()?));
    Ok(())
}

fn cmd_list() {
    for kind in BenchKind::ALL {
        let metrics: Vec<&str> = kind.metrics().iter().map(|m| m.name()).collect();
        let placement = if kind.cross_core() { "cross-core" } else { "single-core" };
        println!("  {:<14} {:<12} {}", kind.name(), placement, metrics.join(", "));
    }
}
