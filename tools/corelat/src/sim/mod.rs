//! `corelat sim`: the full harness on host threads against [`SimKernel`].
//!
//! One host thread stands in for each core and a ticker thread stands in
//! for the timer interrupt. Everything above the [`Kernel`](corelat_bench::Kernel)
//! and [`CycleClock`] seams is the same code the bare-metal harness runs.

pub mod clock;
pub mod kernel;

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use corelat_bench::{
    BenchKind, ByteSink, Calibration, CoreContext, CoreReport, CycleClock, LogReporter, Reporter,
    Roles, RunConfig, SharedState, publish, run_core,
};
use corelat_core::{CoreId, ldebug, linfo, lwarn};

use crate::cli::SimArgs;
use crate::config::{self, FileConfig};

use clock::HostClock;
use kernel::{CostModel, SimKernel};

/// Iterations when neither a config file nor `--iters` gives a count.
const SIM_ITERATIONS: u64 = 4096;

/// Sanity ceiling when no config file is given. Host threads can be
/// descheduled mid round trip.
const SIM_SANITY_CEILING: u64 = 5_000_000;

/// A simulated machine: kernel, clock, and timer.
#[derive(Debug)]
pub struct Simulation {
    /// The simulated kernel.
    pub kernel: SimKernel,
    /// Clock shared by every simulated core.
    pub clock: HostClock,
    cores: u32,
    tick_period: Option<Duration>,
}

impl Simulation {
    /// Creates a machine with `cores` cores. `tick_period` of `None`
    /// leaves the tick frozen.
    pub fn new(
        cores: u32,
        clock: HostClock,
        costs: CostModel,
        tick_period: Option<Duration>,
    ) -> Self {
        Self {
            kernel: SimKernel::new(cores as usize, clock, costs),
            clock,
            cores,
            tick_period,
        }
    }

    /// Runs `kind` on every core and returns the coordinator's reports.
    pub fn run<R: Reporter + ?Sized>(
        &self,
        kind: BenchKind,
        config: &RunConfig,
        calibration: &Calibration,
        reporter: &R,
    ) -> Result<Vec<CoreReport>> {
        if self.cores == 0 {
            bail!("at least one core is required");
        }
        let participants = self.cores as usize;
        let roles = Roles::plan(kind, participants, config)?;
        let shared = SharedState::new(participants);
        let stop = AtomicBool::new(false);
        reporter.run_started(kind, participants, config);

        let (roles, shared, stop) = (&roles, &shared, &stop);
        let (kernel, clock) = (&self.kernel, &self.clock);
        let results = thread::scope(|s| {
            let ticker = self.tick_period.map(|period| {
                s.spawn(move || {
                    while !stop.load(Ordering::Relaxed) {
                        thread::sleep(period);
                        kernel.tick();
                    }
                })
            });
            let handles: Vec<_> = (0..self.cores)
                .map(|i| {
                    let core = CoreId::new(i);
                    s.spawn(move || {
                        let ctx =
                            CoreContext::new(core, kernel, clock, shared, config, calibration);
                        run_core(kind, roles, ctx)
                    })
                })
                .collect();
            let results: Vec<_> = handles.into_iter().map(|h| h.join()).collect();
            stop.store(true, Ordering::Relaxed);
            if let Some(ticker) = ticker {
                let _ = ticker.join();
            }
            results
        });

        let mut reports = None;
        let mut first_error = None;
        for (core, result) in results.into_iter().enumerate() {
            match result {
                Ok(Ok(Some(r))) => reports = Some(r),
                Ok(Ok(None)) => {}
                Ok(Err(e)) => {
                    first_error.get_or_insert_with(|| anyhow!("core {core}: {e}"));
                }
                Err(_) => bail!("core {core} panicked"),
            }
        }
        if let Some(err) = first_error {
            return Err(err);
        }
        reports.ok_or_else(|| anyhow!("coordinator returned no reports"))
    }
}

/// Reference costs with the file's `[baseline]` entries laid over them.
fn cost_table(calibration: &Calibration) -> Result<Calibration> {
    let mut costs = FileConfig::parse(include_str!("../../calibration/reference.toml"))?
        .calibration()?;
    for (metric, mean) in calibration.iter() {
        costs.set(metric, mean);
    }
    Ok(costs)
}

/// Runs the `sim` subcommand.
pub fn command(args: &SimArgs) -> Result<()> {
    let kind = config::bench_kind(&args.bench)?;
    let file = args
        .config
        .as_deref()
        .map(|path| FileConfig::load(Path::new(path)))
        .transpose()?;

    let mut run = file.as_ref().map_or_else(
        || RunConfig {
            iterations: SIM_ITERATIONS,
            sanity_ceiling: SIM_SANITY_CEILING,
            ..RunConfig::default()
        },
        |f| f.run.clone(),
    );
    if let Some(iters) = args.iters {
        run.iterations = iters;
    }
    let calibration = file
        .as_ref()
        .map(FileConfig::calibration)
        .transpose()?
        .unwrap_or_default();

    let tick_period = (args.tick_us > 0).then(|| Duration::from_micros(args.tick_us));
    if tick_period.is_none()
        && run.tlb_quiescence
        && matches!(kind, BenchKind::Response | BenchKind::MemMap)
    {
        lwarn!("timer disabled, running {} without TLB quiescence", kind.name());
        run.tlb_quiescence = false;
    }
    run.validate()?;

    let cores = u32::try_from(args.cores).context("core count out of range")?;
    let clock = HostClock::new(args.monotonic);
    ldebug!("clock: {} at {} kHz", clock.name(), clock.freq_khz());
    if let Some(period) = tick_period {
        ldebug!("timer period {} cycles", clock.cycles_in(period));
    }
    let costs = CostModel::new(cost_table(&calibration)?, args.cost_pct);
    let sim = Simulation::new(cores, clock, costs, tick_period);

    let reports = sim.run(kind, &run, &calibration, &LogReporter)?;

    let mut stream = Vec::new();
    let sink: Option<&mut dyn ByteSink> = if args.output.is_some() {
        Some(&mut stream)
    } else {
        None
    };
    publish(kind, &reports, &run, &LogReporter, sink, clock.freq_khz());
    if let Some(path) = &args.output {
        std::fs::write(path, &stream).with_context(|| format!("writing {path}"))?;
        linfo!("report stream written to {}", path);
    }

    ldebug!(
        "{} kernel operations, {} failed",
        sim.kernel.invocations(),
        sim.kernel.failures()
    );
    let unbalanced = sim.kernel.unbalanced_cores();
    if !unbalanced.is_empty() {
        lwarn!("kernel state left unbalanced on cores {:?}", unbalanced);
    }
    Ok(())
}
