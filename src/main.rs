//! Ballpit entry point
//!
//! Loads the run configuration, then either steps the simulation (render
//! mode, headless: snapshots are summarised in the log) or benchmarks the
//! backends against each other.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use ballpit::sim::{Simulation, SnapshotStats, populate};
use ballpit::{KernelDevice, Processor, RunMode, SimConfig, SimError, SimResult};

#[derive(Parser, Debug)]
#[command(name = "ballpit", version, about = "Elastic disk collision simulation")]
struct Cli {
    /// JSON config file (built-in defaults when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run mode: render or benchmark
    #[arg(short, long)]
    mode: Option<String>,

    /// Backend: sequential or kernel
    #[arg(short, long)]
    processor: Option<String>,

    /// Kernel device: cpu or gpu
    #[arg(short, long)]
    device: Option<String>,

    /// Ball count for the selected mode
    #[arg(short = 'n', long)]
    balls: Option<usize>,

    /// Steps to run in render mode (0 = forever)
    #[arg(short, long)]
    steps: Option<u64>,

    /// Population seed
    #[arg(long)]
    seed: Option<u64>,

    /// Write the effective configuration here and exit
    #[arg(long)]
    dump_config: Option<PathBuf>,
}

fn parse_choice<T>(value: Option<&str>, parse: fn(&str) -> Option<T>, what: &str) -> SimResult<Option<T>> {
    value
        .map(|v| parse(v).ok_or_else(|| SimError::InvalidConfig(format!("unknown {}: {}", what, v))))
        .transpose()
}

fn build_config(cli: &Cli) -> SimResult<SimConfig> {
    let mut config = match &cli.config {
        Some(path) => SimConfig::load(path)?,
        None => SimConfig::default(),
    };

    if let Some(mode) = parse_choice(cli.mode.as_deref(), RunMode::from_str, "mode")? {
        config.mode = mode;
    }
    if let Some(processor) = parse_choice(cli.processor.as_deref(), Processor::from_str, "processor")? {
        config.processor = processor;
    }
    if let Some(device) = parse_choice(cli.device.as_deref(), KernelDevice::from_str, "device")? {
        config.device = device;
    }
    if let Some(balls) = cli.balls {
        match config.mode {
            RunMode::Render => config.simulation.count = balls,
            RunMode::Benchmark => config.benchmark.balls.count = balls,
        }
    }
    if let Some(steps) = cli.steps {
        config.steps = steps;
    }
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }

    config.validate()?;
    Ok(config)
}

fn run_render(config: &SimConfig) -> SimResult<()> {
    let mut sim = Simulation::from_config(config);
    pollster::block_on(sim.initialize())?;
    let balls = populate(sim.population(), config.simulation.radius, sim.scene(), config.seed)?;
    sim.load(balls)?;

    let initial = SnapshotStats::from_balls(sim.snapshot());
    log::info!(
        "Initial: {} balls, energy {:.1}, momentum {:?}",
        initial.count,
        initial.kinetic_energy,
        initial.momentum
    );

    while config.steps == 0 || sim.steps() < config.steps {
        // The snapshot is what a renderer would draw this frame
        let stats = SnapshotStats::from_balls(sim.step()?);
        if !stats.is_finite() {
            log::warn!("Non-finite state after step {}", sim.steps());
        }
        if config.log_every > 0 && sim.steps() % config.log_every == 0 {
            log::info!(
                "t={:.2}s step {}: energy {:.1}, max speed {:.1}",
                sim.elapsed(),
                sim.steps(),
                stats.kinetic_energy,
                stats.max_speed
            );
        }
    }

    if let Some(first) = sim.snapshot().first() {
        log::debug!(
            "Ball 0 at {:?} heading {:.2} rad, colour {}",
            first.pos,
            first.heading(),
            first.color_hex()
        );
    }
    let last = SnapshotStats::with_overlaps(sim.snapshot());
    log::info!(
        "Finished {} steps ({:.2}s simulated), {} overlapping pairs",
        sim.steps(),
        sim.elapsed(),
        last.overlaps.unwrap_or(0)
    );
    Ok(())
}

fn run(cli: Cli) -> SimResult<()> {
    let config = build_config(&cli)?;

    if let Some(path) = &cli.dump_config {
        return config.save(path);
    }

    log::info!(
        "Mode {}, processor {}, device {}",
        config.mode.as_str(),
        config.processor.as_str(),
        config.device.as_str()
    );

    match config.mode {
        RunMode::Render => run_render(&config),
        RunMode::Benchmark => {
            let report = pollster::block_on(ballpit::bench::run(&config))?;
            report.log();
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();
    log::info!("Ballpit starting...");

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
