//! Backend timing harness
//!
//! Populates one scene and times a fixed number of steps on the sequential
//! resolver and on the kernel resolver, each starting from the same snapshot.

use std::time::{Duration, Instant};

use crate::compute::GpuKernel;
use crate::config::{KernelDevice, SimConfig};
use crate::consts::SIM_DT;
use crate::error::SimResult;
use crate::sim::{Ball, CpuKernel, Resolver, Scene, SequentialResolver, SnapshotStats, populate};

/// Timing for one backend
#[derive(Debug, Clone)]
pub struct BenchResult {
    pub backend: &'static str,
    pub iterations: u32,
    pub total: Duration,
    /// Statistics of the final snapshot
    pub final_stats: SnapshotStats,
}

impl BenchResult {
    pub fn per_step(&self) -> Duration {
        if self.iterations == 0 {
            Duration::ZERO
        } else {
            self.total / self.iterations
        }
    }
}

/// Timings for every backend on one population
#[derive(Debug, Clone)]
pub struct BenchReport {
    pub balls: usize,
    pub results: Vec<BenchResult>,
}

impl BenchReport {
    pub fn log(&self) {
        log::info!("Benchmark: {} balls", self.balls);
        for result in &self.results {
            log::info!(
                "  {:<12} {} steps in {:?} ({:?}/step)",
                result.backend,
                result.iterations,
                result.total,
                result.per_step()
            );
        }
    }
}

/// Step `resolver` `iterations` times from `initial`, timing the whole run
pub fn time_resolver(
    resolver: &mut dyn Resolver,
    initial: &[Ball],
    scene: &Scene,
    iterations: u32,
) -> SimResult<BenchResult> {
    let mut front = initial.to_vec();
    let mut back = initial.to_vec();

    let start = Instant::now();
    for _ in 0..iterations {
        resolver.resolve(&front, &mut back, scene, SIM_DT)?;
        std::mem::swap(&mut front, &mut back);
    }
    let total = start.elapsed();

    Ok(BenchResult {
        backend: resolver.name(),
        iterations,
        total,
        final_stats: SnapshotStats::from_balls(&front),
    })
}

/// Run the configured benchmark
///
/// The kernel runs on the configured device; a missing GPU fails the run
/// rather than quietly timing the CPU kernel instead.
pub async fn run(config: &SimConfig) -> SimResult<BenchReport> {
    let bench = config.benchmark;
    let scene = config.canvas;
    let initial = populate(bench.balls.count, bench.balls.radius, &scene, config.seed)?;

    let mut kernel: Box<dyn Resolver> = match config.device {
        KernelDevice::Cpu => Box::new(CpuKernel::new()),
        KernelDevice::Gpu => Box::new(GpuKernel::new(scene, initial.len(), SIM_DT).await?),
    };

    let mut results = Vec::with_capacity(2);
    results.push(time_resolver(kernel.as_mut(), &initial, &scene, bench.iterations)?);
    results.push(time_resolver(&mut SequentialResolver::new(), &initial, &scene, bench.iterations)?);

    Ok(BenchReport {
        balls: initial.len(),
        results,
    })
}
