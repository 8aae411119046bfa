//! Run configuration
//!
//! Consumed once at startup: which backend to run, how many balls, how big
//! the canvas is. Loaded from JSON, with every field optional.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};
use crate::sim::{RadiusRange, Scene};

/// Collision backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Processor {
    /// Single-threaded rotation-based resolver
    Sequential,
    /// Per-ball parallel impulse resolver
    #[default]
    Kernel,
}

impl Processor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Processor::Sequential => "sequential",
            Processor::Kernel => "kernel",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "sequential" | "seq" | "vanilla" => Some(Processor::Sequential),
            "kernel" | "parallel" => Some(Processor::Kernel),
            _ => None,
        }
    }
}

/// Where the kernel resolver's units run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum KernelDevice {
    /// rayon worker pool
    Cpu,
    /// WebGPU compute shader
    #[default]
    Gpu,
}

impl KernelDevice {
    pub fn as_str(&self) -> &'static str {
        match self {
            KernelDevice::Cpu => "cpu",
            KernelDevice::Gpu => "gpu",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "cpu" | "rayon" => Some(KernelDevice::Cpu),
            "gpu" | "webgpu" | "wgpu" => Some(KernelDevice::Gpu),
            _ => None,
        }
    }
}

/// What the binary does with the simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Step continuously, handing snapshots to the render loop
    #[default]
    Render,
    /// Time both backends on the same population
    Benchmark,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Render => "render",
            RunMode::Benchmark => "benchmark",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "render" | "run" => Some(RunMode::Render),
            "benchmark" | "bench" => Some(RunMode::Benchmark),
            _ => None,
        }
    }
}

/// A generated population
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Population {
    pub count: usize,
    pub radius: RadiusRange,
}

/// Benchmark harness settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkConfig {
    pub balls: Population,
    /// Steps timed per backend
    pub iterations: u32,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            balls: Population {
                count: 3000,
                radius: RadiusRange::new(1.0, 5.0),
            },
            iterations: 100,
        }
    }
}

/// Full run configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub processor: Processor,
    pub device: KernelDevice,
    pub mode: RunMode,
    pub canvas: Scene,
    /// Population for render mode
    pub simulation: Population,
    pub benchmark: BenchmarkConfig,
    /// RNG seed for the initial population
    pub seed: u64,
    /// Steps to run in render mode (0 = until interrupted)
    pub steps: u64,
    /// Log snapshot statistics every this many steps (0 = never)
    pub log_every: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            processor: Processor::Kernel,
            device: KernelDevice::Gpu,
            mode: RunMode::Render,
            canvas: Scene::new(2000.0, 2000.0),
            simulation: Population {
                count: 5000,
                radius: RadiusRange::new(1.0, 10.0),
            },
            benchmark: BenchmarkConfig::default(),
            seed: 0x5eed,
            steps: 600,
            log_every: 60,
        }
    }
}

impl SimConfig {
    /// Load from a JSON file; missing fields take their defaults
    pub fn load(path: &Path) -> SimResult<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: SimConfig = serde_json::from_str(&json)?;
        config.validate()?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Write as pretty JSON
    pub fn save(&self, path: &Path) -> SimResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        log::info!("Config saved to {}", path.display());
        Ok(())
    }

    pub fn validate(&self) -> SimResult<()> {
        self.canvas.validate()?;
        self.simulation.radius.validate()?;
        self.benchmark.balls.radius.validate()?;

        let largest = self.simulation.radius.max.max(self.benchmark.balls.radius.max);
        if 2.0 * largest > self.canvas.width.min(self.canvas.height) {
            return Err(SimError::InvalidConfig(format!(
                "radius {} does not fit a {}x{} canvas",
                largest, self.canvas.width, self.canvas.height
            )));
        }
        if self.mode == RunMode::Benchmark && self.benchmark.iterations == 0 {
            return Err(SimError::InvalidConfig("benchmark needs at least one iteration".into()));
        }
        Ok(())
    }

    /// Population used by the selected mode
    pub fn population(&self) -> Population {
        match self.mode {
            RunMode::Render => self.simulation,
            RunMode::Benchmark => self.benchmark.balls,
        }
    }
}
