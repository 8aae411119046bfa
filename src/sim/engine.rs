//! Step orchestrator
//!
//! `Simulation` owns the selected backend, the scene and two snapshot
//! buffers. Each step reads the front buffer, has the resolver fill the back
//! buffer, then swaps them. The backend is chosen once and never changes.
//!
//! Lifecycle: `Uninitialized -> Ready -> (Stepping <-> Ready)*`. A lost
//! backend drops back to `Uninitialized`; re-initializing is the caller's call.

use super::ball::{Ball, validate_snapshot};
use super::kernel::CpuKernel;
use super::record::{decode, encode};
use super::scene::Scene;
use super::sequential::SequentialResolver;
use super::Resolver;
use crate::compute::GpuKernel;
use crate::config::{KernelDevice, Processor, SimConfig};
use crate::consts::{RECORD_STRIDE, SIM_DT};
use crate::error::{SimError, SimResult};

/// Orchestrator lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimPhase {
    /// No backend acquired yet
    Uninitialized,
    /// Backend acquired, waiting for a step
    Ready,
    /// A step is in flight
    ///
    /// Only held inside `step`, so callers between steps see `Ready`.
    Stepping,
}

pub struct Simulation {
    processor: Processor,
    device: KernelDevice,
    scene: Scene,
    /// Fixed ball count for the run
    population: usize,
    dt: f32,
    phase: SimPhase,
    resolver: Option<Box<dyn Resolver>>,
    /// Current snapshot
    front: Vec<Ball>,
    /// Scratch snapshot the resolver writes into
    back: Vec<Ball>,
    loaded: bool,
    steps: u64,
    /// Backend was handed in by the caller and cannot be rebuilt here
    injected: bool,
}

impl Simulation {
    /// Create an un-initialized simulation for `population` balls
    pub fn new(processor: Processor, device: KernelDevice, scene: Scene, population: usize) -> Self {
        Self {
            processor,
            device,
            scene,
            population,
            dt: SIM_DT,
            phase: SimPhase::Uninitialized,
            resolver: None,
            front: Vec::new(),
            back: Vec::new(),
            loaded: false,
            steps: 0,
            injected: false,
        }
    }

    /// Create from the run configuration (population of the selected mode)
    pub fn from_config(config: &SimConfig) -> Self {
        Self::new(
            config.processor,
            config.device,
            config.canvas,
            config.population().count,
        )
    }

    /// Create around an already-built resolver; starts out `Ready`
    ///
    /// The resolver is the backend for the whole run. If it is lost,
    /// `initialize` fails with `CapabilityUnavailable` instead of building
    /// a different one.
    pub fn with_resolver(resolver: Box<dyn Resolver>, scene: Scene, population: usize) -> Self {
        let mut sim = Self::new(Processor::Kernel, KernelDevice::Cpu, scene, population);
        log::info!("Simulation ready with {} backend", resolver.name());
        sim.resolver = Some(resolver);
        sim.phase = SimPhase::Ready;
        sim.injected = true;
        sim
    }

    /// Acquire the backend (GPU device and pipeline for the GPU kernel)
    ///
    /// A no-op once `Ready`. Failure leaves the simulation `Uninitialized`
    /// and is not retried.
    pub async fn initialize(&mut self) -> SimResult<()> {
        if self.phase != SimPhase::Uninitialized {
            return Ok(());
        }
        if self.injected {
            return Err(SimError::CapabilityUnavailable(
                "caller-supplied backend was lost and cannot be rebuilt".into(),
            ));
        }
        self.scene.validate()?;

        let resolver: Box<dyn Resolver> = match (self.processor, self.device) {
            (Processor::Sequential, _) => Box::new(SequentialResolver::new()),
            (Processor::Kernel, KernelDevice::Cpu) => Box::new(CpuKernel::new()),
            (Processor::Kernel, KernelDevice::Gpu) => {
                let kernel = GpuKernel::new(self.scene, self.population, self.dt).await?;
                log::info!("Compute adapter: {}", kernel.adapter_name());
                Box::new(kernel)
            }
        };

        log::info!(
            "Simulation ready: {} backend, {} balls, {}x{} scene",
            resolver.name(),
            self.population,
            self.scene.width,
            self.scene.height
        );
        self.resolver = Some(resolver);
        self.phase = SimPhase::Ready;
        Ok(())
    }

    /// Install a snapshot as the current state
    pub fn load(&mut self, snapshot: Vec<Ball>) -> SimResult<()> {
        self.check_count(snapshot.len())?;
        validate_snapshot(&snapshot)?;
        self.back.clone_from(&snapshot);
        self.front = snapshot;
        self.loaded = true;
        Ok(())
    }

    /// Advance the current snapshot by one fixed timestep
    pub fn step(&mut self) -> SimResult<&[Ball]> {
        if !self.loaded {
            return Err(SimError::NotReady("no snapshot loaded"));
        }
        let resolver = match (self.phase, self.resolver.as_mut()) {
            (SimPhase::Ready, Some(resolver)) => resolver,
            _ => return Err(SimError::NotReady("backend not initialized")),
        };

        self.phase = SimPhase::Stepping;
        let result = resolver.resolve(&self.front, &mut self.back, &self.scene, self.dt);

        match result {
            Ok(()) => {
                std::mem::swap(&mut self.front, &mut self.back);
                self.steps += 1;
                self.phase = SimPhase::Ready;
                log::trace!("Step {} done", self.steps);
                Ok(&self.front)
            }
            Err(SimError::BackendLost(msg)) => {
                log::error!("Backend lost at step {}: {}", self.steps + 1, msg);
                self.resolver = None;
                self.phase = SimPhase::Uninitialized;
                Err(SimError::BackendLost(msg))
            }
            Err(e) => {
                self.phase = SimPhase::Ready;
                Err(e)
            }
        }
    }

    /// Step from a caller-supplied snapshot; the result is the new state
    pub fn step_snapshot(&mut self, snapshot: &[Ball]) -> SimResult<Vec<Ball>> {
        self.load(snapshot.to_vec())?;
        self.step().map(|balls| balls.to_vec())
    }

    /// Step a flat `N x 8` f32 buffer
    pub fn step_buffer(&mut self, floats: &[f32]) -> SimResult<Vec<f32>> {
        let expected = self.population * RECORD_STRIDE;
        if floats.len() != expected {
            return Err(SimError::InvalidBufferShape {
                expected,
                actual: floats.len(),
            });
        }
        let balls = decode(floats)?;
        self.load(balls)?;
        self.step().map(encode)
    }

    fn check_count(&self, count: usize) -> SimResult<()> {
        if count != self.population {
            return Err(SimError::InvalidBufferShape {
                expected: self.population * RECORD_STRIDE,
                actual: count * RECORD_STRIDE,
            });
        }
        Ok(())
    }

    /// Current snapshot
    pub fn snapshot(&self) -> &[Ball] {
        &self.front
    }

    pub fn phase(&self) -> SimPhase {
        self.phase
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn population(&self) -> usize {
        self.population
    }

    /// Steps completed since creation
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Simulated seconds elapsed
    pub fn elapsed(&self) -> f64 {
        self.steps as f64 * f64::from(self.dt)
    }

    /// Name of the active backend, if initialized
    pub fn backend_name(&self) -> Option<&'static str> {
        self.resolver.as_ref().map(|r| r.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::scene::{RadiusRange, populate};
    use glam::Vec2;

    fn scene() -> Scene {
        Scene::new(400.0, 400.0)
    }

    fn ready(processor: Processor, population: usize) -> Simulation {
        let mut sim = Simulation::new(processor, KernelDevice::Cpu, scene(), population);
        pollster::block_on(sim.initialize()).unwrap();
        sim
    }

    /// Fails every step as if the device disappeared
    struct LostDevice;

    impl Resolver for LostDevice {
        fn name(&self) -> &'static str {
            "lost"
        }

        fn resolve(&mut self, _: &[Ball], _: &mut [Ball], _: &Scene, _: f32) -> SimResult<()> {
            Err(SimError::BackendLost("device removed".into()))
        }
    }

    #[test]
    fn test_step_before_initialize() {
        let mut sim = Simulation::new(Processor::Sequential, KernelDevice::Cpu, scene(), 2);
        assert_eq!(sim.phase(), SimPhase::Uninitialized);
        let balls = populate(2, RadiusRange::new(1.0, 2.0), &scene(), 1).unwrap();
        sim.load(balls).unwrap();
        assert!(matches!(sim.step(), Err(SimError::NotReady(_))));
    }

    #[test]
    fn test_step_before_load() {
        let mut sim = ready(Processor::Sequential, 2);
        assert_eq!(sim.phase(), SimPhase::Ready);
        assert!(matches!(sim.step(), Err(SimError::NotReady(_))));
    }

    #[test]
    fn test_steps_match_direct_resolver() {
        let balls = populate(64, RadiusRange::new(1.0, 8.0), &scene(), 3).unwrap();
        let mut sim = ready(Processor::Sequential, 64);
        sim.load(balls.clone()).unwrap();

        let mut expected = balls;
        for _ in 0..5 {
            expected = SequentialResolver.advance(&expected, &scene(), SIM_DT).unwrap();
            sim.step().unwrap();
        }
        assert_eq!(sim.snapshot(), expected.as_slice());
        assert_eq!(sim.steps(), 5);
        assert!((sim.elapsed() - 5.0 / 60.0).abs() < 1e-6);
        assert_eq!(sim.phase(), SimPhase::Ready);
    }

    #[test]
    fn test_cpu_kernel_backend() {
        let balls = populate(32, RadiusRange::new(1.0, 8.0), &scene(), 4).unwrap();
        let mut sim = ready(Processor::Kernel, 32);
        assert_eq!(sim.backend_name(), Some("kernel-cpu"));
        let next = sim.step_snapshot(&balls).unwrap();
        assert_eq!(next, CpuKernel.advance(&balls, &scene(), SIM_DT).unwrap());
    }

    #[test]
    fn test_population_mismatch() {
        let mut sim = ready(Processor::Sequential, 4);
        let balls = populate(3, RadiusRange::new(1.0, 2.0), &scene(), 1).unwrap();
        assert!(matches!(
            sim.load(balls),
            Err(SimError::InvalidBufferShape { expected: 32, actual: 24 })
        ));
    }

    #[test]
    fn test_step_buffer_shape_and_state_errors() {
        let mut sim = ready(Processor::Sequential, 2);
        assert!(matches!(
            sim.step_buffer(&[1.0; 15]),
            Err(SimError::InvalidBufferShape { expected: 16, actual: 15 })
        ));

        let mut balls = populate(2, RadiusRange::new(1.0, 2.0), &scene(), 1).unwrap();
        balls[1].radius = -1.0;
        assert!(matches!(
            sim.step_buffer(&encode(&balls)),
            Err(SimError::InvalidBallState { index: 1, .. })
        ));
        assert_eq!(sim.steps(), 0);
    }

    #[test]
    fn test_step_buffer_round() {
        let mut sim = ready(Processor::Sequential, 1);
        let ball = Ball::new(5.0, Vec2::new(100.0, 100.0), Vec2::new(60.0, 0.0), 0x00ff00);
        let out = sim.step_buffer(&encode(&[ball])).unwrap();
        assert_eq!(out.len(), RECORD_STRIDE);
        assert!((out[2] - 101.0).abs() < 1e-4);
        assert_eq!(out[6], 0x00ff00 as f32);
    }

    #[test]
    fn test_backend_lost_resets_to_uninitialized() {
        let balls = populate(2, RadiusRange::new(1.0, 2.0), &scene(), 1).unwrap();
        let mut sim = Simulation::with_resolver(Box::new(LostDevice), scene(), 2);
        sim.load(balls).unwrap();

        assert!(matches!(sim.step(), Err(SimError::BackendLost(_))));
        assert_eq!(sim.phase(), SimPhase::Uninitialized);
        assert_eq!(sim.backend_name(), None);
        assert!(matches!(sim.step(), Err(SimError::NotReady(_))));
    }

    #[test]
    fn test_lost_injected_backend_is_not_replaced() {
        let balls = populate(2, RadiusRange::new(1.0, 2.0), &scene(), 1).unwrap();
        let mut sim = Simulation::with_resolver(Box::new(LostDevice), scene(), 2);
        assert_eq!(sim.backend_name(), Some("lost"));
        sim.load(balls).unwrap();
        assert!(matches!(sim.step(), Err(SimError::BackendLost(_))));

        assert!(matches!(
            pollster::block_on(sim.initialize()),
            Err(SimError::CapabilityUnavailable(_))
        ));
        assert_eq!(sim.phase(), SimPhase::Uninitialized);
        assert_eq!(sim.backend_name(), None);
        assert!(matches!(sim.step(), Err(SimError::NotReady(_))));
    }

    #[test]
    fn test_phase_between_steps_is_ready() {
        let balls = populate(8, RadiusRange::new(1.0, 4.0), &scene(), 6).unwrap();
        let mut sim = ready(Processor::Kernel, 8);
        sim.load(balls).unwrap();
        for _ in 0..3 {
            sim.step().unwrap();
            assert_eq!(sim.phase(), SimPhase::Ready);
        }
        assert_eq!(sim.population(), 8);
        assert_eq!(sim.scene(), &scene());
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let mut sim = ready(Processor::Sequential, 0);
        pollster::block_on(sim.initialize()).unwrap();
        assert_eq!(sim.phase(), SimPhase::Ready);
        sim.load(Vec::new()).unwrap();
        assert!(sim.step().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_scene_fails_initialize() {
        let mut sim = Simulation::new(Processor::Sequential, KernelDevice::Cpu, Scene::new(-1.0, 10.0), 0);
        assert!(pollster::block_on(sim.initialize()).is_err());
        assert_eq!(sim.phase(), SimPhase::Uninitialized);
    }
}
