//! Ballpit - elastic disk collisions in a rectangular scene
//!
//! Core modules:
//! - `sim`: Ball records, scene bounds, resolvers and the step orchestrator
//! - `compute`: WebGPU compute dispatch for the kernel resolver
//! - `config`: Run configuration (backend choice, population, canvas)
//! - `bench`: Timing harness comparing the backends

pub mod bench;
pub mod compute;
pub mod config;
pub mod error;
pub mod sim;

pub use config::{KernelDevice, Processor, RunMode, SimConfig};
pub use error::{SimError, SimResult};

/// Simulation constants
pub mod consts {
    /// Fixed simulation timestep (60 Hz)
    pub const SIM_DT: f32 = 1.0 / 60.0;

    /// Number of f32 fields per ball in the flat buffer
    pub const RECORD_STRIDE: usize = 8;

    /// Largest colour code (24-bit RGB)
    pub const MAX_COLOR: u32 = 0x00FF_FFFF;

    /// Velocity component range used when populating a scene
    pub const SPAWN_SPEED: f32 = 100.0;

    /// Threads per workgroup in the collision shader
    pub const WORKGROUP_SIZE: u32 = 64;
}

/// Direction of travel for a velocity, in radians
///
/// Matches the renderer's convention: zero velocity points along +x.
#[inline]
pub fn heading(vel: glam::Vec2) -> f32 {
    vel.y.atan2(vel.x)
}
