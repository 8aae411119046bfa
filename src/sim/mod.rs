//! Deterministic simulation module
//!
//! Ball state, scene bounds and the collision resolvers. Every resolver reads
//! one complete snapshot and writes one complete new snapshot:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Ball index identifies the same ball across steps

pub mod ball;
pub mod engine;
pub mod kernel;
pub mod record;
pub mod scene;
pub mod sequential;
pub mod stats;

pub use ball::{Ball, validate_snapshot};
pub use engine::{SimPhase, Simulation};
pub use kernel::{CpuKernel, resolve_unit};
pub use record::{BallRecord, decode, encode, from_le_bytes, to_le_bytes};
pub use scene::{RadiusRange, Scene, populate};
pub use sequential::SequentialResolver;
pub use stats::SnapshotStats;

use crate::consts::RECORD_STRIDE;
use crate::error::{SimError, SimResult};

/// A collision backend
///
/// Reads all of `input`, writes every slot of `output`. The two slices have
/// the same length; `output` is scratch space whose prior contents are ignored.
/// An input ball with a non-positive radius or non-finite state fails the
/// step with `InvalidBallState` and leaves `output` untouched.
pub trait Resolver: Send {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Advance `input` by `dt` into `output`
    fn resolve(&mut self, input: &[Ball], output: &mut [Ball], scene: &Scene, dt: f32) -> SimResult<()>;

    /// Advance a snapshot into a freshly allocated one
    fn advance(&mut self, input: &[Ball], scene: &Scene, dt: f32) -> SimResult<Vec<Ball>> {
        let mut output = input.to_vec();
        self.resolve(input, &mut output, scene, dt)?;
        Ok(output)
    }
}

/// Output slots must pair one-to-one with input balls, and every input ball
/// must be physically valid (positive radius, finite state)
pub(crate) fn check_step_input(input: &[Ball], output: &[Ball]) -> SimResult<()> {
    if input.len() != output.len() {
        return Err(SimError::InvalidBufferShape {
            expected: input.len() * RECORD_STRIDE,
            actual: output.len() * RECORD_STRIDE,
        });
    }
    validate_snapshot(input)
}
