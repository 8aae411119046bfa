//! Kernel resolver
//!
//! One independent unit of work per ball. A unit reads only the previous
//! snapshot and writes only its own output slot, so the units can run in any
//! order or all at once. The same unit is mirrored in `compute/collide.wgsl`.
//!
//! Unlike the sequential resolver, contacts are always de-penetrated and the
//! impulse is applied whether or not the pair is approaching. Several contacts
//! do not accumulate: the last neighbour processed wins.

use rayon::prelude::*;

use super::ball::Ball;
use super::scene::Scene;
use super::{Resolver, check_step_input};
use crate::error::SimResult;

/// Centers closer than this have no usable contact normal
pub const COINCIDENT_EPSILON: f32 = 1e-6;

/// Compute ball `index` of the next snapshot
pub fn resolve_unit(index: usize, input: &[Ball], scene: &Scene, dt: f32) -> Ball {
    let src = input[index];
    let mut out = src;

    for (j, other) in input.iter().enumerate() {
        if j == index {
            continue;
        }
        let n = src.pos - other.pos;
        let distance = n.length();
        let reach = src.radius + other.radius;
        if distance >= reach || distance < COINCIDENT_EPSILON {
            continue;
        }

        // Push half the overlap out along the contact normal
        let overlap = reach - distance;
        out.pos = src.pos + n / distance * (overlap / 2.0);

        // Impulse form of the elastic collision along n
        let src_mass = src.mass();
        let other_mass = other.mass();
        let c = 2.0 * n.dot(other.vel - src.vel) / (n.dot(n) * (1.0 / src_mass + 1.0 / other_mass));
        out.vel = src.vel + n * (c / src_mass);
    }

    out.pos += out.vel * dt;
    reflect_walls(&mut out, scene);
    out
}

/// Clamp into the scene, negating velocity on every wall touched
fn reflect_walls(ball: &mut Ball, scene: &Scene) {
    let r = ball.radius;
    if ball.pos.x - r < 0.0 {
        ball.pos.x = r;
        ball.vel.x = -ball.vel.x;
    }
    if ball.pos.y - r < 0.0 {
        ball.pos.y = r;
        ball.vel.y = -ball.vel.y;
    }
    if ball.pos.x + r >= scene.width {
        ball.pos.x = scene.width - r;
        ball.vel.x = -ball.vel.x;
    }
    if ball.pos.y + r >= scene.height {
        ball.pos.y = scene.height - r;
        ball.vel.y = -ball.vel.y;
    }
}

/// Kernel units fanned out over the rayon worker pool
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuKernel;

impl CpuKernel {
    pub fn new() -> Self {
        Self
    }
}

impl Resolver for CpuKernel {
    fn name(&self) -> &'static str {
        "kernel-cpu"
    }

    fn resolve(&mut self, input: &[Ball], output: &mut [Ball], scene: &Scene, dt: f32) -> SimResult<()> {
        check_step_input(input, output)?;
        output
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, out)| *out = resolve_unit(i, input, scene, dt));
        Ok(())
    }
}
