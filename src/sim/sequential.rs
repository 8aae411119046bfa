//! Sequential resolver
//!
//! Single-threaded O(N²) pass. Velocity exchange is approach-gated and done in
//! a rotated frame where the line of centers is the x-axis; positions are never
//! pushed apart. Walls are handled before integration.

use glam::Vec2;

use super::ball::Ball;
use super::scene::Scene;
use super::{Resolver, check_step_input};
use crate::error::SimResult;

/// Scalar CPU backend
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialResolver;

impl SequentialResolver {
    pub fn new() -> Self {
        Self
    }

    /// Compute ball `index` of the next snapshot
    ///
    /// Neighbours are always read from `input`; only this ball's running
    /// velocity carries over from one neighbour to the next.
    pub fn resolve_ball(index: usize, input: &[Ball], scene: &Scene, dt: f32) -> Ball {
        let mut ball = input[index];

        for (j, other) in input.iter().enumerate() {
            if j == index || !ball.overlaps(other) {
                continue;
            }
            ball.vel = exchange_velocity(&ball, other);
        }

        bounce_walls(&mut ball, scene);
        ball.pos += ball.vel * dt;
        ball
    }
}

impl Resolver for SequentialResolver {
    fn name(&self) -> &'static str {
        "sequential"
    }

    fn resolve(&mut self, input: &[Ball], output: &mut [Ball], scene: &Scene, dt: f32) -> SimResult<()> {
        check_step_input(input, output)?;
        for (i, out) in output.iter_mut().enumerate() {
            *out = Self::resolve_ball(i, input, scene, dt);
        }
        Ok(())
    }
}

/// Post-collision velocity of `ball` against `other`
///
/// Returns `ball.vel` unchanged when the pair is already separating.
fn exchange_velocity(ball: &Ball, other: &Ball) -> Vec2 {
    let delta = other.pos - ball.pos;
    let rel = ball.vel - other.vel;
    if rel.dot(delta) < 0.0 {
        return ball.vel;
    }

    let m1 = ball.mass();
    let m2 = other.mass();
    let total = m1 + m2;

    // Rotate so the line of centers lies on +x
    let theta = -delta.y.atan2(delta.x);
    let into_frame = Vec2::from_angle(theta);
    let v1 = into_frame.rotate(ball.vel);
    let v2 = into_frame.rotate(other.vel);

    // 1-D elastic collision along x, tangential component kept
    let u1 = Vec2::new(v1.x * (m1 - m2) / total + v2.x * 2.0 * m2 / total, v1.y);

    Vec2::from_angle(-theta).rotate(u1)
}

/// Snap to the walls, reflecting only while still heading into them
fn bounce_walls(ball: &mut Ball, scene: &Scene) {
    bounce_axis(&mut ball.pos.x, &mut ball.vel.x, ball.radius, scene.width);
    bounce_axis(&mut ball.pos.y, &mut ball.vel.y, ball.radius, scene.height);
}

fn bounce_axis(pos: &mut f32, vel: &mut f32, radius: f32, bound: f32) {
    let at_low = *pos - radius <= 0.0;
    let at_high = *pos + radius >= bound;

    if at_low {
        *pos = radius;
    }
    if at_high {
        *pos = bound - radius;
    }
    if (at_low && *vel < 0.0) || (at_high && *vel > 0.0) {
        *vel = -*vel;
    }
}
