//! Ball record
//!
//! A rigid 2-D disk. Mass is derived from the radius (uniform areal density)
//! and never stored, so it cannot drift from the radius.

use std::f32::consts::PI;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::MAX_COLOR;
use crate::error::{SimError, SimResult};

/// A single disk in the scene
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ball {
    pub radius: f32,
    pub pos: Vec2,
    pub vel: Vec2,
    /// 24-bit RGB colour code
    pub color: u32,
}

impl Ball {
    pub fn new(radius: f32, pos: Vec2, vel: Vec2, color: u32) -> Self {
        Self {
            radius,
            pos,
            vel,
            color,
        }
    }

    /// Disk mass, `π·r²`
    #[inline]
    pub fn mass(&self) -> f32 {
        debug_assert!(self.radius > 0.0, "ball radius must be positive");
        PI * self.radius * self.radius
    }

    /// Euclidean distance between centers
    #[inline]
    pub fn distance_to(&self, other: &Ball) -> f32 {
        self.pos.distance(other.pos)
    }

    /// Whether the two disks overlap (touching does not count)
    #[inline]
    pub fn overlaps(&self, other: &Ball) -> bool {
        self.distance_to(other) < self.radius + other.radius
    }

    /// Direction of travel in radians, for drawing the heading wedge
    pub fn heading(&self) -> f32 {
        crate::heading(self.vel)
    }

    /// Colour as a CSS hex string (`#rrggbb`)
    pub fn color_hex(&self) -> String {
        format!("#{:06x}", self.color & MAX_COLOR)
    }

    /// Kinetic energy, `½·m·|v|²`
    pub fn kinetic_energy(&self) -> f32 {
        0.5 * self.mass() * self.vel.length_squared()
    }

    /// Reject states the physics cannot handle
    ///
    /// `index` is the ball's slot in its snapshot, reported in the error.
    pub fn validate(&self, index: usize) -> SimResult<()> {
        let reason = if !self.radius.is_finite() || self.radius <= 0.0 {
            Some(format!("radius must be positive and finite, got {}", self.radius))
        } else if !self.pos.is_finite() {
            Some(format!("non-finite position {:?}", self.pos))
        } else if !self.vel.is_finite() {
            Some(format!("non-finite velocity {:?}", self.vel))
        } else if self.color > MAX_COLOR {
            Some(format!("colour {:#x} exceeds 24 bits", self.color))
        } else {
            None
        };

        match reason {
            Some(reason) => Err(SimError::InvalidBallState { index, reason }),
            None => Ok(()),
        }
    }
}

/// Validate every ball of a snapshot, failing on the first bad one
pub fn validate_snapshot(balls: &[Ball]) -> SimResult<()> {
    balls
        .iter()
        .enumerate()
        .try_for_each(|(i, ball)| ball.validate(i))
}
