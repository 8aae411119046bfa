//! Scene bounds and initial population
//!
//! The scene is the rectangle `[0, width] x [0, height]`. It is fixed for a
//! run and shared read-only by every resolver.

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::ball::Ball;
use crate::consts::{MAX_COLOR, SPAWN_SPEED};
use crate::error::{SimError, SimResult};

/// Scene rectangle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub width: f32,
    pub height: f32,
}

impl Default for Scene {
    fn default() -> Self {
        Self {
            width: 2000.0,
            height: 2000.0,
        }
    }
}

impl Scene {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }

    pub fn validate(&self) -> SimResult<()> {
        if !(self.width.is_finite() && self.height.is_finite()) || self.width <= 0.0 || self.height <= 0.0 {
            return Err(SimError::InvalidConfig(format!(
                "scene must have positive size, got {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }

    /// Whether the whole disk lies inside the scene, allowing `slack` on each side
    pub fn contains(&self, ball: &Ball, slack: f32) -> bool {
        let r = ball.radius;
        ball.pos.x >= r - slack
            && ball.pos.x <= self.width - r + slack
            && ball.pos.y >= r - slack
            && ball.pos.y <= self.height - r + slack
    }
}

/// Inclusive radius range for generated balls
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RadiusRange {
    pub min: f32,
    pub max: f32,
}

impl RadiusRange {
    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub fn validate(&self) -> SimResult<()> {
        if !(self.min > 0.0 && self.min <= self.max && self.max.is_finite()) {
            return Err(SimError::InvalidConfig(format!(
                "radius range must satisfy 0 < min <= max, got {}..{}",
                self.min, self.max
            )));
        }
        Ok(())
    }
}

/// Fill a scene with `count` random balls
///
/// Positions are uniform over the whole rectangle, so balls may start
/// overlapping each other or a wall; the resolvers sort that out on the
/// first steps. The same seed always yields the same snapshot.
pub fn populate(count: usize, radius: RadiusRange, scene: &Scene, seed: u64) -> SimResult<Vec<Ball>> {
    radius.validate()?;
    scene.validate()?;

    let mut rng = Pcg32::seed_from_u64(seed);
    let balls = (0..count)
        .map(|_| {
            let r = rng.random_range(radius.min..=radius.max);
            let pos = Vec2::new(
                rng.random_range(0.0..=scene.width),
                rng.random_range(0.0..=scene.height),
            );
            let vel = Vec2::new(
                rng.random_range(-SPAWN_SPEED..=SPAWN_SPEED),
                rng.random_range(-SPAWN_SPEED..=SPAWN_SPEED),
            );
            let color = rng.random_range(0..=MAX_COLOR);
            Ball::new(r, pos, vel, color)
        })
        .collect();

    log::debug!("Populated {} balls (seed {})", count, seed);
    Ok(balls)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_populate_is_seeded() {
        let scene = Scene::new(500.0, 300.0);
        let range = RadiusRange::new(1.0, 10.0);
        let a = populate(100, range, &scene, 42).unwrap();
        let b = populate(100, range, &scene, 42).unwrap();
        let c = populate(100, range, &scene, 43).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_populate_respects_ranges() {
        let scene = Scene::new(500.0, 300.0);
        let range = RadiusRange::new(2.0, 5.0);
        let balls = populate(500, range, &scene, 7).unwrap();
        assert_eq!(balls.len(), 500);
        for (i, ball) in balls.iter().enumerate() {
            assert!(ball.validate(i).is_ok());
            assert!(ball.radius >= 2.0 && ball.radius <= 5.0);
            assert!(ball.pos.x >= 0.0 && ball.pos.x <= 500.0);
            assert!(ball.pos.y >= 0.0 && ball.pos.y <= 300.0);
            assert!(ball.vel.x.abs() <= SPAWN_SPEED && ball.vel.y.abs() <= SPAWN_SPEED);
        }
    }

    #[test]
    fn test_populate_fixed_radius() {
        let scene = Scene::default();
        let balls = populate(10, RadiusRange::new(3.0, 3.0), &scene, 1).unwrap();
        assert!(balls.iter().all(|b| b.radius == 3.0));
    }

    #[test]
    fn test_populate_rejects_bad_input() {
        let scene = Scene::default();
        assert!(populate(10, RadiusRange::new(0.0, 3.0), &scene, 1).is_err());
        assert!(populate(10, RadiusRange::new(5.0, 3.0), &scene, 1).is_err());
        assert!(populate(10, RadiusRange::new(1.0, 3.0), &Scene::new(0.0, 10.0), 1).is_err());
    }

    #[test]
    fn test_contains_with_slack() {
        let scene = Scene::new(100.0, 100.0);
        let ball = Ball::new(5.0, Vec2::new(4.0, 50.0), Vec2::ZERO, 0);
        assert!(!scene.contains(&ball, 0.0));
        assert!(scene.contains(&ball, 1.0));
    }
}
