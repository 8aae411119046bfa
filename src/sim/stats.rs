//! Snapshot statistics for logs and sanity checks

use glam::Vec2;

use super::ball::Ball;

/// Aggregate quantities over one snapshot
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SnapshotStats {
    pub count: usize,
    pub kinetic_energy: f32,
    pub momentum: Vec2,
    pub max_speed: f32,
    /// Number of overlapping pairs (O(N²), only computed on request)
    pub overlaps: Option<usize>,
}

impl SnapshotStats {
    pub fn from_balls(balls: &[Ball]) -> Self {
        balls.iter().fold(
            Self {
                count: balls.len(),
                ..Default::default()
            },
            |mut acc, b| {
                acc.kinetic_energy += b.kinetic_energy();
                acc.momentum += b.vel * b.mass();
                acc.max_speed = acc.max_speed.max(b.vel.length());
                acc
            },
        )
    }

    /// Same as [`from_balls`](Self::from_balls), plus the overlapping pair count
    pub fn with_overlaps(balls: &[Ball]) -> Self {
        let overlaps = balls
            .iter()
            .enumerate()
            .map(|(i, a)| balls[i + 1..].iter().filter(|b| a.overlaps(b)).count())
            .sum();
        Self {
            overlaps: Some(overlaps),
            ..Self::from_balls(balls)
        }
    }

    /// Whether every aggregate is finite
    pub fn is_finite(&self) -> bool {
        self.kinetic_energy.is_finite() && self.momentum.is_finite() && self.max_speed.is_finite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    #[test]
    fn test_stats_sum() {
        let balls = vec![
            Ball::new(1.0, Vec2::new(0.0, 0.0), Vec2::new(2.0, 0.0), 0),
            Ball::new(1.0, Vec2::new(1.0, 0.0), Vec2::new(0.0, -4.0), 0),
            Ball::new(1.0, Vec2::new(10.0, 0.0), Vec2::ZERO, 0),
        ];
        let stats = SnapshotStats::with_overlaps(&balls);
        assert_eq!(stats.count, 3);
        assert!((stats.kinetic_energy - 0.5 * PI * 20.0).abs() < 1e-4);
        assert!((stats.momentum - Vec2::new(2.0 * PI, -4.0 * PI)).length() < 1e-4);
        assert_eq!(stats.max_speed, 4.0);
        assert_eq!(stats.overlaps, Some(1));
        assert!(stats.is_finite());
    }

    #[test]
    fn test_empty_snapshot() {
        let stats = SnapshotStats::from_balls(&[]);
        assert_eq!(stats.count, 0);
        assert_eq!(stats.kinetic_energy, 0.0);
        assert_eq!(stats.overlaps, None);
    }
}
