//! Noisy unicycle motion model shared by the agent and every particle

use super::{Body, MotionCommand};
use crate::common::Pose;
use crate::config::MotionConfig;
use crate::map::OccupancyGrid;
use rand::Rng;
use rand_distr::StandardNormal;

/// Motion model with Gaussian velocity noise
#[derive(Debug, Clone, PartialEq)]
pub struct MotionModel {
    /// Std of the forward velocity noise, cells per second
    pub forward_noise_std: f64,
    /// Std of the angular velocity noise, radians per second
    pub angular_noise_std: f64,
}

impl MotionModel {
    /// Create a new motion model
    pub fn new(forward_noise_std: f64, angular_noise_std: f64) -> Self {
        MotionModel {
            forward_noise_std,
            angular_noise_std,
        }
    }

    pub fn from_config(config: &MotionConfig) -> Self {
        MotionModel::new(config.forward_noise_std, config.angular_noise_std)
    }

    /// Noise-free model
    pub fn exact() -> Self {
        MotionModel::new(0.0, 0.0)
    }

    /// Pose after driving `command` for `dt` seconds
    ///
    /// Position moves along the old heading. A move ending outside the free
    /// space keeps the old position; the rotation is applied either way.
    pub fn advance<R: Rng + ?Sized>(
        &self,
        pose: &Pose,
        command: &MotionCommand,
        dt: f64,
        grid: &OccupancyGrid,
        rng: &mut R,
    ) -> Pose {
        let v = command.forward_velocity + self.noise(self.forward_noise_std, rng);
        let omega = command.angular_velocity + self.noise(self.angular_noise_std, rng);

        let x = pose.x + v * pose.theta.cos() * dt;
        let y = pose.y + v * pose.theta.sin() * dt;
        let theta = pose.theta + omega * dt;

        if grid.is_free_at(x, y) {
            Pose::new(x, y, theta)
        } else {
            Pose::new(pose.x, pose.y, theta)
        }
    }

    /// Advance a body in place
    pub fn apply<B: Body + ?Sized, R: Rng + ?Sized>(
        &self,
        body: &mut B,
        command: &MotionCommand,
        dt: f64,
        grid: &OccupancyGrid,
        rng: &mut R,
    ) {
        let next = self.advance(body.pose(), command, dt, grid, rng);
        *body.pose_mut() = next;
    }

    fn noise<R: Rng + ?Sized>(&self, std: f64, rng: &mut R) -> f64 {
        if std == 0.0 {
            return 0.0;
        }
        let z: f64 = rng.sample(StandardNormal);
        z * std
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::CellCode;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::f64::consts::FRAC_PI_2;

    fn room() -> OccupancyGrid {
        let mut grid = OccupancyGrid::new(10, 10, CellCode::Obstacle).unwrap();
        grid.fill_rect(1..9, 1..9, CellCode::Free);
        grid
    }

    #[test]
    fn test_exact_motion_integrates_unicycle() {
        let mut rng = StdRng::seed_from_u64(0);
        let pose = Pose::new(2.5, 2.5, FRAC_PI_2);
        let next = MotionModel::exact().advance(
            &pose,
            &MotionCommand::new(2.0, 0.5),
            1.5,
            &room(),
            &mut rng,
        );

        assert_relative_eq!(next.x, 2.5, epsilon = 1e-12);
        assert_relative_eq!(next.y, 5.5, epsilon = 1e-12);
        assert_relative_eq!(next.theta, FRAC_PI_2 + 0.75, epsilon = 1e-12);
    }

    #[test]
    fn test_move_into_wall_holds_position_but_turns() {
        let mut rng = StdRng::seed_from_u64(0);
        let pose = Pose::new(8.5, 4.5, 0.0);
        let next = MotionModel::exact().advance(
            &pose,
            &MotionCommand::new(1.0, 0.2),
            1.0,
            &room(),
            &mut rng,
        );

        assert_eq!((next.x, next.y), (8.5, 4.5));
        assert_relative_eq!(next.theta, 0.2);
    }

    #[test]
    fn test_leaving_the_grid_holds_position() {
        let grid = OccupancyGrid::new(3, 3, CellCode::Free).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let mut pose = Pose::new(0.5, 1.5, std::f64::consts::PI);
        MotionModel::exact().apply(&mut pose, &MotionCommand::new(2.0, 0.0), 1.0, &grid, &mut rng);
        assert_eq!((pose.x, pose.y), (0.5, 1.5));
    }

    #[test]
    fn test_noise_spreads_particles() {
        let mut rng = StdRng::seed_from_u64(42);
        let model = MotionModel::new(0.25, 2.0_f64.to_radians());
        let grid = room();
        let start = Pose::new(4.5, 4.5, 0.0);
        let command = MotionCommand::new(1.0, 0.0);

        let xs: Vec<f64> = (0..2000)
            .map(|_| model.advance(&start, &command, 1.0, &grid, &mut rng).x)
            .collect();
        let mean = xs.iter().sum::<f64>() / xs.len() as f64;
        let var = xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / xs.len() as f64;

        assert!((mean - 5.5).abs() < 0.05, "mean {}", mean);
        assert!((var.sqrt() - 0.25).abs() < 0.03, "std {}", var.sqrt());
    }
}
