//! Control module: motion commands and the bodies they move
pub mod motion_model;

pub use self::motion_model::MotionModel;

use crate::common::Pose;
use crate::perception::sensors::{Scan, SensorModel};
use std::sync::Arc;

/// Commanded velocities, cells per second and radians per second
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotionCommand {
    pub forward_velocity: f64,
    pub angular_velocity: f64,
}

impl MotionCommand {
    /// Create a new motion command
    pub fn new(forward_velocity: f64, angular_velocity: f64) -> Self {
        MotionCommand {
            forward_velocity,
            angular_velocity,
        }
    }

    pub fn stop() -> Self {
        MotionCommand::default()
    }

    /// Whether either velocity is nonzero
    pub fn is_moving(&self) -> bool {
        self.forward_velocity != 0.0 || self.angular_velocity != 0.0
    }
}

/// Anything with a pose the motion model can move
pub trait Body {
    fn pose(&self) -> &Pose;

    fn pose_mut(&mut self) -> &mut Pose;
}

impl Body for Pose {
    fn pose(&self) -> &Pose {
        self
    }

    fn pose_mut(&mut self) -> &mut Pose {
        self
    }
}

/// The rover being localized
///
/// In simulation its pose is the ground truth and its scans come from its own
/// sensor model; on hardware scans are supplied from outside instead.
#[derive(Debug, Clone)]
pub struct Agent {
    pose: Pose,
    command: MotionCommand,
    sensor: Arc<dyn SensorModel>,
}

impl Agent {
    /// Create a new agent
    pub fn new(pose: Pose, sensor: Arc<dyn SensorModel>) -> Self {
        Agent {
            pose,
            command: MotionCommand::stop(),
            sensor,
        }
    }

    pub fn command(&self) -> MotionCommand {
        self.command
    }

    pub fn set_command(&mut self, command: MotionCommand) {
        self.command = command;
    }

    pub fn sensor(&self) -> &Arc<dyn SensorModel> {
        &self.sensor
    }

    /// Scan from the agent's current pose
    pub fn observe(&self) -> Scan {
        self.sensor.scan(&self.pose)
    }
}

impl Body for Agent {
    fn pose(&self) -> &Pose {
        &self.pose
    }

    fn pose_mut(&mut self) -> &mut Pose {
        &mut self.pose
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::{CellCode, OccupancyGrid};
    use crate::perception::sensors::{RayCastParams, RayCastSensor};

    #[test]
    fn test_is_moving() {
        assert!(!MotionCommand::stop().is_moving());
        assert!(MotionCommand::new(0.0, 0.1).is_moving());
        assert!(MotionCommand::new(-1.0, 0.0).is_moving());
    }

    #[test]
    fn test_agent_observes_from_its_pose() {
        let mut grid = OccupancyGrid::new(11, 11, CellCode::Obstacle).unwrap();
        grid.fill_rect(1..10, 1..10, CellCode::Free);
        let params = RayCastParams {
            max_range: 20.0,
            min_range: 0.1,
            origin_offset: 0.0,
            samples_per_beam: 400,
            cells_per_unit: 1.0,
            boundary_blocks_rays: false,
        };
        let sensor = Arc::new(RayCastSensor::new(Arc::new(grid), params, 4));
        let mut agent = Agent::new(Pose::new(5.5, 5.5, 0.0), sensor.clone());

        assert_eq!(agent.observe(), sensor.scan(&Pose::new(5.5, 5.5, 0.0)));

        agent.pose_mut().x = 2.5;
        assert_eq!(agent.observe(), sensor.scan(&Pose::new(2.5, 5.5, 0.0)));
        assert_eq!(agent.observe().beam_count(), 4);
    }
}
