//! Common utilities and types for the localization core

pub mod angles;

use nalgebra::{Point2, Vector2};

/// A 2D pose in grid cells, heading in radians
///
/// `theta` is not kept in any particular range; use [`angles`] when indexing
/// heading-keyed structures.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub theta: f64,
}

impl Pose {
    /// Create a new pose
    pub fn new(x: f64, y: f64, theta: f64) -> Self {
        Pose { x, y, theta }
    }

    /// Pose at an integer cell coordinate
    pub fn at_cell(x: usize, y: usize, theta: f64) -> Self {
        Pose::new(x as f64, y as f64, theta)
    }

    /// Position as a point
    pub fn position(&self) -> Point2<f64> {
        Point2::new(self.x, self.y)
    }

    /// Unit vector along the heading
    pub fn heading_vector(&self) -> Vector2<f64> {
        angles::unit_vector(self.theta)
    }

    /// Same heading, different position
    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    /// Euclidean distance between the positions of two poses
    pub fn distance_to(&self, other: &Pose) -> f64 {
        nalgebra::distance(&self.position(), &other.position())
    }
}

impl From<(f64, f64, f64)> for Pose {
    fn from((x, y, theta): (f64, f64, f64)) -> Self {
        Pose::new(x, y, theta)
    }
}

impl From<Pose> for (f64, f64, f64) {
    fn from(pose: Pose) -> Self {
        (pose.x, pose.y, pose.theta)
    }
}
