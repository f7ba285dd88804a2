//! Ray-cast sensor model
//!
//! Simulates a lidar by marching sample points outward along each beam until
//! one lands in a blocking cell. Positions are only truncated to cells for the
//! occupancy check, so reported ranges are continuous even though hits are
//! quantized to the grid.
//!
//! This is the expensive path: `beam_count × samples_per_beam` grid lookups
//! per scan. Particles normally read a [`LookupTable`](super::LookupTable)
//! built from it instead.

use super::{Scan, SensorModel};
use crate::common::angles;
use crate::common::Pose;
use crate::config::SensorConfig;
use crate::map::{CellCode, OccupancyGrid};
use std::sync::Arc;

/// Geometry of a single ray
#[derive(Debug, Clone, PartialEq)]
pub struct RayCastParams {
    /// Longest reported range, in units
    pub max_range: f64,
    /// Shortest reported range, in units
    pub min_range: f64,
    /// Lidar mount distance from the pose along each beam, in units
    pub origin_offset: f64,
    /// Samples spread evenly over `[0, max_range]`
    pub samples_per_beam: usize,
    /// Grid cells per unit
    pub cells_per_unit: f64,
    /// Stop on `Boundary` cells too
    pub boundary_blocks_rays: bool,
}

impl RayCastParams {
    pub fn from_config(config: &SensorConfig, cells_per_unit: usize) -> Self {
        RayCastParams {
            max_range: config.max_range,
            min_range: config.min_range,
            origin_offset: config.origin_offset,
            samples_per_beam: config.samples_per_beam.max(2),
            cells_per_unit: cells_per_unit as f64,
            boundary_blocks_rays: config.boundary_blocks_rays,
        }
    }

    fn blocks(&self, code: CellCode) -> bool {
        match code {
            CellCode::Obstacle => true,
            CellCode::Boundary => self.boundary_blocks_rays,
            CellCode::Free => false,
        }
    }
}

/// Range along one absolute heading from a position in cells
pub fn cast_ray(grid: &OccupancyGrid, params: &RayCastParams, x: f64, y: f64, heading: f64) -> f64 {
    let direction = angles::unit_vector(heading);
    let scale = params.cells_per_unit;
    let origin = nalgebra::Point2::new(x, y) + direction * (params.origin_offset * scale);
    let reach = params.max_range * scale;
    let last = (params.samples_per_beam - 1) as f64;

    for i in 0..params.samples_per_beam {
        let travelled = reach * i as f64 / last;
        let sample = origin + direction * travelled;
        match grid.cell_at(sample.x, sample.y) {
            // left the map without a hit
            None => break,
            Some(code) if params.blocks(code) => {
                return (travelled / scale).clamp(params.min_range, params.max_range);
            }
            Some(_) => {}
        }
    }

    params.max_range
}

/// Sensor model that ray-casts every beam against the grid
#[derive(Debug, Clone)]
pub struct RayCastSensor {
    grid: Arc<OccupancyGrid>,
    params: RayCastParams,
    beam_count: usize,
}

impl RayCastSensor {
    /// Create a new ray-cast sensor
    pub fn new(grid: Arc<OccupancyGrid>, params: RayCastParams, beam_count: usize) -> Self {
        RayCastSensor {
            grid,
            params,
            beam_count,
        }
    }

    pub fn params(&self) -> &RayCastParams {
        &self.params
    }

    pub fn grid(&self) -> &OccupancyGrid {
        &self.grid
    }

    /// Range along one absolute heading from `pose`'s position
    pub fn cast(&self, pose: &Pose, heading: f64) -> f64 {
        cast_ray(&self.grid, &self.params, pose.x, pose.y, heading)
    }
}

impl SensorModel for RayCastSensor {
    fn name(&self) -> &str {
        "ray_cast"
    }

    fn beam_count(&self) -> usize {
        self.beam_count
    }

    fn scan(&self, pose: &Pose) -> Scan {
        let ranges = (0..self.beam_count)
            .map(|i| self.cast(pose, pose.theta + angles::beam_offset(i, self.beam_count)))
            .collect();
        Scan::new(ranges)
    }
}
