//! Ranging sensor models
//!
//! A [`SensorModel`] turns a pose into the scan a lidar mounted on it would
//! report. The agent and the particles use the same interface and differ only
//! in the strategy behind it: [`RayCastSensor`] marches rays through the grid,
//! [`LookupSensor`] reads a precomputed [`LookupTable`].

pub mod lookup_table;
pub mod raycast;
pub mod serial;

pub use self::lookup_table::{LookupSensor, LookupTable, LookupTableBuilder};
pub use self::raycast::{RayCastParams, RayCastSensor};

use crate::common::angles;
use crate::common::Pose;
use crate::config::SensorConfig;
use crate::error::{LocalizationError, Result};
use crate::map::OccupancyGrid;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;

/// Which sensor model strategy to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    RayCast,
    Lookup,
}

/// Trait for ranging sensor models
pub trait SensorModel: Debug + Send + Sync {
    /// Get the sensor model name
    fn name(&self) -> &str;

    /// Number of beams in every scan this model produces
    fn beam_count(&self) -> usize;

    /// Scan as seen from `pose`
    fn scan(&self, pose: &Pose) -> Scan;
}

/// One sweep of range readings
///
/// Beam `i` points `360 * i / beam_count` degrees counter-clockwise of the
/// pose heading. A beam may be marked as having no reading behind it; such
/// beams still carry a placeholder range but take no part in weighting.
#[derive(Debug, Clone, PartialEq)]
pub struct Scan {
    ranges: Vec<f64>,
    valid: Vec<bool>,
}

impl Scan {
    /// Wrap readings that are already within range
    pub fn new(ranges: Vec<f64>) -> Self {
        let valid = vec![true; ranges.len()];
        Scan { ranges, valid }
    }

    /// Clamp every reading into `[min_range, max_range]`
    pub fn clamped(ranges: Vec<f64>, min_range: f64, max_range: f64) -> Self {
        Scan::new(
            ranges
                .into_iter()
                .map(|r| r.clamp(min_range, max_range))
                .collect(),
        )
    }

    /// Readings with a per-beam flag for whether anything was measured
    ///
    /// `valid` shorter than `ranges` leaves the remaining beams invalid.
    pub fn with_mask(ranges: Vec<f64>, valid: Vec<bool>) -> Self {
        let valid = (0..ranges.len())
            .map(|i| valid.get(i).copied().unwrap_or(false))
            .collect();
        Scan { ranges, valid }
    }

    pub fn ranges(&self) -> &[f64] {
        &self.ranges
    }

    pub fn beam_count(&self) -> usize {
        self.ranges.len()
    }

    /// Whether beam `i` holds a real reading
    pub fn is_valid(&self, i: usize) -> bool {
        self.valid.get(i).copied().unwrap_or(false)
    }

    /// Number of beams holding a real reading
    pub fn valid_count(&self) -> usize {
        self.valid.iter().filter(|&&v| v).count()
    }

    /// `(offset in radians, range)` pairs
    pub fn beams(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        let count = self.ranges.len();
        self.ranges
            .iter()
            .enumerate()
            .map(move |(i, &range)| (angles::beam_offset(i, count), range))
    }

    /// Ranges of the beams holding a real reading, with their beam index
    pub fn valid_ranges(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.ranges
            .iter()
            .zip(&self.valid)
            .enumerate()
            .filter(|(_, (_, &valid))| valid)
            .map(|(i, (&range, _))| (i, range))
    }
}

/// Build the sensor model selected by `kind`
///
/// The lookup strategy needs a table; asking for it without one is an error,
/// never a silent switch to ray-casting.
pub fn build_sensor(
    kind: SensorKind,
    config: &SensorConfig,
    cells_per_unit: usize,
    grid: &Arc<OccupancyGrid>,
    table: Option<&Arc<LookupTable>>,
    table_path: &std::path::Path,
) -> Result<Arc<dyn SensorModel>> {
    match kind {
        SensorKind::RayCast => Ok(Arc::new(RayCastSensor::new(
            Arc::clone(grid),
            RayCastParams::from_config(config, cells_per_unit),
            config.beam_count,
        ))),
        SensorKind::Lookup => match table {
            Some(table) => Ok(Arc::new(LookupSensor::new(
                Arc::clone(table),
                config.beam_count,
            ))),
            None => Err(LocalizationError::LookupTableMissing {
                path: table_path.to_path_buf(),
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::path::Path;

    #[test]
    fn test_scan_clamps_and_orders_beams() {
        let scan = Scan::clamped(vec![0.1, 5.0, 99.0, 2.0], 1.0, 10.0);
        assert_eq!(scan.ranges(), &[1.0, 5.0, 10.0, 2.0]);

        let beams: Vec<_> = scan.beams().collect();
        assert_relative_eq!(beams[1].0, std::f64::consts::FRAC_PI_2);
        assert_relative_eq!(beams[3].0, 3.0 * std::f64::consts::FRAC_PI_2);
        assert_eq!(scan.valid_count(), 4);
    }

    #[test]
    fn test_masked_beams_are_skipped() {
        let scan = Scan::with_mask(vec![1.0, 2.0, 3.0], vec![true, false]);
        assert!(scan.is_valid(0));
        assert!(!scan.is_valid(1));
        assert!(!scan.is_valid(2));
        assert_eq!(scan.valid_ranges().collect::<Vec<_>>(), vec![(0, 1.0)]);
    }

    #[test]
    fn test_lookup_without_table_is_fatal() {
        let grid = Arc::new(OccupancyGrid::from_ascii("###\n#.#\n###\n").unwrap());
        let result = build_sensor(
            SensorKind::Lookup,
            &SensorConfig::default(),
            1,
            &grid,
            None,
            Path::new("missing.lut"),
        );
        assert!(matches!(
            result,
            Err(LocalizationError::LookupTableMissing { .. })
        ));

        let ray_cast = build_sensor(
            SensorKind::RayCast,
            &SensorConfig::default(),
            1,
            &grid,
            None,
            Path::new("missing.lut"),
        )
        .unwrap();
        assert_eq!(ray_cast.name(), "ray_cast");
    }
}
