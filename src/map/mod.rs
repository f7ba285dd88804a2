//! Static map representation: occupancy grid and its drivable-cell index
pub mod grid;
pub mod layouts;
pub mod valid_positions;

pub use self::grid::{CellCode, OccupancyGrid};
pub use self::valid_positions::ValidPositions;

use crate::config::MapConfig;
use crate::error::Result;
use std::fs;
use tracing::info;

/// Load the coarse map named by the configuration and expand it to simulation
/// resolution
pub fn load_map(config: &MapConfig) -> Result<OccupancyGrid> {
    let coarse = match &config.path {
        Some(path) => {
            info!(path = %path.display(), "loading map");
            OccupancyGrid::from_ascii(&fs::read_to_string(path)?)?
        }
        None => layouts::reference_course()?,
    };

    let grid = coarse.expand(config.cells_per_unit)?;
    info!(
        width = grid.width(),
        height = grid.height(),
        free = grid.count(CellCode::Free),
        "map ready"
    );
    Ok(grid)
}
