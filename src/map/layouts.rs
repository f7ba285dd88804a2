//! Built-in map layouts

use super::grid::{CellCode, OccupancyGrid};
use crate::error::Result;

/// Coarse width of the reference course: a 96 x 48 inch field plus a one inch
/// border on each side
pub const REFERENCE_WIDTH: usize = 96 + 2;
/// Coarse height of the reference course
pub const REFERENCE_HEIGHT: usize = 48 + 2;

/// The reference maze at one cell per inch
///
/// Drivable corridors are inset from the walls by the rover's half-width, so
/// the space between a corridor and a wall is `Boundary`, not `Free`.
pub fn reference_course() -> Result<OccupancyGrid> {
    let mut grid = OccupancyGrid::new(REFERENCE_WIDTH, REFERENCE_HEIGHT, CellCode::Boundary)?;

    // (columns, rows)
    let corridors = [
        (4..10, 4..46),
        (10..22, 4..22),
        (22..40, 4..10),
        (28..34, 28..40),
        (40..46, 4..22),
        (46..64, 16..22),
        (64..70, 4..46),
        (10..64, 40..46),
        (64..88, 16..22),
        (88..94, 4..46),
    ];
    for (xs, ys) in corridors {
        grid.fill_rect(xs, ys, CellCode::Free);
    }

    grid.fill_rect(0..REFERENCE_WIDTH, 0..1, CellCode::Obstacle);
    grid.fill_rect(0..REFERENCE_WIDTH, REFERENCE_HEIGHT - 1..REFERENCE_HEIGHT, CellCode::Obstacle);
    grid.fill_rect(0..1, 0..REFERENCE_HEIGHT, CellCode::Obstacle);
    grid.fill_rect(REFERENCE_WIDTH - 1..REFERENCE_WIDTH, 0..REFERENCE_HEIGHT, CellCode::Obstacle);

    let walls = [
        (13..25, 25..37),
        (25..37, 13..25),
        (37..61, 25..37),
        (49..61, 1..13),
        (73..85, 1..13),
        (73..85, 25..49),
    ];
    for (xs, ys) in walls {
        grid.fill_rect(xs, ys, CellCode::Obstacle);
    }

    Ok(grid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_course_shape() {
        let grid = reference_course().unwrap();
        assert_eq!(grid.dimensions(), (REFERENCE_WIDTH, REFERENCE_HEIGHT));

        // border is solid
        for x in 0..REFERENCE_WIDTH as i64 {
            assert_eq!(grid.classify(x, 0).unwrap(), CellCode::Obstacle);
            assert_eq!(grid.classify(x, REFERENCE_HEIGHT as i64 - 1).unwrap(), CellCode::Obstacle);
        }

        assert!(grid.is_free(5, 5));
        assert!(grid.is_free(30, 30));
        assert_eq!(grid.classify(20, 30).unwrap(), CellCode::Obstacle);
        assert_eq!(grid.classify(2, 2).unwrap(), CellCode::Boundary);
    }

    #[test]
    fn test_reference_course_free_cells_never_touch_walls() {
        let grid = reference_course().unwrap();
        for (x, y, code) in grid.cells() {
            if code != CellCode::Free {
                continue;
            }
            for (dx, dy) in [(-1, 0), (1, 0), (0, -1), (0, 1)] {
                let neighbour = grid.classify(x as i64 + dx, y as i64 + dy).unwrap();
                assert_ne!(neighbour, CellCode::Obstacle, "free cell ({}, {}) touches a wall", x, y);
            }
        }
    }
}
