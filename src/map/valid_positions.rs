//! Index of drivable cells

use super::grid::{CellCode, OccupancyGrid};
use crate::error::{LocalizationError, Result};
use rand::Rng;

/// Every free cell of a grid, with O(1) membership and uniform sampling
#[derive(Debug, Clone)]
pub struct ValidPositions {
    width: usize,
    height: usize,
    positions: Vec<(usize, usize)>,
    mask: Vec<bool>,
}

impl ValidPositions {
    /// Build the index from a grid
    pub fn from_grid(grid: &OccupancyGrid) -> Self {
        let (width, height) = grid.dimensions();
        let mut positions = Vec::new();
        let mut mask = vec![false; width * height];

        for (x, y, code) in grid.cells() {
            if code == CellCode::Free {
                positions.push((x, y));
                mask[y * width + x] = true;
            }
        }

        ValidPositions {
            width,
            height,
            positions,
            mask,
        }
    }

    /// Whether `(x, y)` is a free cell
    pub fn contains(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.height && self.mask[y * self.width + x]
    }

    /// Uniformly random free cell
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<(usize, usize)> {
        if self.positions.is_empty() {
            return Err(LocalizationError::NoValidPositions);
        }
        Ok(self.positions[rng.gen_range(0..self.positions.len())])
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Free cells in row-major order
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.positions.iter().copied()
    }

    /// Dimensions of the grid the index was built from
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_index_matches_grid() {
        let grid = OccupancyGrid::from_ascii("####\n#..#\n#*.#\n####\n").unwrap();
        let valid = ValidPositions::from_grid(&grid);

        assert_eq!(valid.len(), 3);
        for (x, y, code) in grid.cells() {
            assert_eq!(valid.contains(x, y), code == CellCode::Free);
        }
        assert!(!valid.contains(10, 1));
    }

    #[test]
    fn test_sample_only_returns_free_cells() {
        let grid = OccupancyGrid::from_ascii("#####\n#.#.#\n#####\n").unwrap();
        let valid = ValidPositions::from_grid(&grid);
        let mut rng = StdRng::seed_from_u64(7);

        let mut seen = [false; 2];
        for _ in 0..200 {
            let (x, y) = valid.sample(&mut rng).unwrap();
            assert!(grid.is_free(x as i64, y as i64));
            seen[if x == 1 { 0 } else { 1 }] = true;
        }
        assert!(seen.iter().all(|&s| s), "both free cells should be drawn");
    }

    #[test]
    fn test_sample_empty_index_fails() {
        let grid = OccupancyGrid::new(3, 3, CellCode::Obstacle).unwrap();
        let valid = ValidPositions::from_grid(&grid);
        let mut rng = StdRng::seed_from_u64(1);
        assert!(valid.is_empty());
        assert!(matches!(
            valid.sample(&mut rng),
            Err(LocalizationError::NoValidPositions)
        ));
    }
}
